//! # Client Role
//!
//! [`Client`] holds at most one connection, to the server.
//!
//! ```text
//! Disconnected --connect()--> Connecting --verified--> Connected
//!      ^                          |                        |
//!      +------ timeout/error -----+---- disconnect()/lost -+
//! ```
//!
//! Everything received from the server is tagged with [`SERVER_ID`].

use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::lookup_host;
use tracing::{debug, error, info, instrument, warn};

use crate::config::NetworkConfig;
use crate::error::constants::{
    ERR_HOST_UNAVAILABLE, ERR_NOT_CONNECTED, ERR_NO_ADDRESS, ERR_UNEXPECTED_EVENT,
};
use crate::error::{ProtocolError, Result};
use crate::protocol::delivery::{DeliveryType, CHANNEL_COUNT};
use crate::protocol::message::{Message, SERVER_ID};
use crate::transport::udp::{self, UdpHost};
use crate::transport::{Host, HostConfig, HostEvent, PeerId};
use crate::utils::metrics::global_metrics;
use crate::utils::timeout::{with_timeout_error, HANDSHAKE_POLL_INTERVAL, HANDSHAKE_TIMEOUT};

/// Where the client is in its connection lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// How a call to [`Client::disconnect`] ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectOutcome {
    /// There was no connection to close
    NotConnected,
    /// The server acknowledged the disconnect
    Graceful,
    /// The server did not answer in time and the connection was reset
    Forced,
}

/// Client side of the peer transport
#[derive(Debug)]
pub struct Client<H: Host> {
    host: Option<H>,
    server: Option<PeerId>,
    state: ConnectionState,
    timeout: Duration,
}

impl Client<UdpHost> {
    /// Create a client on an ephemeral UDP port.
    ///
    /// If the socket cannot be created the client is still returned, without
    /// a host; every later operation logs and does nothing.
    pub async fn udp(config: &NetworkConfig) -> Self {
        let bind_addr = SocketAddr::from(([0, 0, 0, 0], 0));
        match udp::bind(bind_addr, HostConfig::client(&config.transport)).await {
            Ok(host) => Self::new(host).with_timeout(config.client.connection_timeout),
            Err(e) => {
                error!(error = %e, "Failed to create client host");
                Self::without_host().with_timeout(config.client.connection_timeout)
            }
        }
    }
}

impl<H: Host> Client<H> {
    pub fn new(host: H) -> Self {
        Self {
            host: Some(host),
            server: None,
            state: ConnectionState::Disconnected,
            timeout: HANDSHAKE_TIMEOUT,
        }
    }

    /// A client whose host could not be created
    pub fn without_host() -> Self {
        Self {
            host: None,
            server: None,
            state: ConnectionState::Disconnected,
            timeout: HANDSHAKE_TIMEOUT,
        }
    }

    /// Set the connect and disconnect handshake timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    pub fn host(&self) -> Option<&H> {
        self.host.as_ref()
    }

    /// Connect to `host:port` and wait for the handshake.
    ///
    /// Already being connected is not an error. On failure the half-open
    /// peer is reset and the client is back to `Disconnected`.
    #[instrument(skip(self))]
    pub async fn connect(&mut self, host: &str, port: u16) -> Result<()> {
        if self.state == ConnectionState::Connected {
            return Ok(());
        }
        let Some(transport) = self.host.as_mut() else {
            warn!("{}", ERR_HOST_UNAVAILABLE);
            return Err(ProtocolError::HostUnavailable);
        };

        let addr = match resolve(host, port).await {
            Ok(addr) => addr,
            Err(e) => {
                error!(error = %e, "Failed to resolve server address");
                global_metrics().handshake_failed();
                return Err(e);
            }
        };

        let peer = match transport.connect(addr, CHANNEL_COUNT) {
            Ok(peer) => peer,
            Err(e) => {
                error!(server = %addr, error = %e, "Failed to start connection");
                global_metrics().handshake_failed();
                return Err(e);
            }
        };
        self.state = ConnectionState::Connecting;
        debug!(server = %addr, "Waiting for handshake");

        match with_timeout_error(await_connect(transport, peer), self.timeout).await {
            Ok(()) => {
                self.server = Some(peer);
                self.state = ConnectionState::Connected;
                global_metrics().handshake_success();
                global_metrics().connection_established();
                info!(server = %addr, "Connected to server");
                Ok(())
            }
            Err(e) => {
                transport.reset(peer);
                self.state = ConnectionState::Disconnected;
                global_metrics().handshake_failed();
                error!(server = %addr, error = %e, "Connection to server failed");
                Err(e)
            }
        }
    }

    /// Close the connection gracefully.
    ///
    /// Anything received while waiting for the acknowledgement is dropped.
    /// Falls back to a reset when the server does not answer in time.
    #[instrument(skip(self))]
    pub async fn disconnect(&mut self) -> Result<DisconnectOutcome> {
        if self.state != ConnectionState::Connected {
            return Ok(DisconnectOutcome::NotConnected);
        }
        let (Some(transport), Some(peer)) = (self.host.as_mut(), self.server.take()) else {
            self.state = ConnectionState::Disconnected;
            return Ok(DisconnectOutcome::NotConnected);
        };

        transport.disconnect(peer);
        let result = match transport.flush() {
            Ok(()) => with_timeout_error(await_disconnect(transport, peer), self.timeout).await,
            Err(e) => Err(e),
        };
        self.state = ConnectionState::Disconnected;
        global_metrics().connection_closed();

        match result {
            Ok(()) => {
                info!("Disconnected from server");
                Ok(DisconnectOutcome::Graceful)
            }
            Err(e) => {
                transport.reset(peer);
                global_metrics().forced_disconnect();
                error!(error = %e, "Server did not acknowledge disconnect, connection reset");
                Ok(DisconnectOutcome::Forced)
            }
        }
    }

    /// Drop the connection locally without telling the server
    pub fn reset(&mut self) {
        if let (Some(transport), Some(peer)) = (self.host.as_mut(), self.server.take()) {
            transport.reset(peer);
            global_metrics().connection_closed();
            debug!("Connection reset");
        }
        self.state = ConnectionState::Disconnected;
    }

    /// Send a payload to the server and flush it right away.
    ///
    /// Sending while disconnected logs a warning and does nothing.
    pub fn send(&mut self, delivery: DeliveryType, bytes: &[u8]) -> Result<()> {
        let (Some(transport), Some(peer), ConnectionState::Connected) =
            (self.host.as_mut(), self.server, self.state)
        else {
            warn!(delivery = delivery.name(), "{}", ERR_NOT_CONNECTED);
            return Ok(());
        };

        let route = delivery.route();
        transport.send(peer, route.channel, bytes, route.flags)?;
        transport.flush()?;
        global_metrics().message_sent(bytes.len() as u64);
        Ok(())
    }

    /// Collect every pending event without waiting.
    ///
    /// A transport error ends the drain early; what was collected so far is
    /// still returned.
    pub fn poll(&mut self) -> Vec<Message> {
        let mut messages = Vec::new();
        let Some(transport) = self.host.as_mut() else {
            warn!("{}", ERR_HOST_UNAVAILABLE);
            return messages;
        };

        loop {
            match transport.service() {
                Ok(Some(HostEvent::Receive { payload, .. })) => {
                    global_metrics().message_received(payload.len() as u64);
                    messages.push(Message::data(SERVER_ID, &payload));
                }
                Ok(Some(HostEvent::Disconnect { .. })) => {
                    if self.server.take().is_some() {
                        global_metrics().connection_closed();
                    }
                    self.state = ConnectionState::Disconnected;
                    info!("Connection to server lost");
                    messages.push(Message::disconnect(SERVER_ID));
                }
                Ok(Some(HostEvent::Connect { .. })) => {
                    messages.push(Message::connect(SERVER_ID));
                }
                Ok(None) => break,
                Err(e) => {
                    error!(error = %e, "Failed to poll transport");
                    break;
                }
            }
        }
        messages
    }
}

impl<H: Host> Drop for Client<H> {
    fn drop(&mut self) {
        if self.state != ConnectionState::Connected {
            return;
        }
        if let (Some(transport), Some(peer)) = (self.host.as_mut(), self.server.take()) {
            transport.disconnect(peer);
            if let Err(e) = transport.flush() {
                debug!(error = %e, "Failed to flush disconnect on drop");
            }
            global_metrics().connection_closed();
        }
    }
}

async fn resolve(host: &str, port: u16) -> Result<SocketAddr> {
    lookup_host((host, port))
        .await?
        .next()
        .ok_or_else(|| ProtocolError::HandshakeError(format!("{ERR_NO_ADDRESS}: {host}")))
}

/// Service `host` until `peer` completes its handshake
async fn await_connect<H: Host>(host: &mut H, peer: PeerId) -> Result<()> {
    loop {
        match host.service()? {
            Some(HostEvent::Connect { peer: connected }) if connected == peer => return Ok(()),
            Some(other) => {
                return Err(ProtocolError::HandshakeError(format!(
                    "{ERR_UNEXPECTED_EVENT}: {other:?}"
                )))
            }
            None => tokio::time::sleep(HANDSHAKE_POLL_INTERVAL).await,
        }
    }
}

/// Service `host` until `peer` reports its disconnect, discarding other events
async fn await_disconnect<H: Host>(host: &mut H, peer: PeerId) -> Result<()> {
    loop {
        match host.service()? {
            Some(HostEvent::Disconnect { peer: gone }) if gone == peer => return Ok(()),
            Some(_) => {}
            None => tokio::time::sleep(HANDSHAKE_POLL_INTERVAL).await,
        }
    }
}
