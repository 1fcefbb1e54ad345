//! # Server Role
//!
//! [`Server`] accepts client connections through its host and tags every
//! inbound message with the id the host assigned to the sending client.
//! Ids are the lowest free slot in `1..=max_clients`, so they are reused
//! once a client leaves.

use std::collections::BTreeSet;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::config::NetworkConfig;
use crate::error::constants::ERR_HOST_UNAVAILABLE;
use crate::error::{ProtocolError, Result};
use crate::protocol::delivery::DeliveryType;
use crate::protocol::message::Message;
use crate::transport::udp::{self, UdpHost};
use crate::transport::{Host, HostConfig, HostEvent, PeerId};
use crate::utils::metrics::{global_metrics, Timer};
use crate::utils::timeout::{with_timeout_error, HANDSHAKE_POLL_INTERVAL, SHUTDOWN_TIMEOUT};

/// Server side of the peer transport
#[derive(Debug)]
pub struct Server<H: Host> {
    host: Option<H>,
    clients: BTreeSet<PeerId>,
    max_clients: usize,
    shutdown_timeout: Duration,
}

impl Server<UdpHost> {
    /// Bind a UDP server on the configured address and port
    #[instrument(skip(config), fields(port = config.server.port))]
    pub async fn bind(config: &NetworkConfig) -> Result<Self> {
        let addr = config.server.socket_addr()?;
        let host_config = HostConfig::server(config.server.max_clients, &config.transport);
        let host = udp::bind(addr, host_config).await?;
        Ok(Self::new(host, config.server.max_clients)
            .with_shutdown_timeout(config.server.shutdown_timeout))
    }
}

impl<H: Host> Server<H> {
    /// Wrap a host created with room for `max_clients` peers
    pub fn new(host: H, max_clients: usize) -> Self {
        Self {
            host: Some(host),
            clients: BTreeSet::new(),
            max_clients,
            shutdown_timeout: SHUTDOWN_TIMEOUT,
        }
    }

    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// The host, until [`Server::stop`] releases it
    pub fn host(&self) -> Option<&H> {
        self.host.as_ref()
    }

    pub fn num_clients(&self) -> usize {
        self.clients.len()
    }

    pub fn max_clients(&self) -> usize {
        self.max_clients
    }

    pub fn is_connected(&self, id: PeerId) -> bool {
        self.clients.contains(&id)
    }

    /// Ids of connected clients in ascending order
    pub fn clients(&self) -> impl Iterator<Item = PeerId> + '_ {
        self.clients.iter().copied()
    }

    /// Collect every pending event without waiting.
    ///
    /// A transport error ends the drain early; what was collected so far is
    /// still returned.
    pub fn poll(&mut self) -> Vec<Message> {
        let mut messages = Vec::new();
        let Some(transport) = self.host.as_mut() else {
            return messages;
        };

        loop {
            match transport.service() {
                Ok(Some(HostEvent::Connect { peer })) => {
                    self.clients.insert(peer);
                    global_metrics().connection_established();
                    info!(client = peer, clients = self.clients.len(), "Client connected");
                    messages.push(Message::connect(peer));
                }
                Ok(Some(HostEvent::Disconnect { peer })) => {
                    if self.clients.remove(&peer) {
                        global_metrics().connection_closed();
                    }
                    info!(client = peer, clients = self.clients.len(), "Client disconnected");
                    messages.push(Message::disconnect(peer));
                }
                Ok(Some(HostEvent::Receive { peer, payload, .. })) => {
                    global_metrics().message_received(payload.len() as u64);
                    messages.push(Message::data(peer, &payload));
                }
                Ok(None) => break,
                Err(e) => {
                    warn!(error = %e, "Failed to poll transport");
                    break;
                }
            }
        }
        messages
    }

    /// Send to every connected client.
    ///
    /// A failed send to one client is logged and the rest still get the
    /// payload.
    pub fn broadcast(&mut self, delivery: DeliveryType, bytes: &[u8]) {
        let Some(transport) = self.host.as_mut() else {
            return;
        };
        if self.clients.is_empty() {
            return;
        }

        let route = delivery.route();
        for &client in &self.clients {
            match transport.send(client, route.channel, bytes, route.flags) {
                Ok(()) => global_metrics().message_sent(bytes.len() as u64),
                Err(e) => warn!(client, error = %e, "Broadcast to client failed"),
            }
        }
        if let Err(e) = transport.flush() {
            warn!(error = %e, "Failed to flush broadcast");
        }
    }

    /// Send to one connected client
    pub fn send(&mut self, id: PeerId, delivery: DeliveryType, bytes: &[u8]) -> Result<()> {
        if !self.clients.contains(&id) {
            return Err(ProtocolError::UnknownPeer(id));
        }
        let transport = self.host.as_mut().ok_or(ProtocolError::HostUnavailable)?;
        let route = delivery.route();
        transport.send(id, route.channel, bytes, route.flags)?;
        transport.flush()?;
        global_metrics().message_sent(bytes.len() as u64);
        Ok(())
    }

    /// Disconnect every client and release the host.
    ///
    /// Clients get the shutdown timeout to acknowledge. Any that do not are
    /// reset.
    #[instrument(skip(self), fields(clients = self.clients.len()))]
    pub async fn stop(&mut self) {
        let _timer = Timer::start("server_stop");
        let Some(mut transport) = self.host.take() else {
            debug!("{}", ERR_HOST_UNAVAILABLE);
            return;
        };

        for &client in &self.clients {
            transport.disconnect(client);
        }

        let pending = &mut self.clients;
        let drained = async {
            transport.flush()?;
            while !pending.is_empty() {
                match transport.service()? {
                    Some(HostEvent::Disconnect { peer }) => {
                        if pending.remove(&peer) {
                            global_metrics().connection_closed();
                        }
                    }
                    Some(_) => {}
                    None => tokio::time::sleep(HANDSHAKE_POLL_INTERVAL).await,
                }
            }
            Ok::<(), ProtocolError>(())
        };
        let result = with_timeout_error(drained, self.shutdown_timeout).await;

        if let Err(e) = result {
            warn!(
                error = %e,
                remaining = self.clients.len(),
                "Clients did not acknowledge shutdown, resetting"
            );
            for &client in &self.clients {
                transport.reset(client);
                global_metrics().connection_closed();
                global_metrics().forced_disconnect();
            }
        }
        self.clients.clear();
        info!("Server stopped");
    }
}
