//! # Transport Layer
//!
//! The packet transport the client and server roles are built on.
//!
//! [`Host`] is the boundary the services consume: create a host, connect and
//! disconnect peers, service it for events without blocking, and send byte
//! payloads on a channel with delivery flags. [`host::PeerHost`] implements it
//! over any [`DatagramSocket`] with an ENet-style peer protocol:
//!
//! - a connect / verify handshake keyed by a random connect id
//! - a reliable channel with per-packet acks, retransmission and in-order delivery
//! - an unsequenced channel delivered as it arrives
//! - keepalive pings and a peer timeout
//! - a graceful disconnect / ack exchange, plus a silent local reset
//!
//! Two sockets are provided: [`udp`] for real networks and [`memory`] for
//! in-process networks in tests and tools.

pub mod datagram;
pub mod host;
pub mod memory;
pub mod udp;

use bytes::Bytes;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use crate::config::TransportConfig;
use crate::error::Result;
use crate::protocol::delivery::CHANNEL_COUNT;

/// Handle of a peer inside one host
pub type PeerId = u32;

/// Transport-level delivery flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PacketFlags(u8);

impl PacketFlags {
    pub const NONE: PacketFlags = PacketFlags(0);
    /// Acknowledged, retransmitted and delivered in order
    pub const RELIABLE: PacketFlags = PacketFlags(1);
    /// Delivered as it arrives, without sequencing
    pub const UNSEQUENCED: PacketFlags = PacketFlags(1 << 1);

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn contains(self, other: PacketFlags) -> bool {
        self.0 & other.0 == other.0
    }
}

/// One event produced by servicing a host
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent {
    /// A handshake completed, in either direction
    Connect { peer: PeerId },
    /// A packet arrived
    Receive {
        peer: PeerId,
        channel: u8,
        payload: Bytes,
    },
    /// A peer disconnected gracefully or timed out
    Disconnect { peer: PeerId },
}

/// Packet transport host consumed by the client and server roles.
///
/// Creating a host is its constructor and destroying it is `Drop`.
pub trait Host {
    /// Start a handshake with `addr`. The returned peer is connected once a
    /// [`HostEvent::Connect`] for it comes out of [`Host::service`].
    fn connect(&mut self, addr: SocketAddr, channel_count: u8) -> Result<PeerId>;

    /// Request a graceful disconnect, completed by a [`HostEvent::Disconnect`]
    fn disconnect(&mut self, peer: PeerId);

    /// Drop a peer immediately without notifying the remote side
    fn reset(&mut self, peer: PeerId);

    /// Receive, retransmit and time out peers, then return the next event.
    /// Never waits.
    fn service(&mut self) -> Result<Option<HostEvent>>;

    /// Enqueue a payload for `peer` on `channel`
    fn send(&mut self, peer: PeerId, channel: u8, payload: &[u8], flags: PacketFlags)
        -> Result<()>;

    /// Push every enqueued packet to the socket
    fn flush(&mut self) -> Result<()>;

    /// Number of peers that completed the handshake
    fn connected_peers(&self) -> usize;
}

/// Non-blocking datagram socket a [`host::PeerHost`] runs over
pub trait DatagramSocket {
    fn try_send_to(&self, buf: &[u8], target: SocketAddr) -> io::Result<usize>;

    fn try_recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)>;

    fn local_addr(&self) -> io::Result<SocketAddr>;
}

/// Settings for one host
#[derive(Debug, Clone)]
pub struct HostConfig {
    /// Peer slots; ids are assigned from `1..=max_peers`
    pub max_peers: usize,
    /// Channels allocated per peer
    pub channel_count: u8,
    /// Whether remote hosts may connect to this one
    pub accept_incoming: bool,
    /// Silence after which a peer is dropped
    pub peer_timeout: Duration,
    /// Delay before an unacknowledged packet is sent again
    pub retransmit_interval: Duration,
    /// Idle time after which a keepalive is sent
    pub ping_interval: Duration,
    /// Largest payload accepted by `send`
    pub max_payload_size: usize,
}

impl HostConfig {
    /// Host accepting up to `max_peers` incoming connections
    pub fn server(max_peers: usize, transport: &TransportConfig) -> Self {
        Self {
            max_peers,
            accept_incoming: true,
            ..Self::client(transport)
        }
    }

    /// Host with a single outgoing connection
    pub fn client(transport: &TransportConfig) -> Self {
        Self {
            max_peers: 1,
            channel_count: CHANNEL_COUNT,
            accept_incoming: false,
            peer_timeout: transport.peer_timeout,
            retransmit_interval: transport.retransmit_interval,
            ping_interval: transport.ping_interval,
            max_payload_size: transport.max_payload_size,
        }
    }
}

impl Default for HostConfig {
    fn default() -> Self {
        Self::client(&TransportConfig::default())
    }
}
