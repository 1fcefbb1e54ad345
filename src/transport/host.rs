//! # Peer Host
//!
//! [`PeerHost`] implements [`Host`] over any [`DatagramSocket`].
//!
//! ## Handshake
//! The connecting side picks a random connect id and sends `Connect` until the
//! remote answers `VerifyConnect` with the same id. Each side reports
//! [`HostEvent::Connect`] once the handshake is complete on its end.
//!
//! ## Reliable Channels
//! Reliable payloads carry a per-channel sequence number. The receiver acks
//! every copy, delivers in sequence order and parks early arrivals until the
//! gap closes. Unacked payloads are resent every `retransmit_interval`.
//!
//! ## Liveness
//! A peer that sends nothing for `peer_timeout` is dropped with a
//! [`HostEvent::Disconnect`]. Idle connections send a `Ping` every
//! `ping_interval` to stay alive.

use bytes::Bytes;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::io;
use std::net::SocketAddr;
use std::time::Instant;
use tracing::{debug, trace, warn};

use crate::error::constants::ERR_SEND_WINDOW_FULL;
use crate::error::{ProtocolError, Result};
use crate::transport::datagram::{Body, Datagram, MAX_DATAGRAM_SIZE};
use crate::transport::{DatagramSocket, Host, HostConfig, HostEvent, PacketFlags, PeerId};
use crate::utils::metrics::global_metrics;

/// Early arrivals parked per channel before further ones are dropped
const RECEIVE_WINDOW: u32 = 1024;

/// Unacknowledged reliable payloads per channel before the peer is dropped
pub const SEND_WINDOW: usize = RECEIVE_WINDOW as usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PeerState {
    Connecting,
    Connected,
    Disconnecting,
}

#[derive(Debug)]
struct InFlight {
    payload: Bytes,
    sent_at: Instant,
}

#[derive(Debug, Default)]
struct Channel {
    next_outgoing: u32,
    in_flight: BTreeMap<u32, InFlight>,
    next_incoming: u32,
    pending: BTreeMap<u32, Bytes>,
}

#[derive(Debug)]
struct Peer {
    addr: SocketAddr,
    connect_id: u32,
    state: PeerState,
    channel_count: u8,
    channels: Vec<Channel>,
    last_received: Instant,
    last_sent: Instant,
    control_sent_at: Instant,
}

impl Peer {
    fn new(addr: SocketAddr, connect_id: u32, channel_count: u8, state: PeerState) -> Self {
        let now = Instant::now();
        Self {
            addr,
            connect_id,
            state,
            channel_count,
            channels: (0..channel_count).map(|_| Channel::default()).collect(),
            last_received: now,
            last_sent: now,
            control_sent_at: now,
        }
    }

    /// Whether a disconnect of this peer is visible to the host's user
    fn reported(&self) -> bool {
        self.state != PeerState::Connecting
    }
}

/// ENet-style host over a datagram socket
#[derive(Debug)]
pub struct PeerHost<S: DatagramSocket> {
    socket: S,
    config: HostConfig,
    peers: BTreeMap<PeerId, Peer>,
    by_addr: HashMap<SocketAddr, PeerId>,
    events: VecDeque<HostEvent>,
    outbox: Vec<(SocketAddr, Vec<u8>)>,
    recv_buf: Vec<u8>,
}

impl<S: DatagramSocket> PeerHost<S> {
    pub fn new(socket: S, config: HostConfig) -> Self {
        Self {
            socket,
            config,
            peers: BTreeMap::new(),
            by_addr: HashMap::new(),
            events: VecDeque::new(),
            outbox: Vec::new(),
            recv_buf: vec![0u8; MAX_DATAGRAM_SIZE],
        }
    }

    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Remote address of a known peer
    pub fn peer_addr(&self, peer: PeerId) -> Option<SocketAddr> {
        self.peers.get(&peer).map(|p| p.addr)
    }

    /// Reliable payloads sent to `peer` and not yet acknowledged
    pub fn unacked(&self, peer: PeerId) -> usize {
        self.peers
            .get(&peer)
            .map(|p| p.channels.iter().map(|c| c.in_flight.len()).sum())
            .unwrap_or(0)
    }

    /// Lowest id in `1..=max_peers` not held by a peer
    fn free_id(&self) -> Option<PeerId> {
        (1..=self.config.max_peers as PeerId).find(|id| !self.peers.contains_key(id))
    }

    fn queue(&mut self, addr: SocketAddr, datagram: Datagram) {
        self.outbox.push((addr, datagram.to_bytes()));
    }

    fn remove_peer(&mut self, id: PeerId) -> Option<Peer> {
        let peer = self.peers.remove(&id)?;
        self.by_addr.remove(&peer.addr);
        Some(peer)
    }

    fn receive(&mut self) -> Result<()> {
        loop {
            let (len, from) = match self.socket.try_recv_from(&mut self.recv_buf) {
                Ok(received) => received,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(()),
                // ICMP unreachable surfaces on the next receive; the peer timeout covers it
                Err(e)
                    if matches!(
                        e.kind(),
                        io::ErrorKind::ConnectionReset | io::ErrorKind::ConnectionRefused
                    ) =>
                {
                    trace!(error = %e, "Ignoring ICMP error on receive");
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            global_metrics().datagram_received(len as u64);
            match Datagram::from_bytes(&self.recv_buf[..len]) {
                Ok(datagram) => self.handle(from, datagram),
                Err(e) => {
                    global_metrics().protocol_error();
                    debug!(peer = %from, error = %e, "Dropping malformed datagram");
                }
            }
        }
    }

    fn handle(&mut self, from: SocketAddr, datagram: Datagram) {
        let Some(&id) = self.by_addr.get(&from) else {
            self.handle_unknown(from, datagram);
            return;
        };

        let known_session = self
            .peers
            .get(&id)
            .is_some_and(|p| p.connect_id == datagram.connect_id);
        if !known_session {
            if matches!(datagram.body, Body::Connect { .. }) && self.config.accept_incoming {
                // Same address, new session: the remote restarted
                debug!(peer = id, addr = %from, "Peer reconnected with a new session");
                if self.remove_peer(id).is_some_and(|p| p.reported()) {
                    self.events.push_back(HostEvent::Disconnect { peer: id });
                }
                self.handle_unknown(from, datagram);
            } else {
                trace!(addr = %from, "Dropping datagram from a stale session");
            }
            return;
        }

        let now = Instant::now();
        let Some(peer) = self.peers.get_mut(&id) else {
            return;
        };
        peer.last_received = now;
        let addr = peer.addr;
        let connect_id = peer.connect_id;

        match datagram.body {
            Body::Connect { .. } => {
                if peer.state == PeerState::Connected {
                    // Our VerifyConnect was lost
                    self.queue(addr, Datagram::new(connect_id, Body::VerifyConnect));
                }
            }
            Body::VerifyConnect => {
                if peer.state == PeerState::Connecting {
                    peer.state = PeerState::Connected;
                    debug!(peer = id, addr = %addr, "Handshake verified");
                    self.events.push_back(HostEvent::Connect { peer: id });
                }
            }
            Body::Disconnect => {
                self.queue(addr, Datagram::new(connect_id, Body::DisconnectAck));
                if self.remove_peer(id).is_some_and(|p| p.reported()) {
                    debug!(peer = id, addr = %addr, "Peer disconnected");
                    self.events.push_back(HostEvent::Disconnect { peer: id });
                }
            }
            Body::DisconnectAck => {
                if peer.state == PeerState::Disconnecting {
                    self.remove_peer(id);
                    self.events.push_back(HostEvent::Disconnect { peer: id });
                }
            }
            Body::Ping => {}
            Body::Reliable {
                channel,
                seq,
                payload,
            } => {
                let Some(state) = peer.channels.get_mut(channel as usize) else {
                    debug!(peer = id, channel, "Reliable datagram on unknown channel");
                    return;
                };
                // Unacked payloads come back once the handshake completes
                if peer.state != PeerState::Connected {
                    trace!(peer = id, seq, "Reliable datagram before handshake, not acked");
                    return;
                }

                let ahead = seq.wrapping_sub(state.next_incoming);
                if ahead == 0 {
                    self.events.push_back(HostEvent::Receive {
                        peer: id,
                        channel,
                        payload,
                    });
                    state.next_incoming = state.next_incoming.wrapping_add(1);
                    while let Some(parked) = state.pending.remove(&state.next_incoming) {
                        self.events.push_back(HostEvent::Receive {
                            peer: id,
                            channel,
                            payload: parked,
                        });
                        state.next_incoming = state.next_incoming.wrapping_add(1);
                    }
                } else if ahead < RECEIVE_WINDOW {
                    state.pending.entry(seq).or_insert(payload);
                } else if ahead <= u32::MAX / 2 {
                    trace!(peer = id, seq, "Reliable datagram past the receive window, not acked");
                    return;
                }
                // Delivered, parked, or a duplicate of a delivered payload
                self.outbox.push((
                    addr,
                    Datagram::new(connect_id, Body::Ack { channel, seq }).to_bytes(),
                ));
            }
            Body::Ack { channel, seq } => {
                if let Some(state) = peer.channels.get_mut(channel as usize) {
                    state.in_flight.remove(&seq);
                }
            }
            Body::Unreliable { channel, payload } => {
                if peer.state == PeerState::Connected && channel < peer.channel_count {
                    self.events.push_back(HostEvent::Receive {
                        peer: id,
                        channel,
                        payload,
                    });
                }
            }
        }
    }

    /// Datagram from an address without a peer
    fn handle_unknown(&mut self, from: SocketAddr, datagram: Datagram) {
        match datagram.body {
            Body::Connect { channel_count } if self.config.accept_incoming => {
                if channel_count == 0 || channel_count > self.config.channel_count {
                    debug!(addr = %from, channel_count, "Rejecting connect with bad channel count");
                    return;
                }
                let Some(id) = self.free_id() else {
                    warn!(addr = %from, "Rejecting connect: no free peer slot");
                    return;
                };
                let peer = Peer::new(
                    from,
                    datagram.connect_id,
                    self.config.channel_count,
                    PeerState::Connected,
                );
                self.peers.insert(id, peer);
                self.by_addr.insert(from, id);
                self.queue(from, Datagram::new(datagram.connect_id, Body::VerifyConnect));
                debug!(peer = id, addr = %from, "Accepted connection");
                self.events.push_back(HostEvent::Connect { peer: id });
            }
            // The ack for this was lost and the peer is already gone
            Body::Disconnect => {
                self.queue(from, Datagram::new(datagram.connect_id, Body::DisconnectAck));
            }
            _ => trace!(addr = %from, "Dropping datagram from unknown address"),
        }
    }

    /// Time out silent peers and resend anything unacknowledged
    fn maintain(&mut self) {
        let now = Instant::now();
        let retransmit = self.config.retransmit_interval;
        let mut timed_out = Vec::new();

        for (&id, peer) in self.peers.iter_mut() {
            if now.duration_since(peer.last_received) > self.config.peer_timeout {
                timed_out.push(id);
                continue;
            }

            let control = match peer.state {
                PeerState::Connecting => Some(Body::Connect {
                    channel_count: peer.channel_count,
                }),
                PeerState::Disconnecting => Some(Body::Disconnect),
                PeerState::Connected => None,
            };
            if let Some(body) = control {
                if now.duration_since(peer.control_sent_at) >= retransmit {
                    peer.control_sent_at = now;
                    self.outbox
                        .push((peer.addr, Datagram::new(peer.connect_id, body).to_bytes()));
                }
                continue;
            }

            for (channel, state) in peer.channels.iter_mut().enumerate() {
                for (&seq, flight) in state.in_flight.iter_mut() {
                    if now.duration_since(flight.sent_at) < retransmit {
                        continue;
                    }
                    flight.sent_at = now;
                    peer.last_sent = now;
                    global_metrics().retransmit();
                    let body = Body::Reliable {
                        channel: channel as u8,
                        seq,
                        payload: flight.payload.clone(),
                    };
                    self.outbox
                        .push((peer.addr, Datagram::new(peer.connect_id, body).to_bytes()));
                }
            }

            if now.duration_since(peer.last_sent) >= self.config.ping_interval {
                peer.last_sent = now;
                self.outbox
                    .push((peer.addr, Datagram::new(peer.connect_id, Body::Ping).to_bytes()));
            }
        }

        for id in timed_out {
            if let Some(peer) = self.remove_peer(id) {
                debug!(peer = id, addr = %peer.addr, "Peer timed out");
                if peer.reported() {
                    self.events.push_back(HostEvent::Disconnect { peer: id });
                }
            }
        }
    }
}

impl<S: DatagramSocket> Host for PeerHost<S> {
    fn connect(&mut self, addr: SocketAddr, channel_count: u8) -> Result<PeerId> {
        if channel_count == 0 || channel_count > self.config.channel_count {
            return Err(ProtocolError::InvalidChannel(channel_count));
        }
        if self.by_addr.contains_key(&addr) {
            return Err(ProtocolError::TransportError(format!(
                "already connected to {addr}"
            )));
        }
        let id = self.free_id().ok_or(ProtocolError::PeerLimitReached)?;

        let connect_id = rand::random::<u32>() | 1;
        self.peers.insert(
            id,
            Peer::new(addr, connect_id, channel_count, PeerState::Connecting),
        );
        self.by_addr.insert(addr, id);
        self.queue(addr, Datagram::new(connect_id, Body::Connect { channel_count }));
        debug!(peer = id, addr = %addr, "Connecting");
        Ok(id)
    }

    fn disconnect(&mut self, id: PeerId) {
        let Some(peer) = self.peers.get_mut(&id) else {
            return;
        };
        match peer.state {
            PeerState::Connected => {
                peer.state = PeerState::Disconnecting;
                peer.control_sent_at = Instant::now();
                let (addr, connect_id) = (peer.addr, peer.connect_id);
                self.queue(addr, Datagram::new(connect_id, Body::Disconnect));
            }
            PeerState::Connecting => {
                self.remove_peer(id);
            }
            PeerState::Disconnecting => {}
        }
    }

    fn reset(&mut self, id: PeerId) {
        if self.remove_peer(id).is_some() {
            debug!(peer = id, "Peer reset");
        }
    }

    fn service(&mut self) -> Result<Option<HostEvent>> {
        if let Some(event) = self.events.pop_front() {
            return Ok(Some(event));
        }
        self.receive()?;
        self.maintain();
        self.flush()?;
        Ok(self.events.pop_front())
    }

    fn send(&mut self, id: PeerId, channel: u8, payload: &[u8], flags: PacketFlags) -> Result<()> {
        if payload.len() > self.config.max_payload_size {
            return Err(ProtocolError::OversizedPacket(payload.len()));
        }
        let peer = self
            .peers
            .get_mut(&id)
            .ok_or(ProtocolError::UnknownPeer(id))?;
        if peer.state != PeerState::Connected {
            return Err(ProtocolError::NotConnected);
        }
        let state = peer
            .channels
            .get_mut(channel as usize)
            .ok_or(ProtocolError::InvalidChannel(channel))?;

        if flags.contains(PacketFlags::RELIABLE) && state.in_flight.len() >= SEND_WINDOW {
            // The remote stays alive but never acks; stop resending to it
            let (addr, connect_id) = (peer.addr, peer.connect_id);
            self.remove_peer(id);
            self.queue(addr, Datagram::new(connect_id, Body::Disconnect));
            self.events.push_back(HostEvent::Disconnect { peer: id });
            global_metrics().forced_disconnect();
            warn!(peer = id, addr = %addr, channel, "{}", ERR_SEND_WINDOW_FULL);
            return Err(ProtocolError::TransportError(ERR_SEND_WINDOW_FULL.to_string()));
        }

        let now = Instant::now();
        let payload = Bytes::copy_from_slice(payload);
        let body = if flags.contains(PacketFlags::RELIABLE) {
            let seq = state.next_outgoing;
            state.next_outgoing = seq.wrapping_add(1);
            state.in_flight.insert(
                seq,
                InFlight {
                    payload: payload.clone(),
                    sent_at: now,
                },
            );
            Body::Reliable {
                channel,
                seq,
                payload,
            }
        } else {
            Body::Unreliable { channel, payload }
        };
        peer.last_sent = now;
        let (addr, connect_id) = (peer.addr, peer.connect_id);
        self.queue(addr, Datagram::new(connect_id, body));
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        for (addr, bytes) in self.outbox.drain(..) {
            match self.socket.try_send_to(&bytes, addr) {
                Ok(_) => global_metrics().datagram_sent(bytes.len() as u64),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    trace!(addr = %addr, "Socket busy, datagram dropped");
                }
                Err(e) => {
                    global_metrics().protocol_error();
                    warn!(addr = %addr, error = %e, "Failed to send datagram");
                }
            }
        }
        Ok(())
    }

    fn connected_peers(&self) -> usize {
        self.peers
            .values()
            .filter(|p| p.state == PeerState::Connected)
            .count()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::transport::memory::{MemoryNetwork, MemorySocket};
    use std::time::Duration;

    fn server_config() -> HostConfig {
        HostConfig {
            max_peers: 4,
            channel_count: 2,
            accept_incoming: true,
            peer_timeout: Duration::from_millis(200),
            retransmit_interval: Duration::from_millis(10),
            ping_interval: Duration::from_millis(50),
            max_payload_size: 1024,
        }
    }

    fn client_config() -> HostConfig {
        HostConfig {
            max_peers: 1,
            accept_incoming: false,
            ..server_config()
        }
    }

    fn pair(network: &MemoryNetwork) -> (PeerHost<MemorySocket>, PeerHost<MemorySocket>) {
        let server = PeerHost::new(
            network.bind("127.0.0.1:9000".parse().unwrap()).unwrap(),
            server_config(),
        );
        let client = PeerHost::new(
            network.bind("127.0.0.1:0".parse().unwrap()).unwrap(),
            client_config(),
        );
        (server, client)
    }

    /// Service both hosts until `done` holds or the budget runs out
    fn pump(
        a: &mut PeerHost<MemorySocket>,
        b: &mut PeerHost<MemorySocket>,
        a_events: &mut Vec<HostEvent>,
        b_events: &mut Vec<HostEvent>,
        done: impl Fn(&[HostEvent], &[HostEvent]) -> bool,
    ) {
        let deadline = Instant::now() + Duration::from_secs(2);
        while !done(a_events, b_events) && Instant::now() < deadline {
            while let Some(e) = a.service().unwrap() {
                a_events.push(e);
            }
            while let Some(e) = b.service().unwrap() {
                b_events.push(e);
            }
            std::thread::sleep(Duration::from_millis(1));
        }
    }

    fn connected(events: &[HostEvent]) -> bool {
        events.iter().any(|e| matches!(e, HostEvent::Connect { .. }))
    }

    #[test]
    fn test_handshake_assigns_lowest_free_id() {
        let network = MemoryNetwork::new();
        let (mut server, mut client) = pair(&network);
        let server_addr = server.local_addr().unwrap();

        let peer = client.connect(server_addr, 2).unwrap();
        let (mut se, mut ce) = (Vec::new(), Vec::new());
        pump(&mut server, &mut client, &mut se, &mut ce, |s, c| {
            connected(s) && connected(c)
        });

        assert_eq!(se, vec![HostEvent::Connect { peer: 1 }]);
        assert_eq!(ce, vec![HostEvent::Connect { peer }]);
        assert_eq!(server.connected_peers(), 1);
        assert_eq!(client.connected_peers(), 1);
    }

    #[test]
    fn test_reliable_delivery_in_order_under_loss() {
        let network = MemoryNetwork::with_loss(0.3, 7);
        let (mut server, mut client) = pair(&network);
        let peer = client.connect(server.local_addr().unwrap(), 2).unwrap();
        let (mut se, mut ce) = (Vec::new(), Vec::new());
        pump(&mut server, &mut client, &mut se, &mut ce, |s, c| {
            connected(s) && connected(c)
        });
        assert!(connected(&se) && connected(&ce));

        for i in 0u32..50 {
            client
                .send(peer, 0, &i.to_le_bytes(), PacketFlags::RELIABLE)
                .unwrap();
        }
        se.clear();
        pump(&mut server, &mut client, &mut se, &mut ce, |s, _| s.len() >= 50);

        let received: Vec<u32> = se
            .iter()
            .filter_map(|e| match e {
                HostEvent::Receive { payload, .. } => {
                    Some(u32::from_le_bytes(payload[..4].try_into().unwrap()))
                }
                _ => None,
            })
            .collect();
        assert_eq!(received, (0..50).collect::<Vec<_>>());
    }

    #[test]
    fn test_graceful_disconnect_reported_on_both_sides() {
        let network = MemoryNetwork::new();
        let (mut server, mut client) = pair(&network);
        let peer = client.connect(server.local_addr().unwrap(), 2).unwrap();
        let (mut se, mut ce) = (Vec::new(), Vec::new());
        pump(&mut server, &mut client, &mut se, &mut ce, |s, c| {
            connected(s) && connected(c)
        });

        client.disconnect(peer);
        let gone = |events: &[HostEvent]| {
            events
                .iter()
                .any(|e| matches!(e, HostEvent::Disconnect { .. }))
        };
        pump(&mut server, &mut client, &mut se, &mut ce, |s, c| {
            gone(s) && gone(c)
        });

        assert!(se.contains(&HostEvent::Disconnect { peer: 1 }));
        assert!(ce.contains(&HostEvent::Disconnect { peer }));
        assert_eq!(server.connected_peers(), 0);
    }

    #[test]
    fn test_reset_peer_times_out_on_remote() {
        let network = MemoryNetwork::new();
        let (mut server, mut client) = pair(&network);
        let peer = client.connect(server.local_addr().unwrap(), 2).unwrap();
        let (mut se, mut ce) = (Vec::new(), Vec::new());
        pump(&mut server, &mut client, &mut se, &mut ce, |s, c| {
            connected(s) && connected(c)
        });

        client.reset(peer);
        assert_eq!(client.connected_peers(), 0);
        pump(&mut server, &mut client, &mut se, &mut ce, |s, _| {
            s.contains(&HostEvent::Disconnect { peer: 1 })
        });
        assert!(se.contains(&HostEvent::Disconnect { peer: 1 }));
        assert!(!ce.iter().any(|e| matches!(e, HostEvent::Disconnect { .. })));
    }

    #[test]
    fn test_send_errors() {
        let network = MemoryNetwork::new();
        let (_server, mut client) = pair(&network);
        assert!(matches!(
            client.send(3, 0, b"x", PacketFlags::RELIABLE),
            Err(ProtocolError::UnknownPeer(3))
        ));

        let peer = client.connect("127.0.0.1:9000".parse().unwrap(), 2).unwrap();
        assert!(matches!(
            client.send(peer, 0, b"x", PacketFlags::RELIABLE),
            Err(ProtocolError::NotConnected)
        ));
        assert!(matches!(
            client.send(peer, 0, &[0u8; 2048], PacketFlags::RELIABLE),
            Err(ProtocolError::OversizedPacket(2048))
        ));
    }

    #[test]
    fn test_connect_rejects_bad_channel_count() {
        let network = MemoryNetwork::new();
        let (_server, mut client) = pair(&network);
        let addr = "127.0.0.1:9000".parse().unwrap();
        assert!(matches!(
            client.connect(addr, 0),
            Err(ProtocolError::InvalidChannel(0))
        ));
        assert!(matches!(
            client.connect(addr, 9),
            Err(ProtocolError::InvalidChannel(9))
        ));
    }

    #[test]
    fn test_malformed_datagram_is_dropped() {
        let network = MemoryNetwork::new();
        let (mut server, client) = pair(&network);
        let raw = network.bind("127.0.0.1:0".parse().unwrap()).unwrap();
        raw.try_send_to(b"garbage", server.local_addr().unwrap())
            .unwrap();
        assert_eq!(server.service().unwrap(), None);
        drop(client);
    }

    // ========================================================================
    // Ack discipline
    // ========================================================================

    fn drain(raw: &MemorySocket) -> Vec<Datagram> {
        let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];
        let mut out = Vec::new();
        while let Ok((len, _)) = raw.try_recv_from(&mut buf) {
            out.push(Datagram::from_bytes(&buf[..len]).unwrap());
        }
        out
    }

    fn acked(datagrams: &[Datagram]) -> Vec<u32> {
        datagrams
            .iter()
            .filter_map(|d| match d.body {
                Body::Ack { seq, .. } => Some(seq),
                _ => None,
            })
            .collect()
    }

    fn payloads(events: &[HostEvent]) -> Vec<Bytes> {
        events
            .iter()
            .filter_map(|e| match e {
                HostEvent::Receive { payload, .. } => Some(payload.clone()),
                _ => None,
            })
            .collect()
    }

    fn drain_events(host: &mut PeerHost<MemorySocket>, events: &mut Vec<HostEvent>) {
        while let Some(e) = host.service().unwrap() {
            events.push(e);
        }
    }

    fn reliable(connect_id: u32, seq: u32) -> Vec<u8> {
        Datagram::new(
            connect_id,
            Body::Reliable {
                channel: 0,
                seq,
                payload: Bytes::from(seq.to_le_bytes().to_vec()),
            },
        )
        .to_bytes()
    }

    /// A client host talking to a hand-driven remote, after its `Connect` was read
    fn client_with_raw_remote(network: &MemoryNetwork) -> (PeerHost<MemorySocket>, MemorySocket, u32) {
        let raw = network.bind("127.0.0.1:9000".parse().unwrap()).unwrap();
        let mut client = PeerHost::new(
            network.bind("127.0.0.1:0".parse().unwrap()).unwrap(),
            client_config(),
        );
        client.connect(raw.local_addr().unwrap(), 2).unwrap();
        assert_eq!(client.service().unwrap(), None);

        let connect_id = drain(&raw)
            .iter()
            .find(|d| matches!(d.body, Body::Connect { .. }))
            .map(|d| d.connect_id)
            .expect("client should send Connect");
        (client, raw, connect_id)
    }

    #[test]
    fn test_reliable_before_verify_is_redelivered() {
        let network = MemoryNetwork::new();
        let (mut client, raw, connect_id) = client_with_raw_remote(&network);
        let to = client.local_addr().unwrap();

        // Data overtakes the VerifyConnect
        raw.try_send_to(&reliable(connect_id, 0), to).unwrap();
        raw.try_send_to(&Datagram::new(connect_id, Body::VerifyConnect).to_bytes(), to)
            .unwrap();
        raw.try_send_to(&reliable(connect_id, 1), to).unwrap();

        let mut events = Vec::new();
        drain_events(&mut client, &mut events);
        assert_eq!(events, vec![HostEvent::Connect { peer: 1 }]);
        assert_eq!(acked(&drain(&raw)), vec![1]);

        raw.try_send_to(&reliable(connect_id, 0), to).unwrap();
        drain_events(&mut client, &mut events);
        assert_eq!(
            payloads(&events),
            vec![
                Bytes::from(0u32.to_le_bytes().to_vec()),
                Bytes::from(1u32.to_le_bytes().to_vec())
            ]
        );
        assert_eq!(acked(&drain(&raw)), vec![0]);
    }

    #[test]
    fn test_sequence_past_window_is_not_acked() {
        let network = MemoryNetwork::new();
        let (mut client, raw, connect_id) = client_with_raw_remote(&network);
        let to = client.local_addr().unwrap();
        raw.try_send_to(&Datagram::new(connect_id, Body::VerifyConnect).to_bytes(), to)
            .unwrap();

        let mut events = Vec::new();
        raw.try_send_to(&reliable(connect_id, RECEIVE_WINDOW), to).unwrap();
        for seq in 0..RECEIVE_WINDOW {
            raw.try_send_to(&reliable(connect_id, seq), to).unwrap();
        }
        drain_events(&mut client, &mut events);
        let acks = acked(&drain(&raw));
        assert!(!acks.contains(&RECEIVE_WINDOW));
        assert_eq!(acks.len(), RECEIVE_WINDOW as usize);
        assert_eq!(payloads(&events).len(), RECEIVE_WINDOW as usize);

        // The retry lands in order; a stale copy is acked again but not delivered
        raw.try_send_to(&reliable(connect_id, RECEIVE_WINDOW), to).unwrap();
        raw.try_send_to(&reliable(connect_id, 5), to).unwrap();
        drain_events(&mut client, &mut events);
        assert_eq!(acked(&drain(&raw)), vec![RECEIVE_WINDOW, 5]);
        let delivered = payloads(&events);
        assert_eq!(delivered.len(), RECEIVE_WINDOW as usize + 1);
        assert_eq!(
            delivered.last().unwrap(),
            &Bytes::from(RECEIVE_WINDOW.to_le_bytes().to_vec())
        );
    }

    #[test]
    fn test_full_send_window_drops_peer() {
        let network = MemoryNetwork::new();
        let (mut server, mut client) = pair(&network);
        let peer = client.connect(server.local_addr().unwrap(), 2).unwrap();
        let (mut se, mut ce) = (Vec::new(), Vec::new());
        pump(&mut server, &mut client, &mut se, &mut ce, |s, c| {
            connected(s) && connected(c)
        });

        // The server is not serviced, so nothing is acked
        for i in 0..SEND_WINDOW {
            client
                .send(peer, 0, &(i as u32).to_le_bytes(), PacketFlags::RELIABLE)
                .unwrap();
        }
        assert_eq!(client.unacked(peer), SEND_WINDOW);
        assert!(matches!(
            client.send(peer, 0, b"one more", PacketFlags::RELIABLE),
            Err(ProtocolError::TransportError(_))
        ));
        assert_eq!(client.connected_peers(), 0);
        assert_eq!(client.unacked(peer), 0);
        assert_eq!(client.service().unwrap(), Some(HostEvent::Disconnect { peer }));

        pump(&mut server, &mut client, &mut se, &mut ce, |s, _| {
            s.contains(&HostEvent::Disconnect { peer: 1 })
        });
        assert!(se.contains(&HostEvent::Disconnect { peer: 1 }));
    }
}
