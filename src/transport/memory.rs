//! # In-Memory Datagram Network
//!
//! A process-local stand-in for UDP. Sockets bound on one [`MemoryNetwork`]
//! exchange datagrams through shared queues, optionally dropping a fraction
//! of them with a seeded generator so lossy runs are reproducible.
//!
//! Like UDP, datagrams sent to an address nobody is bound to vanish.

use bytes::Bytes;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::{HashMap, VecDeque};
use std::io;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::constants::ERR_LOCK_POISONED;
use crate::error::Result;
use crate::transport::host::PeerHost;
use crate::transport::{DatagramSocket, HostConfig};

/// First port handed out for `port 0` binds
const EPHEMERAL_PORT_START: u16 = 49152;

/// Host over the in-memory network
pub type MemoryHost = PeerHost<MemorySocket>;

#[derive(Debug)]
struct Registry {
    queues: HashMap<SocketAddr, VecDeque<(SocketAddr, Bytes)>>,
    next_port: u16,
    loss: f64,
    rng: StdRng,
}

/// Shared medium connecting [`MemorySocket`]s
#[derive(Debug, Clone)]
pub struct MemoryNetwork {
    inner: Arc<Mutex<Registry>>,
}

impl MemoryNetwork {
    /// Lossless network
    pub fn new() -> Self {
        Self::with_loss(0.0, 0)
    }

    /// Network dropping each datagram with probability `loss`
    pub fn with_loss(loss: f64, seed: u64) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Registry {
                queues: HashMap::new(),
                next_port: EPHEMERAL_PORT_START,
                loss: loss.clamp(0.0, 1.0),
                rng: StdRng::seed_from_u64(seed),
            })),
        }
    }

    fn lock(&self) -> io::Result<MutexGuard<'_, Registry>> {
        self.inner
            .lock()
            .map_err(|_| io::Error::other(ERR_LOCK_POISONED))
    }

    /// Bind a socket. Port 0 picks a free ephemeral port.
    pub fn bind(&self, addr: SocketAddr) -> Result<MemorySocket> {
        let mut registry = self.lock()?;
        let mut addr = addr;
        if addr.port() == 0 {
            loop {
                let port = registry.next_port;
                registry.next_port = registry.next_port.checked_add(1).unwrap_or(EPHEMERAL_PORT_START);
                addr.set_port(port);
                if !registry.queues.contains_key(&addr) {
                    break;
                }
            }
        } else if registry.queues.contains_key(&addr) {
            return Err(io::Error::new(io::ErrorKind::AddrInUse, addr.to_string()).into());
        }
        registry.queues.insert(addr, VecDeque::new());
        Ok(MemorySocket {
            network: self.clone(),
            addr,
        })
    }

    /// Bind a socket and wrap it in a host
    pub fn host(&self, addr: SocketAddr, config: HostConfig) -> Result<MemoryHost> {
        Ok(PeerHost::new(self.bind(addr)?, config))
    }

    /// Change the loss probability for subsequent sends
    pub fn set_loss(&self, loss: f64) -> Result<()> {
        self.lock()?.loss = loss.clamp(0.0, 1.0);
        Ok(())
    }

    /// Datagrams queued and not yet received, across all sockets
    pub fn queued(&self) -> usize {
        self.lock()
            .map(|r| r.queues.values().map(VecDeque::len).sum())
            .unwrap_or(0)
    }
}

impl Default for MemoryNetwork {
    fn default() -> Self {
        Self::new()
    }
}

/// Socket bound on a [`MemoryNetwork`]
#[derive(Debug)]
pub struct MemorySocket {
    network: MemoryNetwork,
    addr: SocketAddr,
}

impl DatagramSocket for MemorySocket {
    fn try_send_to(&self, buf: &[u8], target: SocketAddr) -> io::Result<usize> {
        let mut registry = self.network.lock()?;
        if registry.loss > 0.0 {
            let roll: f64 = registry.rng.random();
            if roll < registry.loss {
                return Ok(buf.len());
            }
        }
        if let Some(queue) = registry.queues.get_mut(&target) {
            queue.push_back((self.addr, Bytes::copy_from_slice(buf)));
        }
        Ok(buf.len())
    }

    fn try_recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
        let mut registry = self.network.lock()?;
        let (from, datagram) = registry
            .queues
            .get_mut(&self.addr)
            .and_then(VecDeque::pop_front)
            .ok_or(io::ErrorKind::WouldBlock)?;
        // Oversized datagrams are truncated, as with UDP
        let len = datagram.len().min(buf.len());
        buf[..len].copy_from_slice(&datagram[..len]);
        Ok((len, from))
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        Ok(self.addr)
    }
}

impl Drop for MemorySocket {
    fn drop(&mut self) {
        if let Ok(mut registry) = self.network.lock() {
            registry.queues.remove(&self.addr);
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    fn addr(s: &str) -> SocketAddr {
        s.parse().unwrap()
    }

    #[test]
    fn test_send_and_receive() {
        let network = MemoryNetwork::new();
        let a = network.bind(addr("10.0.0.1:1000")).unwrap();
        let b = network.bind(addr("10.0.0.2:2000")).unwrap();

        a.try_send_to(b"hello", b.local_addr().unwrap()).unwrap();
        let mut buf = [0u8; 16];
        let (len, from) = b.try_recv_from(&mut buf).unwrap();
        assert_eq!(&buf[..len], b"hello");
        assert_eq!(from, a.local_addr().unwrap());

        let err = b.try_recv_from(&mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::WouldBlock);
    }

    #[test]
    fn test_ephemeral_ports_are_distinct() {
        let network = MemoryNetwork::new();
        let a = network.bind(addr("127.0.0.1:0")).unwrap();
        let b = network.bind(addr("127.0.0.1:0")).unwrap();
        assert_ne!(a.local_addr().unwrap(), b.local_addr().unwrap());
        assert_ne!(a.local_addr().unwrap().port(), 0);
    }

    #[test]
    fn test_address_in_use() {
        let network = MemoryNetwork::new();
        let _a = network.bind(addr("127.0.0.1:7000")).unwrap();
        assert!(network.bind(addr("127.0.0.1:7000")).is_err());
    }

    #[test]
    fn test_unbound_target_drops_silently() {
        let network = MemoryNetwork::new();
        let a = network.bind(addr("127.0.0.1:0")).unwrap();
        assert_eq!(a.try_send_to(b"x", addr("127.0.0.1:1")).unwrap(), 1);
        assert_eq!(network.queued(), 0);
    }

    #[test]
    fn test_drop_unbinds() {
        let network = MemoryNetwork::new();
        let a = network.bind(addr("127.0.0.1:7001")).unwrap();
        drop(a);
        assert!(network.bind(addr("127.0.0.1:7001")).is_ok());
    }

    #[test]
    fn test_full_loss_drops_everything() {
        let network = MemoryNetwork::with_loss(1.0, 1);
        let a = network.bind(addr("127.0.0.1:0")).unwrap();
        let b = network.bind(addr("127.0.0.1:0")).unwrap();
        for _ in 0..10 {
            a.try_send_to(b"x", b.local_addr().unwrap()).unwrap();
        }
        assert_eq!(network.queued(), 0);
    }
}
