//! # UDP Socket
//!
//! [`DatagramSocket`] over a tokio UDP socket. The host only uses the
//! non-blocking `try_*` calls, so it can be serviced from any task that
//! yields to the runtime between polls.

use std::io;
use std::net::SocketAddr;
use tokio::net::UdpSocket;
use tracing::info;

use crate::error::Result;
use crate::transport::host::PeerHost;
use crate::transport::{DatagramSocket, HostConfig};

/// Host over a real UDP socket
pub type UdpHost = PeerHost<UdpSocket>;

impl DatagramSocket for UdpSocket {
    fn try_send_to(&self, buf: &[u8], target: SocketAddr) -> io::Result<usize> {
        UdpSocket::try_send_to(self, buf, target)
    }

    fn try_recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
        UdpSocket::try_recv_from(self, buf)
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        UdpSocket::local_addr(self)
    }
}

/// Bind a UDP socket at `addr` and wrap it in a host
pub async fn bind(addr: SocketAddr, config: HostConfig) -> Result<UdpHost> {
    let socket = UdpSocket::bind(addr).await?;
    info!(
        addr = %socket.local_addr()?,
        max_peers = config.max_peers,
        "UDP host bound"
    );
    Ok(PeerHost::new(socket, config))
}
