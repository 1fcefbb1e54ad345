//! # Error Types
//!
//! Error handling for the codec, the transport hosts and the peer services.
//!
//! ## Error Categories
//! - **I/O Errors**: socket and file system failures
//! - **Decode Errors**: short reads, oversized sequence counts, invalid UTF-8
//! - **Transport Errors**: invalid datagrams, oversized payloads, unknown peers
//! - **Handshake Errors**: connect or disconnect not acknowledged in time
//! - **Configuration Errors**: unreadable or invalid configuration
//!
//! ## Example Usage
//! ```rust
//! use tickwire::error::{ProtocolError, Result};
//! use tickwire::StreamBuffer;
//!
//! fn read_direction(stream: &mut StreamBuffer) -> Result<glam::Vec3> {
//!     stream.read::<glam::Vec3>()
//! }
//!
//! let mut empty = StreamBuffer::new();
//! assert!(matches!(
//!     read_direction(&mut empty),
//!     Err(ProtocolError::UnexpectedEof { .. })
//! ));
//! ```

use std::io;
use thiserror::Error;

/// Error message constants shared by the transport and services.
pub mod constants {
    /// Transport errors
    pub const ERR_HOST_UNAVAILABLE: &str = "Transport host was not created";
    pub const ERR_NOT_CONNECTED: &str = "Peer is not connected";
    pub const ERR_LOCK_POISONED: &str = "Synchronization primitive poisoned";
    pub const ERR_SEND_WINDOW_FULL: &str = "Too many unacknowledged reliable packets";

    /// Handshake errors
    pub const ERR_UNEXPECTED_EVENT: &str = "Unexpected transport event during handshake";
    pub const ERR_NO_ADDRESS: &str = "Host name resolved to no address";
}

/// Primary error type for every operation in the crate
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Unexpected end of stream: needed {needed} bytes, {remaining} remaining")]
    UnexpectedEof { needed: usize, remaining: usize },

    #[error("Sequence length {0} exceeds what the stream can hold")]
    SequenceTooLong(usize),

    #[error("Invalid UTF-8 in string payload")]
    InvalidUtf8,

    #[error("Invalid datagram header")]
    InvalidHeader,

    #[error("Unsupported protocol version: {0}")]
    UnsupportedVersion(u8),

    #[error("Unknown datagram kind: {0}")]
    UnknownKind(u8),

    #[error("Packet too large: {0} bytes")]
    OversizedPacket(usize),

    #[error("Invalid channel: {0}")]
    InvalidChannel(u8),

    #[error("Transport error: {0}")]
    TransportError(String),

    #[error("Transport host unavailable")]
    HostUnavailable,

    #[error("No free peer slot")]
    PeerLimitReached,

    #[error("Unknown peer: {0}")]
    UnknownPeer(u32),

    #[error("Peer is not connected")]
    NotConnected,

    #[error("Handshake failed: {0}")]
    HandshakeError(String),

    #[error("Timeout occurred")]
    Timeout,

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Type alias for Results using ProtocolError
pub type Result<T> = std::result::Result<T, ProtocolError>;
