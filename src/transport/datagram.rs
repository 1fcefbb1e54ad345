//! # Datagram Format
//!
//! Every datagram a [`super::host::PeerHost`] sends starts with a fixed header:
//!
//! ```text
//! [Magic(4)] [Version(1)] [Kind(1)] [ConnectId(4)] [Body(N)]
//! ```
//!
//! | Kind | Body |
//! |---|---|
//! | `Connect` | channel count (1) |
//! | `VerifyConnect`, `Disconnect`, `DisconnectAck`, `Ping` | empty |
//! | `Reliable` | channel (1), sequence (4), payload |
//! | `Ack` | channel (1), sequence (4) |
//! | `Unreliable` | channel (1), payload |
//!
//! Integers are little-endian, written with the crate's own codec.

use bytes::Bytes;

use crate::core::stream::StreamBuffer;
use crate::error::{ProtocolError, Result};

/// Magic bytes identifying transport datagrams ("TKWR")
pub const MAGIC_BYTES: [u8; 4] = *b"TKWR";

/// Current transport protocol version
pub const PROTOCOL_VERSION: u8 = 1;

/// Bytes before the body
pub const HEADER_LEN: usize = 10;

/// Largest payload carried in one datagram
pub const MAX_PAYLOAD_SIZE: usize = 60_000;

/// Receive buffer size, large enough for any valid datagram
pub const MAX_DATAGRAM_SIZE: usize = HEADER_LEN + 5 + MAX_PAYLOAD_SIZE;

const KIND_CONNECT: u8 = 1;
const KIND_VERIFY_CONNECT: u8 = 2;
const KIND_DISCONNECT: u8 = 3;
const KIND_DISCONNECT_ACK: u8 = 4;
const KIND_PING: u8 = 5;
const KIND_RELIABLE: u8 = 6;
const KIND_ACK: u8 = 7;
const KIND_UNRELIABLE: u8 = 8;

/// Body of a datagram
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Body {
    Connect { channel_count: u8 },
    VerifyConnect,
    Disconnect,
    DisconnectAck,
    Ping,
    Reliable { channel: u8, seq: u32, payload: Bytes },
    Ack { channel: u8, seq: u32 },
    Unreliable { channel: u8, payload: Bytes },
}

impl Body {
    fn kind(&self) -> u8 {
        match self {
            Body::Connect { .. } => KIND_CONNECT,
            Body::VerifyConnect => KIND_VERIFY_CONNECT,
            Body::Disconnect => KIND_DISCONNECT,
            Body::DisconnectAck => KIND_DISCONNECT_ACK,
            Body::Ping => KIND_PING,
            Body::Reliable { .. } => KIND_RELIABLE,
            Body::Ack { .. } => KIND_ACK,
            Body::Unreliable { .. } => KIND_UNRELIABLE,
        }
    }
}

/// One transport datagram
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Datagram {
    /// Session the datagram belongs to, chosen by the connecting side
    pub connect_id: u32,
    pub body: Body,
}

impl Datagram {
    pub fn new(connect_id: u32, body: Body) -> Self {
        Self { connect_id, body }
    }

    /// Serialize to wire bytes
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut stream = StreamBuffer::with_capacity(HEADER_LEN + 5 + self.payload_len());
        stream.write_bytes(&MAGIC_BYTES);
        stream
            .write(&PROTOCOL_VERSION)
            .write(&self.body.kind())
            .write(&self.connect_id);

        match &self.body {
            Body::Connect { channel_count } => {
                stream.write(channel_count);
            }
            Body::VerifyConnect | Body::Disconnect | Body::DisconnectAck | Body::Ping => {}
            Body::Reliable {
                channel,
                seq,
                payload,
            } => {
                stream.write(channel).write(seq);
                stream.write_bytes(payload);
            }
            Body::Ack { channel, seq } => {
                stream.write(channel).write(seq);
            }
            Body::Unreliable { channel, payload } => {
                stream.write(channel);
                stream.write_bytes(payload);
            }
        }
        stream.to_vec()
    }

    /// Parse wire bytes, validating the header and body length
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < HEADER_LEN || data[..4] != MAGIC_BYTES {
            return Err(ProtocolError::InvalidHeader);
        }

        let mut stream = StreamBuffer::from_slice(data);
        stream.seek_read(MAGIC_BYTES.len());
        let version = stream.read::<u8>()?;
        if version != PROTOCOL_VERSION {
            return Err(ProtocolError::UnsupportedVersion(version));
        }
        let kind = stream.read::<u8>()?;
        let connect_id = stream.read::<u32>()?;

        let body = Self::read_body(kind, &mut stream).map_err(|e| match e {
            ProtocolError::UnexpectedEof { .. } => ProtocolError::InvalidHeader,
            other => other,
        })?;

        Ok(Self { connect_id, body })
    }

    fn read_body(kind: u8, stream: &mut StreamBuffer) -> Result<Body> {
        let body = match kind {
            KIND_CONNECT => Body::Connect {
                channel_count: stream.read()?,
            },
            KIND_VERIFY_CONNECT => Body::VerifyConnect,
            KIND_DISCONNECT => Body::Disconnect,
            KIND_DISCONNECT_ACK => Body::DisconnectAck,
            KIND_PING => Body::Ping,
            KIND_RELIABLE => {
                let channel = stream.read()?;
                let seq = stream.read()?;
                Body::Reliable {
                    channel,
                    seq,
                    payload: Self::read_payload(stream)?,
                }
            }
            KIND_ACK => Body::Ack {
                channel: stream.read()?,
                seq: stream.read()?,
            },
            KIND_UNRELIABLE => {
                let channel = stream.read()?;
                Body::Unreliable {
                    channel,
                    payload: Self::read_payload(stream)?,
                }
            }
            other => return Err(ProtocolError::UnknownKind(other)),
        };
        Ok(body)
    }

    fn read_payload(stream: &mut StreamBuffer) -> Result<Bytes> {
        let len = stream.remaining();
        if len > MAX_PAYLOAD_SIZE {
            return Err(ProtocolError::OversizedPacket(len));
        }
        Ok(Bytes::copy_from_slice(stream.read_bytes(len)?))
    }

    fn payload_len(&self) -> usize {
        match &self.body {
            Body::Reliable { payload, .. } | Body::Unreliable { payload, .. } => payload.len(),
            _ => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    #[test]
    fn test_header_layout() {
        let bytes = Datagram::new(0xAABB_CCDD, Body::Ping).to_bytes();
        assert_eq!(bytes.len(), HEADER_LEN);
        assert_eq!(&bytes[..4], b"TKWR");
        assert_eq!(bytes[4], PROTOCOL_VERSION);
        assert_eq!(bytes[5], KIND_PING);
        assert_eq!(&bytes[6..10], &0xAABB_CCDDu32.to_le_bytes());
    }

    #[test]
    fn test_reliable_body() {
        let datagram = Datagram::new(
            7,
            Body::Reliable {
                channel: 0,
                seq: 42,
                payload: Bytes::from_static(b"state"),
            },
        );
        let bytes = datagram.to_bytes();
        assert_eq!(bytes.len(), HEADER_LEN + 5 + 5);
        assert_eq!(Datagram::from_bytes(&bytes).unwrap(), datagram);
    }

    #[test]
    fn test_empty_unreliable_payload() {
        let datagram = Datagram::new(
            1,
            Body::Unreliable {
                channel: 1,
                payload: Bytes::new(),
            },
        );
        assert_eq!(Datagram::from_bytes(&datagram.to_bytes()).unwrap(), datagram);
    }

    #[test]
    fn test_invalid_magic() {
        let mut bytes = Datagram::new(1, Body::Ping).to_bytes();
        bytes[0] = 0xFF;
        assert!(matches!(
            Datagram::from_bytes(&bytes),
            Err(ProtocolError::InvalidHeader)
        ));
    }

    #[test]
    fn test_unsupported_version() {
        let mut bytes = Datagram::new(1, Body::Ping).to_bytes();
        bytes[4] = 99;
        assert!(matches!(
            Datagram::from_bytes(&bytes),
            Err(ProtocolError::UnsupportedVersion(99))
        ));
    }

    #[test]
    fn test_unknown_kind() {
        let mut bytes = Datagram::new(1, Body::Ping).to_bytes();
        bytes[5] = 200;
        assert!(matches!(
            Datagram::from_bytes(&bytes),
            Err(ProtocolError::UnknownKind(200))
        ));
    }

    #[test]
    fn test_truncated_header_and_body() {
        assert!(matches!(
            Datagram::from_bytes(&[]),
            Err(ProtocolError::InvalidHeader)
        ));
        assert!(matches!(
            Datagram::from_bytes(b"TKWR\x01"),
            Err(ProtocolError::InvalidHeader)
        ));

        let bytes = Datagram::new(1, Body::Ack { channel: 0, seq: 9 }).to_bytes();
        assert!(matches!(
            Datagram::from_bytes(&bytes[..bytes.len() - 1]),
            Err(ProtocolError::InvalidHeader)
        ));
    }

    #[test]
    fn test_oversized_payload_rejected() {
        let mut bytes = Datagram::new(1, Body::Unreliable {
            channel: 1,
            payload: Bytes::new(),
        })
        .to_bytes();
        bytes.extend(std::iter::repeat(0u8).take(MAX_PAYLOAD_SIZE + 1));
        assert!(matches!(
            Datagram::from_bytes(&bytes),
            Err(ProtocolError::OversizedPacket(_))
        ));
    }
}
