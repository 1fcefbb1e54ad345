//! Message envelopes.
//!
//! A [`Message`] describes one inbound transport event: a peer connected, a
//! peer disconnected, or a packet arrived. Data messages own a copy of the
//! packet bytes in a fresh [`StreamBuffer`] with the read cursor at 0, so no
//! read state leaks from one message to the next.

use crate::core::stream::StreamBuffer;

/// Sender id a client uses for everything that comes from its server
pub const SERVER_ID: u32 = 0;

/// What happened
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageKind {
    Connect,
    Disconnect,
    /// A packet, holding exactly the bytes received on the wire
    Data(StreamBuffer),
}

/// One inbound event tagged with the id of the peer that caused it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    sender: u32,
    kind: MessageKind,
}

impl Message {
    pub fn connect(sender: u32) -> Self {
        Self {
            sender,
            kind: MessageKind::Connect,
        }
    }

    pub fn disconnect(sender: u32) -> Self {
        Self {
            sender,
            kind: MessageKind::Disconnect,
        }
    }

    /// Build a data message from a received payload, copying the bytes
    pub fn data(sender: u32, payload: &[u8]) -> Self {
        Self {
            sender,
            kind: MessageKind::Data(StreamBuffer::from_slice(payload)),
        }
    }

    pub fn sender(&self) -> u32 {
        self.sender
    }

    pub fn kind(&self) -> &MessageKind {
        &self.kind
    }

    /// Payload stream of a data message
    pub fn stream(&self) -> Option<&StreamBuffer> {
        match &self.kind {
            MessageKind::Data(stream) => Some(stream),
            _ => None,
        }
    }

    pub fn into_parts(self) -> (u32, MessageKind) {
        (self.sender, self.kind)
    }
}
