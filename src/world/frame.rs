//! # Frame Snapshot
//!
//! A [`Frame`] maps entity ids to transforms and carries the server time the
//! snapshot was taken at. The server owns one frame, mutates it in place each
//! tick and broadcasts its encoding.
//!
//! ## Wire Format
//! ```text
//! [Count(4)] [Id(4) Transform(40)] x Count [Timestamp(8)]
//! ```
//! Entries are written in ascending id order, so equal frames always encode
//! to equal bytes.

use std::collections::btree_map::{self, BTreeMap};

use crate::core::encode::{decode_len, encode_len, Decode, Encode};
use crate::core::stream::StreamBuffer;
use crate::error::Result;
use crate::world::transform::{Transform, TRANSFORM_WIRE_SIZE};

/// Encoded size of one frame entry
pub const ENTRY_WIRE_SIZE: usize = 4 + TRANSFORM_WIRE_SIZE;

/// Encoded size of a frame without entries
pub const EMPTY_FRAME_WIRE_SIZE: usize = 4 + 8;

/// Snapshot of every entity's transform at one instant
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Frame {
    players: BTreeMap<u32, Transform>,
    timestamp: u64,
}

impl Frame {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entity at the identity transform.
    ///
    /// Returns false and leaves the existing transform alone if `id` is taken.
    pub fn add_player(&mut self, id: u32) -> bool {
        match self.players.entry(id) {
            btree_map::Entry::Vacant(slot) => {
                slot.insert(Transform::default());
                true
            }
            btree_map::Entry::Occupied(_) => false,
        }
    }

    /// Insert or replace an entity's transform
    pub fn insert(&mut self, id: u32, transform: Transform) -> Option<Transform> {
        self.players.insert(id, transform)
    }

    pub fn remove_player(&mut self, id: u32) -> Option<Transform> {
        self.players.remove(&id)
    }

    pub fn player(&self, id: u32) -> Option<&Transform> {
        self.players.get(&id)
    }

    pub fn player_mut(&mut self, id: u32) -> Option<&mut Transform> {
        self.players.get_mut(&id)
    }

    pub fn players(&self) -> &BTreeMap<u32, Transform> {
        &self.players
    }

    /// Entities with an id strictly above `id`
    pub fn players_above_mut(
        &mut self,
        id: u32,
    ) -> impl Iterator<Item = (&u32, &mut Transform)> + '_ {
        self.players.range_mut(id.saturating_add(1)..)
    }

    pub fn contains(&self, id: u32) -> bool {
        self.players.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    /// Microseconds since the UNIX epoch
    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    pub fn set_timestamp(&mut self, timestamp: u64) {
        self.timestamp = timestamp;
    }

    /// Size of the encoding in bytes
    pub fn wire_size(&self) -> usize {
        EMPTY_FRAME_WIRE_SIZE + ENTRY_WIRE_SIZE * self.players.len()
    }

    /// Encode into a fresh stream sized for the frame
    pub fn to_stream(&self) -> StreamBuffer {
        let mut stream = StreamBuffer::with_capacity(self.wire_size());
        stream.write(self);
        stream
    }

    /// Decode a frame from a received payload
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        StreamBuffer::from_slice(bytes).read()
    }
}

impl Encode for Frame {
    fn encode(&self, stream: &mut StreamBuffer) {
        encode_len(self.players.len(), stream);
        for (id, transform) in &self.players {
            stream.write(id).write(transform);
        }
        stream.write(&self.timestamp);
    }
}

impl Decode for Frame {
    const MIN_WIRE_SIZE: usize = EMPTY_FRAME_WIRE_SIZE;

    fn decode(stream: &mut StreamBuffer) -> Result<Self> {
        let count = decode_len(stream, ENTRY_WIRE_SIZE)?;
        let mut players = BTreeMap::new();
        for _ in 0..count {
            let id = stream.read::<u32>()?;
            let transform = stream.read::<Transform>()?;
            players.insert(id, transform);
        }
        let timestamp = stream.read()?;
        Ok(Self { players, timestamp })
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::error::ProtocolError;
    use glam::Vec3;

    #[test]
    fn test_add_and_remove() {
        let mut frame = Frame::new();
        assert!(frame.add_player(1));
        frame.player_mut(1).unwrap().translate(Vec3::X);
        assert!(!frame.add_player(1));
        assert_eq!(frame.player(1).unwrap().translation, Vec3::X);

        assert!(frame.remove_player(1).is_some());
        assert!(frame.remove_player(1).is_none());
        assert!(frame.is_empty());
    }

    #[test]
    fn test_empty_frame_wire_size() {
        let frame = Frame::new();
        assert_eq!(frame.to_stream().len(), 12);
    }

    #[test]
    fn test_wire_size_and_layout() {
        let mut frame = Frame::new();
        frame.add_player(256);
        frame.add_player(1);
        frame.set_timestamp(0x0102_0304_0506_0708);

        let bytes = frame.to_stream().to_vec();
        assert_eq!(bytes.len(), 4 + 44 * 2 + 8);
        assert_eq!(frame.wire_size(), bytes.len());
        assert_eq!(&bytes[0..4], &2u32.to_le_bytes());
        // Ascending id order
        assert_eq!(&bytes[4..8], &1u32.to_le_bytes());
        assert_eq!(&bytes[48..52], &256u32.to_le_bytes());
        assert_eq!(&bytes[92..100], &0x0102_0304_0506_0708u64.to_le_bytes());

        assert_eq!(Frame::from_bytes(&bytes).unwrap(), frame);
    }

    #[test]
    fn test_truncated_frame_is_rejected() {
        let mut frame = Frame::new();
        frame.add_player(3);
        let bytes = frame.to_stream().to_vec();
        assert!(Frame::from_bytes(&bytes[..bytes.len() - 1]).is_err());
    }

    #[test]
    fn test_oversized_count_is_rejected() {
        let mut stream = StreamBuffer::new();
        stream.write(&1000u32).write(&0u64);
        assert!(matches!(
            Frame::from_bytes(stream.as_bytes()),
            Err(ProtocolError::SequenceTooLong(1000))
        ));
    }

    #[test]
    fn test_players_above() {
        let mut frame = Frame::new();
        for id in [1, 32, 33, 256] {
            frame.add_player(id);
        }
        let ids: Vec<u32> = frame.players_above_mut(32).map(|(id, _)| *id).collect();
        assert_eq!(ids, vec![33, 256]);
    }
}
