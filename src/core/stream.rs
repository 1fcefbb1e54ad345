//! # Stream Buffer
//!
//! A growable byte buffer with two independent cursors.
//!
//! The write cursor marks where the next [`StreamBuffer::write`] lands. Writing
//! overwrites any bytes already under the cursor and grows the buffer past the
//! end. The read cursor marks where the next [`StreamBuffer::read`] starts.
//! Both cursors can be moved freely with the `seek_*` methods.
//!
//! ## Usage
//! ```rust
//! use tickwire::StreamBuffer;
//!
//! let mut stream = StreamBuffer::new();
//! stream.write(&7u32).write("hello");
//!
//! assert_eq!(stream.read::<u32>().unwrap(), 7);
//! assert_eq!(stream.read::<String>().unwrap(), "hello");
//! assert!(stream.is_eof());
//! ```

use bytes::{Bytes, BytesMut};
use std::path::Path;

use crate::core::encode::{Decode, Encode};
use crate::error::{ProtocolError, Result};

/// Capacity reserved by [`StreamBuffer::new`]
pub const DEFAULT_CAPACITY: usize = 1024;

/// Byte buffer with independent read and write cursors
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamBuffer {
    buffer: BytesMut,
    read_pos: usize,
    write_pos: usize,
}

impl StreamBuffer {
    /// Create an empty stream with the default capacity hint
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create an empty stream reserving `capacity` bytes
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(capacity),
            read_pos: 0,
            write_pos: 0,
        }
    }

    /// Create a stream holding a copy of `data`.
    ///
    /// The read cursor starts at 0 and the write cursor at the end, so further
    /// writes append to the copied bytes.
    pub fn from_slice(data: &[u8]) -> Self {
        Self {
            buffer: BytesMut::from(data),
            read_pos: 0,
            write_pos: data.len(),
        }
    }

    /// Borrow the whole buffer, independent of either cursor
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    /// Consume the stream, returning its bytes
    pub fn freeze(self) -> Bytes {
        self.buffer.freeze()
    }

    /// Copy the whole buffer into a `Vec`
    pub fn to_vec(&self) -> Vec<u8> {
        self.buffer.to_vec()
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Bytes left between the read cursor and the end of the buffer
    pub fn remaining(&self) -> usize {
        self.buffer.len().saturating_sub(self.read_pos)
    }

    /// True once the read cursor has reached the end of the buffer
    pub fn is_eof(&self) -> bool {
        self.read_pos >= self.buffer.len()
    }

    pub fn tell_read(&self) -> usize {
        self.read_pos
    }

    pub fn tell_write(&self) -> usize {
        self.write_pos
    }

    /// Move the read cursor. Positions past the end make every read fail.
    pub fn seek_read(&mut self, pos: usize) {
        self.read_pos = pos;
    }

    /// Move the write cursor. Writing past the end zero-fills the gap.
    pub fn seek_write(&mut self, pos: usize) {
        self.write_pos = pos;
    }

    /// Write raw bytes at the write cursor and advance it
    pub fn write_bytes(&mut self, data: &[u8]) {
        let end = self.write_pos + data.len();
        if self.buffer.len() < end {
            self.buffer.resize(end, 0);
        }
        self.buffer[self.write_pos..end].copy_from_slice(data);
        self.write_pos = end;
    }

    /// Read `len` raw bytes at the read cursor and advance it
    pub fn read_bytes(&mut self, len: usize) -> Result<&[u8]> {
        let remaining = self.remaining();
        if len > remaining {
            return Err(ProtocolError::UnexpectedEof {
                needed: len,
                remaining,
            });
        }
        let start = self.read_pos;
        self.read_pos += len;
        Ok(&self.buffer[start..start + len])
    }

    /// Read exactly `N` bytes into an array
    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_bytes(N)?);
        Ok(out)
    }

    /// Append the wire encoding of `value` at the write cursor
    pub fn write<T: Encode + ?Sized>(&mut self, value: &T) -> &mut Self {
        value.encode(self);
        self
    }

    /// Decode the next value at the read cursor.
    ///
    /// On failure the read cursor is restored to where the read started.
    pub fn read<T: Decode>(&mut self) -> Result<T> {
        let start = self.read_pos;
        T::decode(self).map_err(|e| {
            self.read_pos = start;
            e
        })
    }

    /// Decode the next value into a caller-supplied output
    pub fn read_into<T: Decode>(&mut self, out: &mut T) -> Result<()> {
        *out = self.read()?;
        Ok(())
    }

    /// Dump the whole buffer to a file
    pub fn write_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        std::fs::write(path, &self.buffer)?;
        Ok(())
    }
}

impl AsRef<[u8]> for StreamBuffer {
    fn as_ref(&self) -> &[u8] {
        &self.buffer
    }
}

/// Concatenate the bytes of two streams into a new stream
pub fn merge(first: &StreamBuffer, second: &StreamBuffer) -> StreamBuffer {
    let mut merged = StreamBuffer::with_capacity(first.len() + second.len());
    merged.write_bytes(first.as_bytes());
    merged.write_bytes(second.as_bytes());
    merged
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    #[test]
    fn test_cursors_are_independent() {
        let mut stream = StreamBuffer::new();
        stream.write(&1u8).write(&2u8);
        assert_eq!(stream.tell_write(), 2);
        assert_eq!(stream.tell_read(), 0);

        assert_eq!(stream.read::<u8>().unwrap(), 1);
        stream.write(&3u8);
        assert_eq!(stream.read::<u8>().unwrap(), 2);
        assert_eq!(stream.read::<u8>().unwrap(), 3);
        assert!(stream.is_eof());
    }

    #[test]
    fn test_write_overwrites_at_cursor() {
        let mut stream = StreamBuffer::from_slice(&[1, 2, 3, 4]);
        stream.seek_write(1);
        stream.write_bytes(&[9, 9, 9, 9]);
        assert_eq!(stream.as_bytes(), &[1, 9, 9, 9, 9]);
    }

    #[test]
    fn test_seek_write_past_end_zero_fills() {
        let mut stream = StreamBuffer::new();
        stream.seek_write(3);
        stream.write(&0xABu8);
        assert_eq!(stream.as_bytes(), &[0, 0, 0, 0xAB]);
    }

    #[test]
    fn test_short_read_fails_and_keeps_cursor() {
        let mut stream = StreamBuffer::from_slice(&[1, 2, 3]);
        let err = stream.read::<u32>().unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::UnexpectedEof {
                needed: 4,
                remaining: 3
            }
        ));
        assert_eq!(stream.tell_read(), 0);
        assert_eq!(stream.read::<u8>().unwrap(), 1);
    }

    #[test]
    fn test_seek_read_past_end() {
        let mut stream = StreamBuffer::from_slice(&[1]);
        stream.seek_read(10);
        assert!(stream.is_eof());
        assert_eq!(stream.remaining(), 0);
        assert!(stream.read::<u8>().is_err());
    }

    #[test]
    fn test_merge_concatenates() {
        let a = StreamBuffer::from_slice(&[1, 2]);
        let b = StreamBuffer::from_slice(&[3]);
        let merged = merge(&a, &b);
        assert_eq!(merged.as_bytes(), &[1, 2, 3]);
        assert_eq!(merged.tell_write(), 3);
    }

    #[test]
    fn test_write_to_file() {
        let path = std::env::temp_dir().join(format!("tickwire-stream-{}.bin", std::process::id()));
        let stream = StreamBuffer::from_slice(b"frame");
        stream.write_to_file(&path).expect("write file");
        assert_eq!(std::fs::read(&path).expect("read file"), b"frame");
        let _ = std::fs::remove_file(&path);
    }
}
