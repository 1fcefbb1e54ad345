//! # Core Wire Components
//!
//! Byte buffers and the binary codec every peer uses to exchange state.
//!
//! ## Components
//! - **StreamBuffer**: growable byte buffer with independent read and write cursors
//! - **Encode / Decode**: per-type wire encodings dispatched by trait
//! - **IEEE-754**: exact float packing used by every float on the wire
//!
//! ## Wire Format
//! ```text
//! bool, u8, i8        1 byte
//! u16, i16            2 bytes, little-endian
//! u32, i32, f32       4 bytes, little-endian (floats packed as IEEE-754 binary32)
//! u64, i64, f64       8 bytes, little-endian (floats packed as IEEE-754 binary64)
//! str / [T]           u32 length, then the elements
//! Vec2/Vec3/Vec4/Quat 2/3/4/4 packed f32 in x, y, z, w order
//! ```
//!
//! There is no schema on the wire. Decoders must read fields in exactly the
//! order the encoder wrote them.
//!
//! ## Security
//! - Reads never run past the end of the buffer
//! - Sequence counts are checked against the remaining bytes before allocation

pub mod encode;
pub mod ieee754;
pub mod stream;
