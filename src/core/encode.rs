//! # Encode / Decode
//!
//! Per-type wire encodings for [`StreamBuffer`].
//!
//! Every scalar has a fixed width. Composite types are the concatenation of
//! their fields in a fixed order. Sequences and strings are a `u32` count
//! followed by the elements.
//!
//! ## Sequence Hardening
//! A count read off the wire is never trusted for allocation. Decoding rejects
//! any count above [`MAX_SEQUENCE_LEN`] and any count whose minimum encoded
//! size is larger than the bytes left in the stream.

use glam::{Quat, Vec2, Vec3, Vec4};

use crate::core::ieee754::{pack_f32, pack_f64, unpack_f32, unpack_f64};
use crate::core::stream::StreamBuffer;
use crate::error::{ProtocolError, Result};

/// Upper bound on any decoded sequence or string length
pub const MAX_SEQUENCE_LEN: usize = 1 << 20;

/// Types with a wire encoding
pub trait Encode {
    /// Append the encoding of `self` at the stream's write cursor
    fn encode(&self, stream: &mut StreamBuffer);
}

/// Types that can be read back from their wire encoding
pub trait Decode: Sized {
    /// Smallest number of bytes one encoded value can occupy
    const MIN_WIRE_SIZE: usize;

    /// Decode one value at the stream's read cursor
    fn decode(stream: &mut StreamBuffer) -> Result<Self>;
}

macro_rules! impl_integer {
    ($($ty:ty),*) => {
        $(
            impl Encode for $ty {
                #[inline]
                fn encode(&self, stream: &mut StreamBuffer) {
                    stream.write_bytes(&self.to_le_bytes());
                }
            }

            impl Decode for $ty {
                const MIN_WIRE_SIZE: usize = std::mem::size_of::<$ty>();

                #[inline]
                fn decode(stream: &mut StreamBuffer) -> Result<Self> {
                    Ok(<$ty>::from_le_bytes(stream.read_array()?))
                }
            }
        )*
    };
}

impl_integer!(u8, i8, u16, i16, u32, i32, u64, i64);

impl Encode for bool {
    fn encode(&self, stream: &mut StreamBuffer) {
        u8::from(*self).encode(stream);
    }
}

impl Decode for bool {
    const MIN_WIRE_SIZE: usize = 1;

    fn decode(stream: &mut StreamBuffer) -> Result<Self> {
        Ok(u8::decode(stream)? != 0)
    }
}

impl Encode for f32 {
    fn encode(&self, stream: &mut StreamBuffer) {
        pack_f32(*self).encode(stream);
    }
}

impl Decode for f32 {
    const MIN_WIRE_SIZE: usize = 4;

    fn decode(stream: &mut StreamBuffer) -> Result<Self> {
        Ok(unpack_f32(u32::decode(stream)?))
    }
}

impl Encode for f64 {
    fn encode(&self, stream: &mut StreamBuffer) {
        pack_f64(*self).encode(stream);
    }
}

impl Decode for f64 {
    const MIN_WIRE_SIZE: usize = 8;

    fn decode(stream: &mut StreamBuffer) -> Result<Self> {
        Ok(unpack_f64(u64::decode(stream)?))
    }
}

pub(crate) fn encode_len(len: usize, stream: &mut StreamBuffer) {
    debug_assert!(u32::try_from(len).is_ok(), "sequence length overflows u32");
    (len as u32).encode(stream);
}

/// Read a sequence count and check it against the bytes left in the stream
pub(crate) fn decode_len(stream: &mut StreamBuffer, min_element_size: usize) -> Result<usize> {
    let count = u32::decode(stream)? as usize;
    if count > MAX_SEQUENCE_LEN || count.saturating_mul(min_element_size) > stream.remaining() {
        return Err(ProtocolError::SequenceTooLong(count));
    }
    Ok(count)
}

impl<T: Encode> Encode for [T] {
    fn encode(&self, stream: &mut StreamBuffer) {
        encode_len(self.len(), stream);
        for item in self {
            item.encode(stream);
        }
    }
}

impl<T: Encode> Encode for Vec<T> {
    fn encode(&self, stream: &mut StreamBuffer) {
        self.as_slice().encode(stream);
    }
}

impl<T: Decode> Decode for Vec<T> {
    const MIN_WIRE_SIZE: usize = 4;

    fn decode(stream: &mut StreamBuffer) -> Result<Self> {
        let count = decode_len(stream, T::MIN_WIRE_SIZE)?;
        let mut out = Vec::with_capacity(count);
        for _ in 0..count {
            out.push(T::decode(stream)?);
        }
        Ok(out)
    }
}

// Strings share the byte-sequence layout: u32 length, then the raw bytes.
impl Encode for str {
    fn encode(&self, stream: &mut StreamBuffer) {
        encode_len(self.len(), stream);
        stream.write_bytes(self.as_bytes());
    }
}

impl Encode for String {
    fn encode(&self, stream: &mut StreamBuffer) {
        self.as_str().encode(stream);
    }
}

impl Decode for String {
    const MIN_WIRE_SIZE: usize = 4;

    fn decode(stream: &mut StreamBuffer) -> Result<Self> {
        let RawBytes(bytes) = RawBytes::decode(stream)?;
        String::from_utf8(bytes).map_err(|_| ProtocolError::InvalidUtf8)
    }
}

/// Opaque byte blob with the string layout, copied in one pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct RawBytes(pub Vec<u8>);

impl Encode for RawBytes {
    fn encode(&self, stream: &mut StreamBuffer) {
        encode_len(self.0.len(), stream);
        stream.write_bytes(&self.0);
    }
}

impl Decode for RawBytes {
    const MIN_WIRE_SIZE: usize = 4;

    fn decode(stream: &mut StreamBuffer) -> Result<Self> {
        let len = decode_len(stream, 1)?;
        Ok(RawBytes(stream.read_bytes(len)?.to_vec()))
    }
}

impl From<Vec<u8>> for RawBytes {
    fn from(bytes: Vec<u8>) -> Self {
        RawBytes(bytes)
    }
}

impl<T: Encode + ?Sized> Encode for &T {
    fn encode(&self, stream: &mut StreamBuffer) {
        (**self).encode(stream);
    }
}

impl Encode for Vec2 {
    fn encode(&self, stream: &mut StreamBuffer) {
        stream.write(&self.x).write(&self.y);
    }
}

impl Decode for Vec2 {
    const MIN_WIRE_SIZE: usize = 8;

    fn decode(stream: &mut StreamBuffer) -> Result<Self> {
        let x = f32::decode(stream)?;
        let y = f32::decode(stream)?;
        Ok(Vec2::new(x, y))
    }
}

impl Encode for Vec3 {
    fn encode(&self, stream: &mut StreamBuffer) {
        stream.write(&self.x).write(&self.y).write(&self.z);
    }
}

impl Decode for Vec3 {
    const MIN_WIRE_SIZE: usize = 12;

    fn decode(stream: &mut StreamBuffer) -> Result<Self> {
        let x = f32::decode(stream)?;
        let y = f32::decode(stream)?;
        let z = f32::decode(stream)?;
        Ok(Vec3::new(x, y, z))
    }
}

impl Encode for Vec4 {
    fn encode(&self, stream: &mut StreamBuffer) {
        stream
            .write(&self.x)
            .write(&self.y)
            .write(&self.z)
            .write(&self.w);
    }
}

impl Decode for Vec4 {
    const MIN_WIRE_SIZE: usize = 16;

    fn decode(stream: &mut StreamBuffer) -> Result<Self> {
        let x = f32::decode(stream)?;
        let y = f32::decode(stream)?;
        let z = f32::decode(stream)?;
        let w = f32::decode(stream)?;
        Ok(Vec4::new(x, y, z, w))
    }
}

impl Encode for Quat {
    fn encode(&self, stream: &mut StreamBuffer) {
        stream
            .write(&self.x)
            .write(&self.y)
            .write(&self.z)
            .write(&self.w);
    }
}

impl Decode for Quat {
    const MIN_WIRE_SIZE: usize = 16;

    fn decode(stream: &mut StreamBuffer) -> Result<Self> {
        let x = f32::decode(stream)?;
        let y = f32::decode(stream)?;
        let z = f32::decode(stream)?;
        let w = f32::decode(stream)?;
        Ok(Quat::from_xyzw(x, y, z, w))
    }
}
