//! IEEE-754 packing for floats on the wire.
//!
//! `f32` and `f64` are guaranteed by the language to be IEEE-754 binary32 and
//! binary64, so their bit patterns are the portable representation. Packing is
//! exact: signed zeros, infinities, subnormals and NaN payloads survive a round
//! trip unchanged. Byte order is fixed later by the stream, not here.

/// Pack an `f32` into its IEEE-754 binary32 bit pattern
#[inline]
pub fn pack_f32(value: f32) -> u32 {
    value.to_bits()
}

/// Unpack an IEEE-754 binary32 bit pattern
#[inline]
pub fn unpack_f32(bits: u32) -> f32 {
    f32::from_bits(bits)
}

/// Pack an `f64` into its IEEE-754 binary64 bit pattern
#[inline]
pub fn pack_f64(value: f64) -> u64 {
    value.to_bits()
}

/// Unpack an IEEE-754 binary64 bit pattern
#[inline]
pub fn unpack_f64(bits: u64) -> f64 {
    f64::from_bits(bits)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_bit_patterns() {
        assert_eq!(pack_f32(1.0), 0x3F80_0000);
        assert_eq!(pack_f32(-2.0), 0xC000_0000);
        assert_eq!(pack_f32(0.0), 0);
        assert_eq!(pack_f32(-0.0), 0x8000_0000);
        assert_eq!(pack_f64(1.0), 0x3FF0_0000_0000_0000);
    }

    #[test]
    fn test_special_values_are_exact() {
        let quiet_nan_with_payload = f32::from_bits(0x7FC0_1234);
        assert_eq!(pack_f32(quiet_nan_with_payload), 0x7FC0_1234);

        let smallest_subnormal = f32::from_bits(1);
        assert_eq!(unpack_f32(pack_f32(smallest_subnormal)).to_bits(), 1);

        assert_eq!(unpack_f64(pack_f64(f64::NEG_INFINITY)), f64::NEG_INFINITY);
        assert!(unpack_f64(pack_f64(-0.0)).is_sign_negative());
    }
}
