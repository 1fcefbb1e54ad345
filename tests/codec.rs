//! Integration tests for the stream codec

#![allow(clippy::expect_used, clippy::unwrap_used)]

use glam::{Quat, Vec2, Vec3, Vec4};
use tickwire::core::encode::MAX_SEQUENCE_LEN;
use tickwire::core::stream::merge;
use tickwire::world::transform::TRANSFORM_WIRE_SIZE;
use tickwire::{Decode, Encode, Frame, Message, ProtocolError, RawBytes, StreamBuffer, Transform};

fn round_trip<T: Encode + Decode>(value: &T) -> T {
    let mut stream = StreamBuffer::new();
    stream.write(value);
    let decoded = stream.read::<T>().expect("decode");
    assert!(stream.is_eof(), "decode must consume exactly the encoding");
    decoded
}

// ============================================================================
// Scalars
// ============================================================================

#[test]
fn test_integer_extremes_round_trip() {
    assert_eq!(round_trip(&u8::MAX), u8::MAX);
    assert_eq!(round_trip(&i8::MIN), i8::MIN);
    assert_eq!(round_trip(&u16::MAX), u16::MAX);
    assert_eq!(round_trip(&i16::MIN), i16::MIN);
    assert_eq!(round_trip(&u32::MAX), u32::MAX);
    assert_eq!(round_trip(&i32::MIN), i32::MIN);
    assert_eq!(round_trip(&u64::MAX), u64::MAX);
    assert_eq!(round_trip(&i64::MIN), i64::MIN);
    assert!(round_trip(&true));
    assert!(!round_trip(&false));
}

#[test]
fn test_special_floats_are_bit_exact() {
    let f32s = [
        0.0f32,
        -0.0,
        f32::INFINITY,
        f32::NEG_INFINITY,
        f32::MIN_POSITIVE / 2.0,
        f32::from_bits(0x7FC0_1234),
        f32::from_bits(0xFF80_0001),
    ];
    for value in f32s {
        assert_eq!(round_trip(&value).to_bits(), value.to_bits());
    }

    let f64s = [
        0.0f64,
        -0.0,
        f64::INFINITY,
        f64::MIN_POSITIVE / 4.0,
        f64::from_bits(0x7FF8_0000_DEAD_BEEF),
    ];
    for value in f64s {
        assert_eq!(round_trip(&value).to_bits(), value.to_bits());
    }
}

// ============================================================================
// Sequences and strings
// ============================================================================

#[test]
fn test_empty_sequence_is_four_bytes() {
    let mut stream = StreamBuffer::new();
    stream.write(&Vec::<u32>::new());
    assert_eq!(stream.as_bytes(), &[0, 0, 0, 0]);
    assert!(stream.read::<Vec<u32>>().unwrap().is_empty());
}

#[test]
fn test_sequence_of_n_elements() {
    let values: Vec<i16> = (-50..50).collect();
    let mut stream = StreamBuffer::new();
    stream.write(&values);
    assert_eq!(stream.len(), 4 + 2 * values.len());
    assert_eq!(stream.read::<Vec<i16>>().unwrap(), values);
}

#[test]
fn test_nested_sequences() {
    let values = vec![vec![1u8, 2], vec![], vec![3]];
    assert_eq!(round_trip(&values), values);
}

#[test]
fn test_strings_round_trip() {
    for s in ["", "a", "tickwire", "héllo wörld"] {
        assert_eq!(round_trip(&s.to_string()), s);
    }
}

#[test]
fn test_raw_bytes_round_trip_any_content() {
    let blob = RawBytes((0..=255u8).collect());
    assert_eq!(round_trip(&blob), blob);
}

#[test]
fn test_huge_count_is_rejected_without_allocation() {
    let mut stream = StreamBuffer::new();
    stream.write(&(MAX_SEQUENCE_LEN as u32 + 1));
    assert!(matches!(
        stream.read::<Vec<u8>>(),
        Err(ProtocolError::SequenceTooLong(_))
    ));
}

// ============================================================================
// Vectors and transforms
// ============================================================================

#[test]
fn test_glam_types_round_trip() {
    assert_eq!(round_trip(&Vec2::new(1.5, -2.0)), Vec2::new(1.5, -2.0));
    assert_eq!(round_trip(&Vec3::new(1.0, 2.0, 3.0)), Vec3::new(1.0, 2.0, 3.0));
    assert_eq!(
        round_trip(&Vec4::new(1.0, 2.0, 3.0, 4.0)),
        Vec4::new(1.0, 2.0, 3.0, 4.0)
    );
    let q = Quat::from_xyzw(0.1, 0.2, 0.3, 0.9);
    assert_eq!(round_trip(&q), q);
}

#[test]
fn test_transform_is_forty_bytes() {
    let t = Transform {
        translation: Vec3::new(-1.0, 0.5, 8.0),
        rotation: Quat::from_rotation_y(1.0),
        scale: Vec3::splat(0.25),
    };
    let mut stream = StreamBuffer::new();
    stream.write(&t);
    assert_eq!(stream.len(), TRANSFORM_WIRE_SIZE);
    assert_eq!(TRANSFORM_WIRE_SIZE, 40);
    assert_eq!(stream.read::<Transform>().unwrap(), t);
}

#[test]
fn test_short_transform_read_keeps_cursor() {
    let mut stream = StreamBuffer::from_slice(&[0u8; 39]);
    assert!(matches!(
        stream.read::<Transform>(),
        Err(ProtocolError::UnexpectedEof { .. })
    ));
    assert_eq!(stream.tell_read(), 0);
}

// ============================================================================
// Frames
// ============================================================================

#[test]
fn test_frame_size_formula() {
    for n in [0u32, 1, 5, 33] {
        let mut frame = Frame::new();
        for id in 0..n {
            frame.add_player(id + 1);
        }
        assert_eq!(frame.to_stream().len(), 4 + 44 * n as usize + 8);
    }
}

#[test]
fn test_frame_round_trip() {
    let mut frame = Frame::new();
    frame.add_player(1);
    frame.add_player(256);
    frame.player_mut(1).unwrap().translate(Vec3::new(1.0, 0.0, -2.0));
    frame.set_timestamp(1_700_000_000_000_000);
    assert_eq!(Frame::from_bytes(frame.to_stream().as_bytes()).unwrap(), frame);
}

// ============================================================================
// Streams and messages
// ============================================================================

#[test]
fn test_merge_keeps_both_encodings_readable() {
    let mut a = StreamBuffer::new();
    a.write(&1u32);
    let mut b = StreamBuffer::new();
    b.write("two");

    let mut merged = merge(&a, &b);
    assert_eq!(merged.read::<u32>().unwrap(), 1);
    assert_eq!(merged.read::<String>().unwrap(), "two");
}

#[test]
fn test_read_into_fills_output() {
    let mut stream = StreamBuffer::new();
    stream.write(&Vec3::Y);
    let mut direction = Vec3::ZERO;
    stream.read_into(&mut direction).unwrap();
    assert_eq!(direction, Vec3::Y);
}

#[test]
fn test_data_message_owns_a_fresh_stream() {
    let payload = [1u8, 0, 0, 0, 9];
    let message = Message::data(3, &payload);
    let stream = message.stream().unwrap();
    assert_eq!(stream.as_bytes(), &payload);
    assert_eq!(stream.tell_read(), 0);
    assert_eq!(message.sender(), 3);
}
