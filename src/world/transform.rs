//! Entity transforms.

use glam::{Quat, Vec3};

use crate::core::encode::{Decode, Encode};
use crate::core::stream::StreamBuffer;
use crate::error::Result;

/// Encoded size of a [`Transform`]: translation, rotation, scale
pub const TRANSFORM_WIRE_SIZE: usize = 12 + 16 + 12;

/// Position, orientation and size of one entity
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Transform {
    pub const IDENTITY: Transform = Transform {
        translation: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: Vec3::ONE,
    };

    /// Move by `delta` in world space
    pub fn translate(&mut self, delta: Vec3) {
        self.translation += delta;
    }

    /// Replace the rotation with `angle` radians about `axis`
    pub fn set_rotation(&mut self, angle: f32, axis: Vec3) {
        self.rotation = Quat::from_axis_angle(axis.normalize_or_zero(), angle);
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Encode for Transform {
    fn encode(&self, stream: &mut StreamBuffer) {
        stream
            .write(&self.translation)
            .write(&self.rotation)
            .write(&self.scale);
    }
}

impl Decode for Transform {
    const MIN_WIRE_SIZE: usize = TRANSFORM_WIRE_SIZE;

    fn decode(stream: &mut StreamBuffer) -> Result<Self> {
        Ok(Self {
            translation: stream.read()?,
            rotation: stream.read()?,
            scale: stream.read()?,
        })
    }
}
