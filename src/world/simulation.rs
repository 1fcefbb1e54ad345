//! # Simulation
//!
//! Server-owned entities and their animation.
//!
//! Every entity whose id is above the client slot range is animated as a pure
//! function of the frame time: it spins about the (1, 1, 1) axis once every
//! [`ROTATION_PERIOD_US`] and swings along x with amplitude
//! [`SWING_AMPLITUDE`].

use glam::Vec3;
use std::f64::consts::TAU;

use crate::world::frame::Frame;

/// Id of the first server-owned entity, above any client id
pub const ENTITY_ID_BASE: u32 = 256;

/// Microseconds per full turn
pub const ROTATION_PERIOD_US: f64 = 2_000_000.0;

/// Peak x offset of animated entities
pub const SWING_AMPLITUDE: f32 = 3.0;

/// Animation angle in `[0, 2π)` at `now_us`
pub fn angle_at(now_us: u64) -> f32 {
    ((now_us as f64 / ROTATION_PERIOD_US * TAU) % TAU) as f32
}

/// Pose every server-owned entity for time `now_us`.
///
/// Entities with an id at or below `max_clients` are left alone.
pub fn animate(frame: &mut Frame, max_clients: u32, now_us: u64) {
    let angle = angle_at(now_us);
    let translation = Vec3::new(angle.sin() * SWING_AMPLITUDE, 0.0, 0.0);

    for (_, transform) in frame.players_above_mut(max_clients) {
        transform.set_rotation(angle, Vec3::ONE);
        transform.translation = translation;
    }
}
