//! # Shared World State
//!
//! The state the server simulates and replicates every tick.
//!
//! - [`transform`]: translation, rotation and scale of one entity
//! - [`frame`]: the snapshot of every entity, keyed by id and timestamped
//! - [`simulation`]: server-owned entities and their animation

pub mod frame;
pub mod simulation;
pub mod transform;
