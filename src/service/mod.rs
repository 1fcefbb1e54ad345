//! # Peer Services
//!
//! The roles built on top of a [`crate::transport::Host`].
//!
//! - [`client::Client`]: one connection to a server, with connect and
//!   disconnect handshakes bounded by a timeout
//! - [`server::Server`]: many client connections, broadcast, and a bounded
//!   graceful shutdown
//! - [`tick::TickLoop`]: the authoritative fixed-rate simulation loop that
//!   owns a server and the world [`crate::world::frame::Frame`]
//!
//! Steady-state polling never waits. Only the handshakes do, and only for as
//! long as their configured timeouts allow.

pub mod client;
pub mod server;
pub mod tick;
