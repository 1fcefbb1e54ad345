//! # tickwire
//!
//! Networking and state-synchronization core for a small real-time multiplayer
//! simulation. An authoritative server owns the world state, advances it at a
//! fixed tick rate, and broadcasts binary-encoded snapshots to every connected
//! client over a packet transport with reliable-ordered and unreliable
//! delivery.
//!
//! ## Layers
//! - [`core`]: `StreamBuffer` and the fixed little-endian wire codec
//! - [`protocol`]: message envelopes and the delivery channel policy
//! - [`transport`]: the `Host` boundary plus UDP and in-memory hosts
//! - [`service`]: client and server peer roles and the authoritative tick loop
//! - [`world`]: transforms, the frame snapshot and entity animation
//! - [`config`], [`error`], [`utils`]: configuration, errors, logging, metrics
//!
//! ## Example
//! ```rust,no_run
//! use tickwire::config::NetworkConfig;
//! use tickwire::service::{server::Server, tick::TickLoop};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() -> tickwire::error::Result<()> {
//! let config = NetworkConfig::default();
//! let server = Server::bind(&config).await?;
//! let shutdown = CancellationToken::new();
//! TickLoop::new(server, &config.server, shutdown.clone()).run().await
//! # }
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

pub mod config;
pub mod core;
pub mod error;
pub mod protocol;
pub mod service;
pub mod transport;
pub mod utils;
pub mod world;

pub use crate::core::encode::{Decode, Encode, RawBytes};
pub use crate::core::stream::StreamBuffer;
pub use crate::error::{ProtocolError, Result};
pub use crate::protocol::delivery::DeliveryType;
pub use crate::protocol::message::{Message, MessageKind};
pub use crate::world::frame::Frame;
pub use crate::world::transform::Transform;
