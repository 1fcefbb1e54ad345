//! # Protocol Layer
//!
//! What the services exchange with the transport.
//!
//! ## Components
//! - **Message**: envelope describing one inbound transport event
//! - **Delivery**: maps a delivery intent to a transport channel and flags
//!
//! The rest of the crate reasons about "reliable" and "best effort", never
//! about raw channel numbers.

pub mod delivery;
pub mod message;
