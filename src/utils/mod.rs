//! # Utility Modules
//!
//! Supporting utilities for logging, timing, timeouts and metrics.
//!
//! ## Components
//! - **Logging**: `tracing-subscriber` setup driven by [`crate::config::LoggingConfig`]
//! - **Time**: wall-clock timestamps and human-readable durations
//! - **Timeout**: shared timeout constants and async timeout wrappers
//! - **Metrics**: thread-safe observability counters

pub mod logging;
pub mod metrics;
pub mod time;
pub mod timeout;
