//! Observability and Metrics
//!
//! Process-wide counters for the transport, the peer roles and the tick loop.
//!
//! Uses atomic counters for thread-safe metrics collection.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::{debug, info};

/// Global metrics collector
#[derive(Debug)]
pub struct Metrics {
    /// Total connections established
    pub connections_total: AtomicU64,
    /// Currently active connections
    pub connections_active: AtomicU64,
    /// Successful client handshakes
    pub handshakes_success: AtomicU64,
    /// Failed client handshakes
    pub handshakes_failed: AtomicU64,
    /// Disconnects that had to fall back to a reset
    pub forced_disconnects: AtomicU64,
    /// Payloads handed to the transport
    pub messages_sent: AtomicU64,
    /// Payloads received from the transport
    pub messages_received: AtomicU64,
    /// Payload bytes sent
    pub bytes_sent: AtomicU64,
    /// Payload bytes received
    pub bytes_received: AtomicU64,
    /// Datagrams written to sockets
    pub datagrams_sent: AtomicU64,
    /// Datagrams read from sockets
    pub datagrams_received: AtomicU64,
    /// Datagram bytes written, headers included
    pub wire_bytes_sent: AtomicU64,
    /// Datagram bytes read, headers included
    pub wire_bytes_received: AtomicU64,
    /// Reliable datagrams sent again
    pub retransmits: AtomicU64,
    /// Simulation ticks completed
    pub ticks: AtomicU64,
    /// Ticks that took longer than the tick duration
    pub tick_overruns: AtomicU64,
    /// Payloads from peers that failed to decode
    pub decode_errors: AtomicU64,
    /// Malformed datagrams and socket errors
    pub protocol_errors: AtomicU64,
    start_time: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            connections_total: AtomicU64::new(0),
            connections_active: AtomicU64::new(0),
            handshakes_success: AtomicU64::new(0),
            handshakes_failed: AtomicU64::new(0),
            forced_disconnects: AtomicU64::new(0),
            messages_sent: AtomicU64::new(0),
            messages_received: AtomicU64::new(0),
            bytes_sent: AtomicU64::new(0),
            bytes_received: AtomicU64::new(0),
            datagrams_sent: AtomicU64::new(0),
            datagrams_received: AtomicU64::new(0),
            wire_bytes_sent: AtomicU64::new(0),
            wire_bytes_received: AtomicU64::new(0),
            retransmits: AtomicU64::new(0),
            ticks: AtomicU64::new(0),
            tick_overruns: AtomicU64::new(0),
            decode_errors: AtomicU64::new(0),
            protocol_errors: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn connection_established(&self) {
        self.connections_total.fetch_add(1, Ordering::Relaxed);
        self.connections_active.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_closed(&self) {
        // Never wraps below zero when a close races a reset
        let _ = self
            .connections_active
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1));
    }

    pub fn handshake_success(&self) {
        self.handshakes_success.fetch_add(1, Ordering::Relaxed);
    }

    pub fn handshake_failed(&self) {
        self.handshakes_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn forced_disconnect(&self) {
        self.forced_disconnects.fetch_add(1, Ordering::Relaxed);
    }

    pub fn message_sent(&self, byte_count: u64) {
        self.messages_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(byte_count, Ordering::Relaxed);
    }

    pub fn message_received(&self, byte_count: u64) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
        self.bytes_received.fetch_add(byte_count, Ordering::Relaxed);
    }

    pub fn datagram_sent(&self, byte_count: u64) {
        self.datagrams_sent.fetch_add(1, Ordering::Relaxed);
        self.wire_bytes_sent.fetch_add(byte_count, Ordering::Relaxed);
    }

    pub fn datagram_received(&self, byte_count: u64) {
        self.datagrams_received.fetch_add(1, Ordering::Relaxed);
        self.wire_bytes_received.fetch_add(byte_count, Ordering::Relaxed);
    }

    pub fn retransmit(&self) {
        self.retransmits.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a completed tick and whether it overran its budget
    pub fn tick(&self, overrun: bool) {
        self.ticks.fetch_add(1, Ordering::Relaxed);
        if overrun {
            self.tick_overruns.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn decode_error(&self) {
        self.decode_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn protocol_error(&self) {
        self.protocol_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current metrics snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            connections_total: self.connections_total.load(Ordering::Relaxed),
            connections_active: self.connections_active.load(Ordering::Relaxed),
            handshakes_success: self.handshakes_success.load(Ordering::Relaxed),
            handshakes_failed: self.handshakes_failed.load(Ordering::Relaxed),
            forced_disconnects: self.forced_disconnects.load(Ordering::Relaxed),
            messages_sent: self.messages_sent.load(Ordering::Relaxed),
            messages_received: self.messages_received.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            datagrams_sent: self.datagrams_sent.load(Ordering::Relaxed),
            datagrams_received: self.datagrams_received.load(Ordering::Relaxed),
            wire_bytes_sent: self.wire_bytes_sent.load(Ordering::Relaxed),
            wire_bytes_received: self.wire_bytes_received.load(Ordering::Relaxed),
            retransmits: self.retransmits.load(Ordering::Relaxed),
            ticks: self.ticks.load(Ordering::Relaxed),
            tick_overruns: self.tick_overruns.load(Ordering::Relaxed),
            decode_errors: self.decode_errors.load(Ordering::Relaxed),
            protocol_errors: self.protocol_errors.load(Ordering::Relaxed),
            uptime_seconds: self.start_time.elapsed().as_secs(),
        }
    }

    /// Log current metrics
    pub fn log_metrics(&self) {
        let s = self.snapshot();
        info!(
            connections_total = s.connections_total,
            connections_active = s.connections_active,
            handshakes_success = s.handshakes_success,
            handshakes_failed = s.handshakes_failed,
            forced_disconnects = s.forced_disconnects,
            messages_sent = s.messages_sent,
            messages_received = s.messages_received,
            bytes_sent = s.bytes_sent,
            bytes_received = s.bytes_received,
            datagrams_sent = s.datagrams_sent,
            datagrams_received = s.datagrams_received,
            wire_bytes_sent = s.wire_bytes_sent,
            wire_bytes_received = s.wire_bytes_received,
            retransmits = s.retransmits,
            ticks = s.ticks,
            tick_overruns = s.tick_overruns,
            decode_errors = s.decode_errors,
            protocol_errors = s.protocol_errors,
            uptime_seconds = s.uptime_seconds,
            "Metrics snapshot"
        );
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of metrics at a point in time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub connections_total: u64,
    pub connections_active: u64,
    pub handshakes_success: u64,
    pub handshakes_failed: u64,
    pub forced_disconnects: u64,
    pub messages_sent: u64,
    pub messages_received: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub datagrams_sent: u64,
    pub datagrams_received: u64,
    pub wire_bytes_sent: u64,
    pub wire_bytes_received: u64,
    pub retransmits: u64,
    pub ticks: u64,
    pub tick_overruns: u64,
    pub decode_errors: u64,
    pub protocol_errors: u64,
    pub uptime_seconds: u64,
}

static METRICS: once_cell::sync::Lazy<Metrics> = once_cell::sync::Lazy::new(Metrics::new);

/// Get the global metrics instance
pub fn global_metrics() -> &'static Metrics {
    &METRICS
}

/// Logs how long an operation took when dropped
pub struct Timer {
    start: Instant,
    operation: &'static str,
}

impl Timer {
    pub fn start(operation: &'static str) -> Self {
        Self {
            start: Instant::now(),
            operation,
        }
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        debug!(
            operation = self.operation,
            duration_us = self.start.elapsed().as_micros() as u64,
            "Operation completed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters() {
        let metrics = Metrics::new();
        metrics.connection_established();
        metrics.message_sent(40);
        metrics.message_sent(2);
        metrics.tick(false);
        metrics.tick(true);

        let s = metrics.snapshot();
        assert_eq!(s.connections_active, 1);
        assert_eq!(s.messages_sent, 2);
        assert_eq!(s.bytes_sent, 42);
        assert_eq!(s.ticks, 2);
        assert_eq!(s.tick_overruns, 1);
    }

    #[test]
    fn test_active_connections_never_underflow() {
        let metrics = Metrics::new();
        metrics.connection_closed();
        assert_eq!(metrics.snapshot().connections_active, 0);
    }

    #[test]
    fn test_datagram_bytes_tracked_apart_from_payload_bytes() {
        let metrics = Metrics::new();
        metrics.datagram_sent(25);
        metrics.datagram_sent(10);
        metrics.datagram_received(64);

        let s = metrics.snapshot();
        assert_eq!(s.datagrams_sent, 2);
        assert_eq!(s.wire_bytes_sent, 35);
        assert_eq!(s.datagrams_received, 1);
        assert_eq!(s.wire_bytes_received, 64);
        assert_eq!(s.bytes_sent, 0);
    }
}
