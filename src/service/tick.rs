//! # Authoritative Tick Loop
//!
//! [`TickLoop`] owns the server and the world frame and advances them at a
//! fixed rate. One tick:
//!
//! 1. drain the server's messages
//! 2. apply them: connect adds a player, disconnect removes it, data moves it
//! 3. animate the server-owned entities
//! 4. stamp the frame with the tick time
//! 5. broadcast the encoded frame reliably
//!
//! The loop then sleeps for what is left of the tick. Cancelling the
//! shutdown token ends the loop after the current tick's broadcast, and the
//! server is stopped before [`TickLoop::run`] returns.

use glam::Vec3;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::ServerConfig;
use crate::core::stream::StreamBuffer;
use crate::error::Result;
use crate::protocol::delivery::DeliveryType;
use crate::protocol::message::{Message, MessageKind};
use crate::service::server::Server;
use crate::transport::Host;
use crate::utils::metrics::global_metrics;
use crate::utils::time::{format_duration, timestamp_micros};
use crate::world::frame::Frame;
use crate::world::simulation::{self, ENTITY_ID_BASE};

/// Time left in a tick after `elapsed` of work, never negative
pub fn sleep_duration(tick: Duration, elapsed: Duration) -> Duration {
    tick.saturating_sub(elapsed)
}

/// Fixed-rate simulation loop owning the server and the frame
#[derive(Debug)]
pub struct TickLoop<H: Host> {
    server: Server<H>,
    frame: Frame,
    tick_duration: Duration,
    tick_rate: u32,
    shutdown: CancellationToken,
    ticks: u64,
}

impl<H: Host> TickLoop<H> {
    /// Create the loop and spawn the first server-owned entity
    pub fn new(server: Server<H>, config: &ServerConfig, shutdown: CancellationToken) -> Self {
        let mut frame = Frame::new();
        frame.add_player(ENTITY_ID_BASE);
        Self {
            server,
            frame,
            tick_duration: config.tick_duration(),
            tick_rate: config.tick_rate.max(1),
            shutdown,
            ticks: 0,
        }
    }

    pub fn frame(&self) -> &Frame {
        &self.frame
    }

    pub fn server(&self) -> &Server<H> {
        &self.server
    }

    pub fn server_mut(&mut self) -> &mut Server<H> {
        &mut self.server
    }

    /// Ticks completed so far
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Run one tick at time `now_us` and return the frame it broadcast
    pub fn tick(&mut self, now_us: u64) -> StreamBuffer {
        for message in self.server.poll() {
            self.apply(message);
        }

        let max_clients = u32::try_from(self.server.max_clients()).unwrap_or(u32::MAX);
        simulation::animate(&mut self.frame, max_clients, now_us);
        self.frame.set_timestamp(now_us);

        let encoded = self.frame.to_stream();
        self.server
            .broadcast(DeliveryType::Reliable, encoded.as_bytes());
        self.ticks += 1;
        encoded
    }

    fn apply(&mut self, message: Message) {
        match message.into_parts() {
            (id, MessageKind::Connect) => {
                if !self.frame.add_player(id) {
                    warn!(client = id, "Client connected with an id already in the frame");
                }
            }
            (id, MessageKind::Disconnect) => {
                if self.frame.remove_player(id).is_none() {
                    debug!(client = id, "Disconnect for a client not in the frame");
                }
            }
            (id, MessageKind::Data(mut stream)) => {
                let Some(player) = self.frame.player_mut(id) else {
                    global_metrics().protocol_error();
                    warn!(client = id, "Input from a client not in the frame");
                    return;
                };
                match stream.read::<Vec3>() {
                    Ok(direction) if direction.is_finite() => player.translate(direction),
                    Ok(direction) => {
                        global_metrics().decode_error();
                        warn!(client = id, ?direction, "Ignoring non-finite direction");
                    }
                    Err(e) => {
                        global_metrics().decode_error();
                        warn!(client = id, error = %e, "Malformed input from client");
                    }
                }
            }
        }
    }

    /// Tick until the shutdown token is cancelled, then stop the server
    pub async fn run(mut self) -> Result<()> {
        info!(
            tick_rate = self.tick_rate,
            tick = %format_duration(self.tick_duration),
            "Tick loop started"
        );
        let mut last = timestamp_micros();

        loop {
            let started = Instant::now();
            let now = timestamp_micros();
            self.tick(now);

            if self.shutdown.is_cancelled() {
                break;
            }

            let elapsed = started.elapsed();
            global_metrics().tick(elapsed > self.tick_duration);
            if self.ticks % u64::from(self.tick_rate) == 0 {
                info!(
                    interval = %format_duration(Duration::from_micros(now.saturating_sub(last))),
                    processed_in = %format_duration(elapsed),
                    clients = self.server.num_clients(),
                    peers = self.server.host().map_or(0, |h| h.connected_peers()),
                    "Tick processed"
                );
            }
            last = now;

            tokio::select! {
                _ = tokio::time::sleep(sleep_duration(self.tick_duration, elapsed)) => {}
                _ = self.shutdown.cancelled() => {}
            }
        }

        info!(ticks = self.ticks, "Tick loop stopping");
        self.server.stop().await;
        Ok(())
    }
}
