//! Headless tickwire client.
//!
//! Usage: `tickwire-client [config.toml]`
//!
//! Connects to `client.address`, sends a random unit step every
//! `client.input_interval` and logs the frames the server broadcasts.
//! CTRL+C disconnects gracefully.

use glam::Vec3;
use rand::seq::IndexedRandom;
use std::process::ExitCode;
use tracing::{debug, error, info, warn};

use tickwire::config::NetworkConfig;
use tickwire::service::client::Client;
use tickwire::utils::logging::init_logging;
use tickwire::{DeliveryType, Frame, MessageKind, StreamBuffer};

const STEPS: [Vec3; 4] = [Vec3::X, Vec3::NEG_X, Vec3::Z, Vec3::NEG_Z];

fn load_config() -> tickwire::Result<NetworkConfig> {
    let mut config = match std::env::args().nth(1) {
        Some(path) => NetworkConfig::from_file(path)?,
        None => NetworkConfig::default(),
    };
    config.apply_env(|key| std::env::var(key).ok());
    Ok(config)
}

#[tokio::main]
async fn main() -> ExitCode {
    let config = match load_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };
    if let Err(e) = init_logging(&config.logging) {
        eprintln!("{e}");
        return ExitCode::FAILURE;
    }

    let (host, port) = match config.client.host_and_port() {
        Ok(parts) => parts,
        Err(e) => {
            error!(error = %e, "Invalid server address");
            return ExitCode::FAILURE;
        }
    };

    let mut client = Client::udp(&config).await;
    if let Err(e) = client.connect(host, port).await {
        error!(error = %e, server = %config.client.address, "Could not connect");
        return ExitCode::FAILURE;
    }

    let mut input = tokio::time::interval(config.client.input_interval);
    let mut poll = tokio::time::interval(std::time::Duration::from_millis(1));
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    while client.is_connected() {
        tokio::select! {
            _ = &mut ctrl_c => {
                info!("Received CTRL+C, disconnecting");
                break;
            }
            _ = input.tick() => {
                let step = STEPS.choose(&mut rand::rng()).copied().unwrap_or(Vec3::ZERO);
                let mut stream = StreamBuffer::with_capacity(12);
                stream.write(&step);
                if let Err(e) = client.send(DeliveryType::Reliable, stream.as_bytes()) {
                    warn!(error = %e, "Failed to send input");
                }
            }
            _ = poll.tick() => {
                for message in client.poll() {
                    match message.kind() {
                        MessageKind::Data(stream) => match Frame::from_bytes(stream.as_bytes()) {
                            Ok(frame) => debug!(
                                entities = frame.len(),
                                timestamp = frame.timestamp(),
                                "Frame received"
                            ),
                            Err(e) => warn!(error = %e, "Malformed frame"),
                        },
                        MessageKind::Disconnect => warn!("Server closed the connection"),
                        MessageKind::Connect => {}
                    }
                }
            }
        }
    }

    match client.disconnect().await {
        Ok(outcome) => info!(?outcome, "Client finished"),
        Err(e) => error!(error = %e, "Disconnect failed"),
    }
    ExitCode::SUCCESS
}
