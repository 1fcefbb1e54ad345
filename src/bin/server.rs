//! Authoritative tickwire server.
//!
//! Usage: `tickwire-server [config.toml]`
//!
//! Without a config file the defaults apply, overridden by `TICKWIRE_*`
//! environment variables. SIGINT and SIGTERM stop the tick loop after the
//! current tick and disconnect every client.

use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use tickwire::config::NetworkConfig;
use tickwire::service::server::Server;
use tickwire::service::tick::TickLoop;
use tickwire::utils::logging::init_logging;
use tickwire::utils::metrics::global_metrics;

fn load_config() -> tickwire::Result<NetworkConfig> {
    let mut config = match std::env::args().nth(1) {
        Some(path) => NetworkConfig::from_file(path)?,
        None => NetworkConfig::default(),
    };
    config.apply_env(|key| std::env::var(key).ok());
    Ok(config)
}

/// Cancel `shutdown` on SIGINT, or SIGTERM where supported
async fn cancel_on_signal(shutdown: CancellationToken) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => info!("Received SIGINT, shutting down"),
                    _ = term.recv() => info!("Received SIGTERM, shutting down"),
                }
            }
            Err(e) => {
                warn!(error = %e, "SIGTERM handler unavailable");
                if let Ok(()) = tokio::signal::ctrl_c().await {
                    info!("Received SIGINT, shutting down");
                }
            }
        }
    }
    #[cfg(not(unix))]
    {
        if let Ok(()) = tokio::signal::ctrl_c().await {
            info!("Received CTRL+C, shutting down");
        }
    }
    shutdown.cancel();
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
    if let Err(e) = config.validate_strict() {
        error!(error = %e, "Invalid configuration");
        return ExitCode::FAILURE;
    }

    let server = match Server::bind(&config).await {
        Ok(server) => server,
        Err(e) => {
            error!(error = %e, port = config.server.port, "Failed to start server");
            return ExitCode::FAILURE;
        }
    };
    info!(
        port = config.server.port,
        max_clients = config.server.max_clients,
        tick_rate = config.server.tick_rate,
        "Server listening"
    );

    let shutdown = CancellationToken::new();
    tokio::spawn(cancel_on_signal(shutdown.clone()));

    let result = TickLoop::new(server, &config.server, shutdown).run().await;
    global_metrics().log_metrics();

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Tick loop failed");
            ExitCode::FAILURE
        }
    }
}
