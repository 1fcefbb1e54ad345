//! # Configuration Management
//!
//! Centralized configuration for the tickwire server, client and transport.
//!
//! ## Configuration Sources
//! - TOML files via [`NetworkConfig::from_file`]
//! - Direct instantiation with defaults
//! - `TICKWIRE_*` environment variables via [`NetworkConfig::from_env`]
//!
//! Durations are written as milliseconds and log levels as lowercase strings:
//!
//! ```toml
//! [server]
//! bind_address = "0.0.0.0"
//! port = 7000
//! max_clients = 32
//! tick_rate = 60
//! shutdown_timeout = 5000
//! ```

use crate::error::{ProtocolError, Result};
use crate::transport::datagram::MAX_PAYLOAD_SIZE;
use crate::utils::timeout;
use crate::world::simulation::ENTITY_ID_BASE;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use tracing::Level;

/// Default server port
pub const DEFAULT_PORT: u16 = 7000;

/// Default simulation rate in ticks per second
pub const DEFAULT_TICK_RATE: u32 = 60;

/// Highest accepted tick rate
pub const MAX_TICK_RATE: u32 = 1000;

/// Default number of client slots
pub const DEFAULT_MAX_CLIENTS: usize = 32;

/// Main configuration structure that contains all configurable settings
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct NetworkConfig {
    /// Server-specific configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Client-specific configuration
    #[serde(default)]
    pub client: ClientConfig,

    /// Transport configuration
    #[serde(default)]
    pub transport: TransportConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl NetworkConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = File::open(path)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to open config file: {e}")))?;

        let mut contents = String::new();
        file.read_to_string(&mut contents)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to read config file: {e}")))?;

        Self::from_toml(&contents)
    }

    /// Load configuration from TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str::<Self>(content)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to parse TOML: {e}")))
    }

    /// Load configuration from environment variables on top of the defaults.
    ///
    /// Unparseable values are ignored.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Apply `TICKWIRE_*` overrides read through `lookup`
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(addr) = lookup("TICKWIRE_BIND_ADDRESS") {
            self.server.bind_address = addr;
        }
        if let Some(port) = lookup("TICKWIRE_PORT").and_then(|v| v.parse().ok()) {
            self.server.port = port;
        }
        if let Some(max) = lookup("TICKWIRE_MAX_CLIENTS").and_then(|v| v.parse().ok()) {
            self.server.max_clients = max;
        }
        if let Some(rate) = lookup("TICKWIRE_TICK_RATE").and_then(|v| v.parse().ok()) {
            self.server.tick_rate = rate;
        }
        if let Some(addr) = lookup("TICKWIRE_SERVER_ADDRESS") {
            self.client.address = addr;
        }
        if let Some(ms) = lookup("TICKWIRE_CONNECTION_TIMEOUT_MS").and_then(|v| v.parse().ok()) {
            self.client.connection_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = lookup("TICKWIRE_PEER_TIMEOUT_MS").and_then(|v| v.parse().ok()) {
            self.transport.peer_timeout = Duration::from_millis(ms);
        }
        if let Some(level) = lookup("TICKWIRE_LOG_LEVEL").and_then(|v| v.parse().ok()) {
            self.logging.log_level = level;
        }
    }

    /// Apply overrides to the default configuration
    pub fn default_with_overrides<F>(mutator: F) -> Self
    where
        F: FnOnce(&mut Self),
    {
        let mut config = Self::default();
        mutator(&mut config);
        config
    }

    /// Generate example configuration file content
    pub fn example_config() -> String {
        toml::to_string_pretty(&Self::default())
            .unwrap_or_else(|_| String::from("# Failed to generate example config"))
    }

    /// Save configuration to a file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to serialize config: {e}")))?;

        std::fs::write(path, content)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to write config file: {e}")))?;

        Ok(())
    }

    /// Validate the configuration for common issues and misconfigurations
    ///
    /// Returns a list of validation errors. Empty list means configuration is valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        errors.extend(self.server.validate());
        errors.extend(self.client.validate());
        errors.extend(self.transport.validate());
        errors.extend(self.logging.validate());

        if self.transport.peer_timeout <= self.transport.ping_interval {
            errors.push("Peer timeout must be longer than the ping interval".to_string());
        }

        errors
    }

    /// Validate and return Result - convenience method
    pub fn validate_strict(&self) -> Result<()> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ProtocolError::ConfigError(format!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            )))
        }
    }
}

/// Server-specific configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Interface to bind (e.g., "0.0.0.0")
    pub bind_address: String,

    /// UDP port to listen on
    pub port: u16,

    /// Client slots; ids above this are reserved for server-owned entities
    pub max_clients: usize,

    /// Simulation ticks per second
    pub tick_rate: u32,

    /// Time allowed for clients to acknowledge the shutdown disconnect
    #[serde(with = "duration_serde")]
    pub shutdown_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: String::from("0.0.0.0"),
            port: DEFAULT_PORT,
            max_clients: DEFAULT_MAX_CLIENTS,
            tick_rate: DEFAULT_TICK_RATE,
            shutdown_timeout: timeout::SHUTDOWN_TIMEOUT,
        }
    }
}

impl ServerConfig {
    /// Address the server socket binds to
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.bind_address, self.port)
            .parse()
            .map_err(|e| ProtocolError::ConfigError(format!("Invalid bind address: {e}")))
    }

    /// Wall-clock length of one tick
    pub fn tick_duration(&self) -> Duration {
        Duration::from_secs(1) / self.tick_rate.max(1)
    }

    /// Validate server configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.bind_address.is_empty() {
            errors.push("Bind address cannot be empty".to_string());
        } else if self.socket_addr().is_err() {
            errors.push(format!(
                "Invalid bind address: '{}' (expected an IP such as '0.0.0.0')",
                self.bind_address
            ));
        }

        if self.max_clients == 0 {
            errors.push("Max clients must be greater than 0".to_string());
        } else if self.max_clients >= ENTITY_ID_BASE as usize {
            errors.push(format!(
                "Max clients too large: {} (must be below {ENTITY_ID_BASE})",
                self.max_clients
            ));
        }

        if self.tick_rate == 0 || self.tick_rate > MAX_TICK_RATE {
            errors.push(format!(
                "Invalid tick rate: {} (valid range: 1-{MAX_TICK_RATE})",
                self.tick_rate
            ));
        }

        if self.shutdown_timeout.as_millis() < 100 {
            errors.push("Shutdown timeout too short (minimum: 100ms)".to_string());
        } else if self.shutdown_timeout.as_secs() > 60 {
            errors.push("Shutdown timeout too long (maximum: 60s)".to_string());
        }

        errors
    }
}

/// Client-specific configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClientConfig {
    /// Target server address, "host:port"
    pub address: String,

    /// Timeout for the connect and disconnect handshakes
    #[serde(with = "duration_serde")]
    pub connection_timeout: Duration,

    /// Interval between movement inputs sent by the headless client
    #[serde(with = "duration_serde")]
    pub input_interval: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            address: format!("127.0.0.1:{DEFAULT_PORT}"),
            connection_timeout: timeout::HANDSHAKE_TIMEOUT,
            input_interval: Duration::from_millis(100),
        }
    }
}

impl ClientConfig {
    /// Split `address` into host and port
    pub fn host_and_port(&self) -> Result<(&str, u16)> {
        let (host, port) = self.address.rsplit_once(':').ok_or_else(|| {
            ProtocolError::ConfigError(format!("Missing port in address '{}'", self.address))
        })?;
        let port = port
            .parse()
            .map_err(|e| ProtocolError::ConfigError(format!("Invalid port '{port}': {e}")))?;
        Ok((host, port))
    }

    /// Validate client configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.address.is_empty() {
            errors.push("Client address cannot be empty".to_string());
        } else if self.host_and_port().is_err() {
            errors.push(format!(
                "Invalid client address format: '{}' (expected format: 'example.com:7000')",
                self.address
            ));
        }

        if self.connection_timeout.as_millis() < 100 {
            errors.push("Connection timeout too short (minimum: 100ms)".to_string());
        } else if self.connection_timeout.as_secs() > 300 {
            errors.push("Connection timeout too long (maximum: 300s)".to_string());
        }

        if self.input_interval.is_zero() {
            errors.push("Input interval must be greater than 0".to_string());
        }

        errors
    }
}

/// Transport configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TransportConfig {
    /// Silence after which a peer is considered gone
    #[serde(with = "duration_serde")]
    pub peer_timeout: Duration,

    /// Delay before an unacknowledged reliable packet is resent
    #[serde(with = "duration_serde")]
    pub retransmit_interval: Duration,

    /// Idle time after which a keepalive is sent
    #[serde(with = "duration_serde")]
    pub ping_interval: Duration,

    /// Maximum allowed payload size in bytes
    pub max_payload_size: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            peer_timeout: timeout::PEER_TIMEOUT,
            retransmit_interval: timeout::RETRANSMIT_INTERVAL,
            ping_interval: timeout::KEEPALIVE_INTERVAL,
            max_payload_size: MAX_PAYLOAD_SIZE,
        }
    }
}

impl TransportConfig {
    /// Validate transport configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.max_payload_size == 0 {
            errors.push("Max payload size cannot be 0".to_string());
        } else if self.max_payload_size > MAX_PAYLOAD_SIZE {
            errors.push(format!(
                "Max payload size too large: {} bytes (maximum: {MAX_PAYLOAD_SIZE})",
                self.max_payload_size
            ));
        }

        if self.retransmit_interval.as_millis() < 5 {
            errors.push("Retransmit interval too short (minimum: 5ms)".to_string());
        }

        if self.ping_interval.as_millis() < 10 {
            errors.push("Ping interval too short (minimum: 10ms)".to_string());
        }

        if self.peer_timeout.as_millis() < 100 {
            errors.push("Peer timeout too short (minimum: 100ms)".to_string());
        } else if self.peer_timeout.as_secs() > 300 {
            errors.push("Peer timeout too long (maximum: 300s)".to_string());
        }

        errors
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Application name for logs
    pub app_name: String,

    /// Log level
    #[serde(with = "log_level_serde")]
    pub log_level: Level,

    /// Whether to log to console
    pub log_to_console: bool,

    /// Whether to log to file
    pub log_to_file: bool,

    /// Path to log file (if log_to_file is true)
    pub log_file_path: Option<String>,

    /// Whether to use JSON formatting for logs
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            app_name: String::from("tickwire"),
            log_level: Level::INFO,
            log_to_console: true,
            log_to_file: false,
            log_file_path: None,
            json_format: false,
        }
    }
}

impl LoggingConfig {
    /// Validate logging configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.app_name.is_empty() {
            errors.push("Application name cannot be empty".to_string());
        } else if self.app_name.len() > 64 {
            errors.push(format!(
                "Application name too long: {} characters (maximum: 64)",
                self.app_name.len()
            ));
        }

        if self.log_to_file {
            match self.log_file_path {
                Some(ref path) => {
                    if let Some(parent) = Path::new(path).parent() {
                        if !parent.as_os_str().is_empty() && !parent.exists() {
                            errors.push(format!(
                                "Log file directory does not exist: {}",
                                parent.display()
                            ));
                        }
                    }
                }
                None => errors
                    .push("log_file_path must be specified when log_to_file is true".to_string()),
            }
        }

        if !self.log_to_console && !self.log_to_file {
            errors
                .push("At least one logging output (console or file) must be enabled".to_string());
        }

        errors
    }
}

/// Durations as integer milliseconds
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let millis = duration.as_millis() as u64;
        millis.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

/// `tracing::Level` as a lowercase string
mod log_level_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::str::FromStr;
    use tracing::Level;

    pub fn serialize<S>(level: &Level, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        level.as_str().to_ascii_lowercase().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Level, D::Error>
    where
        D: Deserializer<'de>,
    {
        let level_str = String::deserialize(deserializer)?;
        Level::from_str(&level_str)
            .map_err(|_| serde::de::Error::custom(format!("Invalid log level: {level_str}")))
    }
}
