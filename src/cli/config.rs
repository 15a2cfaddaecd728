//! Configuration module
//!
//! Handles loading and validating client configuration from TOML files.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use uuid::Uuid;

use crate::connection::transport::{ConnectOptions, TransportKind};

/// Main configuration structure for the wireline client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Caller-supplied identifier carried in the presence payload; passed
    /// through opaquely, no authentication attached
    #[serde(default = "default_user_id")]
    pub user_id: String,

    /// Connection endpoints
    #[serde(default)]
    pub endpoint: EndpointConfig,

    /// Multiplexed-event transport settings
    #[serde(default)]
    pub connection: ConnectionConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Connection endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointConfig {
    /// Base address for the multiplexed-event client
    #[serde(default = "default_event_url")]
    pub event_url: String,

    /// Address for the raw socket client
    #[serde(default = "default_socket_url")]
    pub socket_url: String,
}

/// Multiplexed-event transport configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Preferred protocol ordering, first match wins
    #[serde(default = "default_transports")]
    pub transports: Vec<TransportKind>,

    /// Whether the transport reconnects on its own
    #[serde(default = "default_true")]
    pub reconnection: bool,

    /// Maximum reconnection attempts before giving up
    #[serde(default = "default_reconnection_attempts")]
    pub reconnection_attempts: u32,

    /// Delay between reconnection attempts in milliseconds
    #[serde(default = "default_reconnection_delay")]
    pub reconnection_delay_ms: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (pretty, json, compact)
    #[serde(default = "default_log_format")]
    pub format: String,
}

// Default value functions
fn default_user_id() -> String {
    Uuid::new_v4().to_string()
}

fn default_event_url() -> String {
    "http://localhost:5000".to_string()
}

fn default_socket_url() -> String {
    "ws://127.0.0.1:5000/ws".to_string()
}

fn default_transports() -> Vec<TransportKind> {
    vec![TransportKind::WebSocket, TransportKind::Polling]
}

fn default_true() -> bool {
    true
}

fn default_reconnection_attempts() -> u32 {
    5
}

fn default_reconnection_delay() -> u64 {
    1000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            event_url: default_event_url(),
            socket_url: default_socket_url(),
        }
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            transports: default_transports(),
            reconnection: default_true(),
            reconnection_attempts: default_reconnection_attempts(),
            reconnection_delay_ms: default_reconnection_delay(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl LoggingConfig {
    /// Resolve the configured level string, falling back to INFO on
    /// anything unrecognized
    pub fn max_level(&self) -> tracing::Level {
        self.level.parse().unwrap_or(tracing::Level::INFO)
    }
}

impl ConnectionConfig {
    /// Connect options for the multiplexed-event transport
    pub fn connect_options(&self) -> ConnectOptions {
        ConnectOptions {
            transports: self.transports.clone(),
            reconnection: self.reconnection,
            reconnection_attempts: self.reconnection_attempts,
            reconnection_delay: Duration::from_millis(self.reconnection_delay_ms),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Load configuration, falling back to defaults when the file is absent
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            Self::load(path)
        } else {
            Ok(Self::default_config())
        }
    }

    /// Create a default configuration
    pub fn default_config() -> Self {
        Self {
            user_id: default_user_id(),
            endpoint: EndpointConfig::default(),
            connection: ConnectionConfig::default(),
            logging: LoggingConfig::default(),
        }
    }

    /// Save configuration to a TOML file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .context("Failed to serialize configuration")?;

        std::fs::write(path.as_ref(), content)
            .with_context(|| format!("Failed to write config file: {}", path.as_ref().display()))?;

        Ok(())
    }

    /// Raw socket address with the caller identifier as a query parameter
    pub fn socket_address(&self) -> String {
        let url = &self.endpoint.socket_url;
        if url.contains('?') {
            url.clone()
        } else {
            format!("{}?userID={}", url, self.user_id)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default_config();
        assert!(!config.user_id.is_empty());
        assert_eq!(config.endpoint.event_url, "http://localhost:5000");
        assert_eq!(config.endpoint.socket_url, "ws://127.0.0.1:5000/ws");
        assert!(config.connection.reconnection);
        assert_eq!(config.connection.reconnection_attempts, 5);
    }

    #[test]
    fn test_parse_minimal_config() {
        let toml_content = r#"
            user_id = "u1"
        "#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert_eq!(config.user_id, "u1");
        assert_eq!(config.endpoint.event_url, "http://localhost:5000");
        assert_eq!(
            config.connection.transports,
            vec![TransportKind::WebSocket, TransportKind::Polling]
        );
    }

    #[test]
    fn test_parse_transport_ordering() {
        let toml_content = r#"
            [connection]
            transports = ["polling", "websocket"]
            reconnection = false
        "#;

        let config: Config = toml::from_str(toml_content).unwrap();
        let options = config.connection.connect_options();
        assert_eq!(
            options.transports,
            vec![TransportKind::Polling, TransportKind::WebSocket]
        );
        assert!(!options.reconnection);
        assert_eq!(options.reconnection_delay, Duration::from_millis(1000));
    }

    #[test]
    fn test_logging_level_resolution() {
        let mut logging = LoggingConfig::default();
        assert_eq!(logging.max_level(), tracing::Level::INFO);

        logging.level = "debug".to_string();
        assert_eq!(logging.max_level(), tracing::Level::DEBUG);

        logging.level = "noisy".to_string();
        assert_eq!(logging.max_level(), tracing::Level::INFO);
    }

    #[test]
    fn test_socket_address_carries_user_id() {
        let mut config = Config::default_config();
        config.user_id = "u1".to_string();
        assert_eq!(
            config.socket_address(),
            "ws://127.0.0.1:5000/ws?userID=u1"
        );

        // Explicit query strings are left alone
        config.endpoint.socket_url = "ws://127.0.0.1:5000/ws?userID=other".to_string();
        assert_eq!(
            config.socket_address(),
            "ws://127.0.0.1:5000/ws?userID=other"
        );
    }
}
