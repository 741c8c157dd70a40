//! Server Configuration
//!
//! Loaded from an optional `config/engagement.toml`, then overridden by
//! environment variables prefixed `ENGAGE__` with `__` between sections,
//! e.g. `ENGAGE__SERVER__PORT=9090`.

use crate::rate_limit::RateLimitConfig;
use alerting::PushConfig;
use ::config::{Config, Environment, File};
use pipeline::SessionConfig;
use serde::{Deserialize, Serialize};
use signaling::RelayConfig;
use thiserror::Error;

/// Default configuration file, without extension
pub const DEFAULT_CONFIG_PATH: &str = "config/engagement";

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] ::config::ConfigError),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Base URL the phone opens; the room id is appended as a query parameter
    pub public_base_url: String,
    /// Buffered alert outputs per `/ws/alerts` subscriber
    pub alert_stream_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            public_base_url: "http://localhost:8080".to_string(),
            alert_stream_capacity: 64,
        }
    }
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// In-memory retention limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub max_sample_records: usize,
    pub max_alert_records: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            max_sample_records: 100_000,
            max_alert_records: 10_000,
        }
    }
}

/// Top-level application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub rate_limit: RateLimitConfig,
    pub relay: RelayConfig,
    pub storage: StorageConfig,
    /// Defaults for sessions started through this server
    pub session: SessionConfig,
    /// MQTT push channel; disabled when absent
    pub push: Option<PushConfig>,
}

impl AppConfig {
    /// Load from the default file location and the environment
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Load from `path` (optional, any format `config` understands) and the environment
    pub fn load_from(path: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = Config::builder()
            .add_source(File::with_name(path).required(false))
            .add_source(
                Environment::with_prefix("ENGAGE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.public_base_url.is_empty() {
            return Err(ConfigError::Invalid("server.public_base_url is empty".to_string()));
        }
        if self.rate_limit.per_second == 0 || self.rate_limit.burst_size == 0 {
            return Err(ConfigError::Invalid(
                "rate_limit.per_second and rate_limit.burst_size must be non-zero".to_string(),
            ));
        }
        if self.relay.max_rooms == 0 {
            return Err(ConfigError::Invalid("relay.max_rooms must be non-zero".to_string()));
        }
        self.session
            .alerts
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.server.bind_addr(), "0.0.0.0:8080");
        assert!(config.push.is_none());
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let config = AppConfig::load_from("does/not/exist").unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.session.alerts.cooldown_ms, 30_000);
    }

    #[test]
    fn test_file_overrides() {
        let path = std::env::temp_dir().join(format!("engagement-{}.toml", uuid::Uuid::new_v4()));
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            r#"
[server]
port = 9191
public_base_url = "https://monitor.example.org"

[session.alerts]
cooldown_ms = 60000

[push]
broker_host = "mqtt.example.org"
"#
        )
        .unwrap();

        let config = AppConfig::load_from(path.to_str().unwrap()).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(config.server.port, 9191);
        assert_eq!(config.server.public_base_url, "https://monitor.example.org");
        assert_eq!(config.session.alerts.cooldown_ms, 60_000);
        // Unset sections keep their defaults
        assert_eq!(config.session.alerts.max_alerts_per_hour, 30);
        let push = config.push.unwrap();
        assert_eq!(push.broker_host, "mqtt.example.org");
        assert_eq!(push.broker_port, 1883);
    }

    #[test]
    fn test_invalid_alert_thresholds_rejected() {
        let mut config = AppConfig::default();
        config.session.alerts.cooldown_ms = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }
}
