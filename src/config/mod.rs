/// Configuration management for vigia

use crate::utils::split_host_port;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Main vigia configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    pub server: ServerConfig,
    /// Sentinel (primary address authority) configuration
    pub sentinel: SentinelConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to listen on
    pub listen_addr: String,
    /// Timeout for dialing the primary on behalf of a client, in milliseconds
    pub dial_timeout_ms: u64,
    /// Number of worker threads
    pub worker_threads: Option<usize>,
}

/// Sentinel configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SentinelConfig {
    /// Sentinel address (host:port)
    pub addr: String,
    /// Name of the monitored primary group
    pub master_name: String,
    /// Polling period in milliseconds
    pub poll_interval_ms: u64,
    /// Connect timeout towards the sentinel in milliseconds
    pub connect_timeout_ms: u64,
    /// Connect-only probe timeout towards a resolved primary in milliseconds
    pub probe_timeout_ms: u64,
    /// Upper bound on the bytes read from a single sentinel reply
    pub response_buffer_size: usize,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    pub level: String,
    /// Log format (json, text)
    pub format: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                listen_addr: "0.0.0.0:9999".to_string(),
                dial_timeout_ms: 5000,
                worker_threads: None, // Use system default
            },
            sentinel: SentinelConfig {
                addr: "127.0.0.1:26379".to_string(),
                master_name: "mymaster".to_string(),
                poll_interval_ms: 1000,
                connect_timeout_ms: 500,
                probe_timeout_ms: 500,
                response_buffer_size: 256,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "text".to_string(),
            },
        }
    }
}

impl SentinelConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }
}

impl ServerConfig {
    pub fn dial_timeout(&self) -> Duration {
        Duration::from_millis(self.dial_timeout_ms)
    }
}

impl Config {
    /// Load configuration from TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| ConfigError::ParseError(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        fs::write(path, content)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        // Validate server config
        split_host_port(&self.server.listen_addr).map_err(|e| {
            ConfigError::ValidationError(format!(
                "Invalid listen_addr {}: {}",
                self.server.listen_addr, e
            ))
        })?;

        if self.server.dial_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "dial_timeout_ms must be greater than 0".to_string(),
            ));
        }

        if self.server.worker_threads == Some(0) {
            return Err(ConfigError::ValidationError(
                "worker_threads must be greater than 0 when set".to_string(),
            ));
        }

        // Validate sentinel config
        split_host_port(&self.sentinel.addr).map_err(|e| {
            ConfigError::ValidationError(format!(
                "Invalid sentinel addr {}: {}",
                self.sentinel.addr, e
            ))
        })?;

        if self.sentinel.master_name.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "master_name cannot be empty".to_string(),
            ));
        }

        if self.sentinel.master_name.contains(char::is_whitespace) {
            return Err(ConfigError::ValidationError(format!(
                "master_name must be a single word: {:?}",
                self.sentinel.master_name
            )));
        }

        if self.sentinel.poll_interval_ms == 0 {
            return Err(ConfigError::ValidationError(
                "poll_interval_ms must be greater than 0".to_string(),
            ));
        }

        if self.sentinel.connect_timeout_ms == 0 || self.sentinel.probe_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "sentinel timeouts must be greater than 0".to_string(),
            ));
        }

        if self.sentinel.connect_timeout_ms >= self.sentinel.poll_interval_ms
            || self.sentinel.probe_timeout_ms >= self.sentinel.poll_interval_ms
        {
            return Err(ConfigError::ValidationError(
                "sentinel timeouts must be less than poll_interval_ms".to_string(),
            ));
        }

        if self.sentinel.response_buffer_size < 16 {
            return Err(ConfigError::ValidationError(
                "response_buffer_size must be at least 16 bytes".to_string(),
            ));
        }

        // Validate logging config
        match self.logging.level.as_str() {
            "error" | "warn" | "info" | "debug" | "trace" => {}
            _ => return Err(ConfigError::ValidationError(
                format!("Invalid log level: {}", self.logging.level)
            )),
        }

        match self.logging.format.as_str() {
            "json" | "text" => {}
            _ => return Err(ConfigError::ValidationError(
                format!("Invalid log format: {}", self.logging.format)
            )),
        }

        Ok(())
    }

    /// Create example configuration file
    pub fn create_example_config<P: AsRef<Path>>(path: P) -> Result<(), ConfigError> {
        let config = Config {
            sentinel: SentinelConfig {
                addr: "10.0.1.30:26379".to_string(),
                ..Config::default().sentinel
            },
            ..Default::default()
        };

        config.save_to_file(path)
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Serialize error: {0}")]
    SerializeError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),
}
