/*!
Configuration management for the beacon monitor.
*/

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use anyhow::{Context, Result};

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub monitor: MonitorConfig,
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: AppConfig = toml::from_str(&content)
            .with_context(|| "Failed to parse config file as TOML")?;

        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .with_context(|| "Failed to serialize config to TOML")?;

        std::fs::write(path.as_ref(), content)
            .with_context(|| format!("Failed to write config file: {}", path.as_ref().display()))?;

        Ok(())
    }
}

/// Advertisement ingest and tracking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// File of newline-delimited advertisement records; stdin when unset
    pub input_path: Option<String>,

    /// Receive advertisement records over UDP instead of a file/stdin
    pub udp_enabled: bool,

    /// UDP bind address
    pub udp_bind_addr: String,

    /// UDP port to listen on
    pub udp_port: u16,

    /// Socket receive buffer size in bytes
    pub udp_recv_buffer_bytes: usize,

    /// Channel buffer size between the reader and the decoder
    pub channel_buffer_size: usize,

    /// Forget a beacon after this long without a UID/EID/URL/TLM frame
    pub beacon_expiration_ms: u64,

    /// How often to sweep for expired beacons
    pub expiry_check_interval_ms: u64,

    /// Statistics reporting interval in seconds (0 disables)
    pub stats_interval_seconds: u64,
}

impl MonitorConfig {
    pub fn beacon_expiration(&self) -> Duration {
        Duration::from_millis(self.beacon_expiration_ms)
    }

    pub fn expiry_check_interval(&self) -> Duration {
        Duration::from_millis(self.expiry_check_interval_ms.max(1))
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            input_path: None,
            udp_enabled: false,
            udp_bind_addr: "0.0.0.0".to_string(),
            udp_port: 5577,
            udp_recv_buffer_bytes: 256 * 1024,
            channel_buffer_size: 1000,
            beacon_expiration_ms: 10_000,
            expiry_check_interval_ms: 500,
            stats_interval_seconds: 60,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Maximum log level (trace, debug, info, warn, error)
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}
