//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.
//!
//! Every section is optional; a missing section or key takes its default.
//! Session values outside their choice lists are accepted here and snapped to
//! the nearest legal choice when the Config screen opens.

use serde::de::Error;
use serde::Deserialize;
use std::fs;
use std::net::IpAddr;
use std::path::Path;

use crate::error::{Result, VaMeterError};
use crate::keys::KeyEvent;
use crate::machine::SessionSettings;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub session: SessionSettings,

    #[serde(default)]
    pub logger: LoggerConfig,

    #[serde(default)]
    pub keys: KeysConfig,

    #[serde(default)]
    pub sensor: SensorConfig,

    #[serde(default)]
    pub diagnostics: DiagnosticsConfig,
}

/// Link used to reach the collector
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    Udp,
    Tcp,
    Serial,
}

/// Log transport configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggerConfig {
    #[serde(default = "default_transport")]
    pub transport: TransportKind,

    #[serde(default = "default_remote_ip")]
    pub remote_ip: String,

    #[serde(default = "default_remote_port")]
    pub remote_port: u16,

    /// Empty to try the usual USB serial devices
    #[serde(default)]
    pub serial_port: String,

    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    /// Immediate retries after a failed send
    #[serde(default = "default_retry")]
    pub retry: u32,

    /// Time allowed for one stream write or TCP connect
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

/// Key input configuration
#[derive(Debug, Deserialize, Clone, Default)]
pub struct KeysConfig {
    /// Keys replayed one per tick instead of reading the console
    #[serde(default)]
    pub script: Vec<String>,
}

/// Synthetic sensor configuration
#[derive(Debug, Deserialize, Clone)]
pub struct SensorConfig {
    #[serde(default = "default_step_s")]
    pub step_s: f64,

    /// Fail every n-th read (0 = never)
    #[serde(default)]
    pub fail_every: u64,
}

/// Diagnostic log configuration
#[derive(Debug, Deserialize, Clone, Default)]
pub struct DiagnosticsConfig {
    /// Directory for a daily rolling diagnostic log, in addition to stderr
    #[serde(default)]
    pub log_dir: Option<String>,
}

// Default value functions
fn default_transport() -> TransportKind { TransportKind::Udp }
fn default_remote_ip() -> String { "127.0.0.1".to_string() }
fn default_remote_port() -> u16 { 6000 }
fn default_baud_rate() -> u32 { 115_200 }
fn default_retry() -> u32 { crate::logger::DEFAULT_MAX_RETRIES }
fn default_timeout_ms() -> u64 { 100 }

fn default_step_s() -> f64 { crate::sensor::synthetic::DEFAULT_STEP }

/// Baud rates accepted for the serial log link
const BAUD_RATES: &[u32] = &[9600, 19_200, 38_400, 57_600, 115_200, 230_400, 460_800, 921_600];

/// Upper bound on send retries, keeping a tick's worst case short
const MAX_RETRY: u32 = 10;

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            transport: default_transport(),
            remote_ip: default_remote_ip(),
            remote_port: default_remote_port(),
            serial_port: String::new(),
            baud_rate: default_baud_rate(),
            retry: default_retry(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            step_s: default_step_s(),
            fail_every: 0,
        }
    }
}

impl LoggerConfig {
    /// Collector address as `ip:port`.
    pub fn remote_addr(&self) -> String {
        match self.remote_ip.parse::<IpAddr>() {
            Ok(IpAddr::V6(ip)) => format!("[{}]:{}", ip, self.remote_port),
            _ => format!("{}:{}", self.remote_ip, self.remote_port),
        }
    }

    /// Per-record send timeout.
    pub fn send_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.timeout_ms)
    }
}

impl KeysConfig {
    /// Parse the key script.
    ///
    /// `wait` entries become polls without a key. Returns `None` when no
    /// script is configured.
    ///
    /// # Errors
    ///
    /// Returns a configuration error naming the first unknown entry.
    pub fn parse_script(&self) -> Result<Option<Vec<Option<KeyEvent>>>> {
        if self.script.is_empty() {
            return Ok(None);
        }
        self.script
            .iter()
            .map(|entry| {
                if entry.trim().eq_ignore_ascii_case("wait") {
                    Ok(None)
                } else {
                    entry.parse::<KeyEvent>().map(Some).map_err(|e| {
                        VaMeterError::Config(toml::de::Error::custom(format!("keys.script: {}", e)))
                    })
                }
            })
            .collect::<Result<Vec<_>>>()
            .map(Some)
    }
}

fn invalid(message: impl std::fmt::Display) -> VaMeterError {
    VaMeterError::Config(toml::de::Error::custom(message))
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Returns
    ///
    /// * `Result<Config>` - Loaded and validated configuration
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use va_meter::config::Config;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    pub fn validate(&self) -> Result<()> {
        let logger = &self.logger;

        match logger.transport {
            TransportKind::Udp => {
                if logger.remote_ip.parse::<IpAddr>().is_err() {
                    return Err(invalid(format!(
                        "remote_ip '{}' is not an IP address",
                        logger.remote_ip
                    )));
                }
            }
            TransportKind::Tcp => {
                // Host names are resolved at connect time
                if logger.remote_ip.trim().is_empty() {
                    return Err(invalid("remote_ip cannot be empty"));
                }
            }
            TransportKind::Serial => {
                if !BAUD_RATES.contains(&logger.baud_rate) {
                    return Err(invalid(format!(
                        "baud_rate must be one of: {}",
                        BAUD_RATES
                            .iter()
                            .map(u32::to_string)
                            .collect::<Vec<_>>()
                            .join(", ")
                    )));
                }
            }
        }

        if logger.transport != TransportKind::Serial && logger.remote_port == 0 {
            return Err(invalid("remote_port must be between 1 and 65535"));
        }

        if logger.retry > MAX_RETRY {
            return Err(invalid(format!("retry must be between 0 and {}", MAX_RETRY)));
        }

        if logger.timeout_ms == 0 || logger.timeout_ms > 10000 {
            return Err(invalid("timeout_ms must be between 1 and 10000"));
        }

        if !self.sensor.step_s.is_finite() || self.sensor.step_s <= 0.0 {
            return Err(invalid("sensor step_s must be a positive number"));
        }

        if let Some(dir) = &self.diagnostics.log_dir {
            if dir.trim().is_empty() {
                return Err(invalid("diagnostics log_dir cannot be empty when set"));
            }
        }

        self.keys.parse_script()?;

        Ok(())
    }
}
