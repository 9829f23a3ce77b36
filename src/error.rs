//! # Error Types
//!
//! Custom error types for VA Meter using `thiserror`.

use thiserror::Error;

use crate::logger::TransportError;
use crate::sensor::SensorError;

/// Main error type for VA Meter
#[derive(Debug, Error)]
pub enum VaMeterError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serial port could not be opened
    #[error("Serial error: {0}")]
    Serial(String),

    /// Sensor failed during initialization
    #[error("Sensor error: {0}")]
    Sensor(#[from] SensorError),

    /// Log transport could not be set up
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
}

/// Result type alias for VA Meter
pub type Result<T> = std::result::Result<T, VaMeterError>;
