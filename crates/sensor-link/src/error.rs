//! Sensor Link Error Types

use thiserror::Error;

/// Errors that can occur while talking to the sensor
#[derive(Debug, Error)]
pub enum LinkError {
    /// Serial port connection error
    #[error("Serial port error: {0}")]
    SerialError(String),

    /// Timeout waiting for a reply line
    #[error("Timeout waiting for sensor reply after {0}ms")]
    Timeout(u64),

    /// Reply did not match the command that was sent
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Device answered `Wrong command (...)`
    #[error("Command rejected by device: {0}")]
    Rejected(String),

    /// Identifier does not match the expected device
    #[error("Device mismatch: expected {expected}, got {actual}")]
    DeviceMismatch { expected: String, actual: String },

    /// No port answered with the expected identifier
    #[error("No matching sensor found")]
    DeviceNotFound,

    /// Sample line could not be parsed
    #[error("Invalid sample line: {0}")]
    InvalidSample(String),

    /// Link closed by the device
    #[error("Sensor disconnected")]
    Disconnected,

    /// Configuration could not be loaded
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<std::io::Error> for LinkError {
    fn from(err: std::io::Error) -> Self {
        LinkError::SerialError(err.to_string())
    }
}

impl From<tokio_serial::Error> for LinkError {
    fn from(err: tokio_serial::Error) -> Self {
        LinkError::SerialError(err.to_string())
    }
}

impl From<config::ConfigError> for LinkError {
    fn from(err: config::ConfigError) -> Self {
        LinkError::Config(err.to_string())
    }
}
