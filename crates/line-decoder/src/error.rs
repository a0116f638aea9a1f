//! Decoder Error Types

use thiserror::Error;

/// Errors surfaced by the decoder
///
/// Malformed input never produces an error; it is answered on the wire.
/// Only collaborator I/O and configuration can fail.
#[derive(Debug, Error)]
pub enum DecoderError {
    /// Writing a reply to the transport failed
    #[error("Transport error: {0}")]
    Transport(String),

    /// Configuration values are unusable
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Configuration sources could not be loaded
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<std::io::Error> for DecoderError {
    fn from(err: std::io::Error) -> Self {
        DecoderError::Transport(err.to_string())
    }
}

impl From<config::ConfigError> for DecoderError {
    fn from(err: config::ConfigError) -> Self {
        DecoderError::Config(err.to_string())
    }
}
