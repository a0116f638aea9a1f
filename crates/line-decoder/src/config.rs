//! Decoder configuration

use crate::error::DecoderError;
use crate::limits::DEFAULT_CAPACITY;
use crate::TERMINATOR;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Environment variable prefix for overrides (e.g. `POCKETLOC_DEVICE_ID`)
const ENV_PREFIX: &str = "POCKETLOC";

/// What the drain does with bytes that no longer fit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverflowPolicy {
    /// Drop new bytes until the buffer is cleared
    #[default]
    Stall,
    /// Clear the buffer and skip input through the next `\n`
    Resync,
}

/// Decoder configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecoderConfig {
    /// Input buffer capacity (bytes)
    pub capacity: usize,

    /// Sensor channels that receive every configuration command
    pub channels: Vec<u8>,

    /// Reply to `ID`
    pub device_id: String,

    /// Reply to an empty line
    pub banner: String,

    /// Overflow handling
    pub overflow_policy: OverflowPolicy,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            channels: vec![0, 1],
            device_id: "PocketLoCSensor".to_string(),
            banner: "Greetings from Max! Have fun with the Pocket LoC v1.".to_string(),
            overflow_policy: OverflowPolicy::Stall,
        }
    }
}

impl DecoderConfig {
    /// Default config that recovers from overlong lines
    pub fn resync() -> Self {
        Self {
            overflow_policy: OverflowPolicy::Resync,
            ..Default::default()
        }
    }

    /// Load defaults, then an optional file, then `POCKETLOC_*` variables
    pub fn load(path: Option<&Path>) -> Result<Self, DecoderError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        }
        let config: DecoderConfig = builder
            .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML document over the defaults
    pub fn from_toml_str(text: &str) -> Result<Self, DecoderError> {
        let config: DecoderConfig = config::Config::builder()
            .add_source(config::File::from_str(text, config::FileFormat::Toml))
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Check that the decoder can run with these values
    pub fn validate(&self) -> Result<(), DecoderError> {
        if self.capacity < TERMINATOR.len() {
            return Err(DecoderError::InvalidConfig(format!(
                "capacity {} cannot hold a terminator",
                self.capacity
            )));
        }
        if self.channels.is_empty() {
            return Err(DecoderError::InvalidConfig(
                "at least one sensor channel is required".to_string(),
            ));
        }
        let mut seen = self.channels.clone();
        seen.sort_unstable();
        seen.dedup();
        if seen.len() != self.channels.len() {
            return Err(DecoderError::InvalidConfig(format!(
                "duplicate sensor channels in {:?}",
                self.channels
            )));
        }
        for (name, value) in [("device_id", &self.device_id), ("banner", &self.banner)] {
            if value.contains(['\r', '\n']) {
                return Err(DecoderError::InvalidConfig(format!(
                    "{} must be a single line",
                    name
                )));
            }
        }
        Ok(())
    }
}
