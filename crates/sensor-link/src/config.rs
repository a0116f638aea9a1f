//! Host configuration

use crate::error::LinkError;
use crate::sample::SampleLayout;
use line_decoder::limits::{
    ADC_CHANNELS, GAIN_LEVEL_MAX, SAMPLE_TIME_MAX_MS, SAMPLE_TIME_MIN_MS,
};
use line_decoder::AdcSelection;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable prefix for overrides (e.g. `POCKETLOC_HOST_LINK__PORT`)
const ENV_PREFIX: &str = "POCKETLOC_HOST";

/// Serial link settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// Serial port path; discovered by USB id when absent
    pub port: Option<String>,
    /// Baud rate
    pub baud_rate: u32,
    /// USB vendor id used for discovery
    pub usb_vid: u16,
    /// USB product id used for discovery
    pub usb_pid: u16,
    /// Identifier the device must report
    pub device_id: String,
    /// Reply timeout (milliseconds)
    pub timeout_ms: u64,
    /// Sample line layout
    pub layout: SampleLayout,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            port: None,
            baud_rate: 9600,
            usb_vid: 0x2341,
            usb_pid: 0x8037,
            device_id: "PocketLoCSensor".to_string(),
            timeout_ms: 1000,
            layout: SampleLayout::default(),
        }
    }
}

/// Settings for a measurement run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Link settings
    pub link: LinkConfig,
    /// Sample time per conversion (ms)
    pub sample_time_ms: u8,
    /// Photodiode mask, ten `0`/`1` digits (F1..F8, CLEAR, NIR)
    pub adc_mask: String,
    /// Fixed gain level; ignored when auto gain is on
    pub gain_level: u8,
    /// Sweep gain levels before measuring
    pub auto_gain: bool,
    /// Samples checked per level during the sweep
    pub auto_gain_samples: usize,
    /// Samples to stream before stopping
    pub sample_count: usize,
    /// Also write samples to this CSV file
    pub csv_path: Option<PathBuf>,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            link: LinkConfig::default(),
            sample_time_ms: 10,
            adc_mask: "1010101101".to_string(),
            gain_level: 10,
            auto_gain: true,
            auto_gain_samples: 100,
            sample_count: 1000,
            csv_path: None,
        }
    }
}

impl HostConfig {
    /// Load defaults, then an optional file, then `POCKETLOC_HOST_*` variables
    pub fn load(path: Option<&Path>) -> Result<Self, LinkError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        }
        let config: HostConfig = builder
            .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML document over the defaults
    pub fn from_toml_str(text: &str) -> Result<Self, LinkError> {
        let config: HostConfig = config::Config::builder()
            .add_source(config::File::from_str(text, config::FileFormat::Toml))
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Photodiode selection from the mask
    pub fn adc_selection(&self) -> AdcSelection {
        AdcSelection::parse(self.adc_mask.as_bytes())
    }

    /// Reject values the device would silently clamp
    pub fn validate(&self) -> Result<(), LinkError> {
        if !(SAMPLE_TIME_MIN_MS..=SAMPLE_TIME_MAX_MS).contains(&self.sample_time_ms) {
            return Err(LinkError::Config(format!(
                "sample_time_ms must be {}..={}",
                SAMPLE_TIME_MIN_MS, SAMPLE_TIME_MAX_MS
            )));
        }
        if self.gain_level > GAIN_LEVEL_MAX {
            return Err(LinkError::Config(format!(
                "gain_level must be at most {}",
                GAIN_LEVEL_MAX
            )));
        }
        if self.adc_mask.len() != ADC_CHANNELS
            || !self.adc_mask.bytes().all(|b| b == b'0' || b == b'1')
        {
            return Err(LinkError::Config(format!(
                "adc_mask must be {} digits of 0 or 1",
                ADC_CHANNELS
            )));
        }
        if self.link.timeout_ms == 0 {
            return Err(LinkError::Config("timeout_ms must be positive".to_string()));
        }
        if self.link.layout.channels == 0 || self.link.layout.values_per_channel == 0 {
            return Err(LinkError::Config(
                "layout needs at least one channel and one value per channel".to_string(),
            ));
        }
        Ok(())
    }
}
