//! Sensor Collaborators
//!
//! The decoder configures the sensor through these traits; how a channel
//! applies a setting is up to the implementation.

use crate::command::AdcSelection;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Sensor configuration actions, one call per managed channel
pub trait SensorConfig {
    /// Set the sample time per conversion (ms, already clamped)
    fn set_sample_time(&mut self, channel: u8, ms: u8);

    /// Set the gain level (already clamped)
    fn set_gain(&mut self, channel: u8, level: u8);

    /// Select which photodiodes are connected to the ADCs
    fn set_adc_config(&mut self, channel: u8, selection: &AdcSelection);
}

/// Visual "streaming active" indicator
pub trait StatusIndicator {
    /// Turn the indicator on or off
    fn set_active(&mut self, active: bool);
}

/// Settings last applied to one sensor channel
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelSettings {
    /// Sample time (ms)
    pub sample_time_ms: Option<u8>,
    /// Gain level
    pub gain_level: Option<u8>,
    /// Photodiode selection
    pub adc: Option<AdcSelection>,
}

/// In-process sensor that records every applied setting
///
/// Backs the simulator binary and doubles as a test collaborator.
#[derive(Debug, Default)]
pub struct SimulatedSensor {
    /// Settings by channel
    channels: BTreeMap<u8, ChannelSettings>,
    /// Indicator state
    indicator: bool,
    /// Number of indicator transitions
    indicator_toggles: usize,
}

impl SimulatedSensor {
    /// Create a sensor with no settings applied
    pub fn new() -> Self {
        Self::default()
    }

    /// Settings for a channel, if it was ever configured
    pub fn channel(&self, channel: u8) -> Option<&ChannelSettings> {
        self.channels.get(&channel)
    }

    /// Channels that received at least one setting
    pub fn configured_channels(&self) -> Vec<u8> {
        self.channels.keys().copied().collect()
    }

    /// Current indicator state
    pub fn indicator(&self) -> bool {
        self.indicator
    }

    /// Number of indicator on/off transitions
    pub fn indicator_toggles(&self) -> usize {
        self.indicator_toggles
    }
}

impl SensorConfig for SimulatedSensor {
    fn set_sample_time(&mut self, channel: u8, ms: u8) {
        debug!("Channel {} sample time -> {}ms", channel, ms);
        self.channels.entry(channel).or_default().sample_time_ms = Some(ms);
    }

    fn set_gain(&mut self, channel: u8, level: u8) {
        debug!("Channel {} gain level -> {}", channel, level);
        self.channels.entry(channel).or_default().gain_level = Some(level);
    }

    fn set_adc_config(&mut self, channel: u8, selection: &AdcSelection) {
        debug!("Channel {} ADC selection -> {}", channel, selection.to_digits());
        self.channels.entry(channel).or_default().adc = Some(*selection);
    }
}

impl StatusIndicator for SimulatedSensor {
    fn set_active(&mut self, active: bool) {
        if self.indicator != active {
            info!("Status indicator {}", if active { "on" } else { "off" });
            self.indicator_toggles += 1;
        }
        self.indicator = active;
    }
}
