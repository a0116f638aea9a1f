//! Command Grammar
//!
//! Defines the text commands accepted by the device and their parsing and
//! encoding. Lines are expected uppercase and without the terminator.

use crate::limits::{
    ADC_CHANNELS, GAIN_LEVEL_MAX, GAIN_LEVEL_MIN, SAMPLE_TIME_MAX_MS, SAMPLE_TIME_MIN_MS,
};
use serde::{Deserialize, Serialize};

/// Photodiodes selectable through the `C` command, in wire order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum AdcChannel {
    /// 415 nm
    F1 = 0,
    /// 445 nm
    F2 = 1,
    /// 480 nm
    F3 = 2,
    /// 515 nm
    F4 = 3,
    /// 555 nm
    F5 = 4,
    /// 590 nm
    F6 = 5,
    /// 630 nm
    F7 = 6,
    /// 680 nm
    F8 = 7,
    /// Unfiltered
    Clear = 8,
    /// Near infrared
    Nir = 9,
}

impl AdcChannel {
    /// All channels in wire order
    pub const ALL: [AdcChannel; ADC_CHANNELS] = [
        AdcChannel::F1,
        AdcChannel::F2,
        AdcChannel::F3,
        AdcChannel::F4,
        AdcChannel::F5,
        AdcChannel::F6,
        AdcChannel::F7,
        AdcChannel::F8,
        AdcChannel::Clear,
        AdcChannel::Nir,
    ];

    /// Position of this channel in the selection mask
    pub fn index(&self) -> usize {
        *self as usize
    }

    /// Short label used in sample headers
    pub fn label(&self) -> &'static str {
        match self {
            AdcChannel::F1 => "F1",
            AdcChannel::F2 => "F2",
            AdcChannel::F3 => "F3",
            AdcChannel::F4 => "F4",
            AdcChannel::F5 => "F5",
            AdcChannel::F6 => "F6",
            AdcChannel::F7 => "F7",
            AdcChannel::F8 => "F8",
            AdcChannel::Clear => "CLEAR",
            AdcChannel::Nir => "NIR",
        }
    }
}

/// Enable mask for the ten photodiodes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdcSelection([bool; ADC_CHANNELS]);

impl AdcSelection {
    /// Every channel enabled
    pub const ALL: AdcSelection = AdcSelection([true; ADC_CHANNELS]);
    /// Every channel disabled
    pub const NONE: AdcSelection = AdcSelection([false; ADC_CHANNELS]);

    /// Create a selection from raw flags
    pub fn from_flags(flags: [bool; ADC_CHANNELS]) -> Self {
        Self(flags)
    }

    /// Create a selection enabling only the given channels
    pub fn from_channels(channels: &[AdcChannel]) -> Self {
        let mut flags = [false; ADC_CHANNELS];
        for channel in channels {
            flags[channel.index()] = true;
        }
        Self(flags)
    }

    /// Parse the digits that follow `C`
    ///
    /// Each position is read as a one-character integer and clamped to
    /// {0, 1}: `0` and non-digits disable, `1`..`9` enable. Positions past the
    /// end of `digits` are disabled and anything after the tenth is ignored.
    pub fn parse(digits: &[u8]) -> Self {
        let mut flags = [false; ADC_CHANNELS];
        for (i, flag) in flags.iter_mut().enumerate() {
            *flag = digits
                .get(i)
                .map(|&c| parse_int(&[c]).clamp(0, 1) == 1)
                .unwrap_or(false);
        }
        Self(flags)
    }

    /// Raw flags in wire order
    pub fn flags(&self) -> [bool; ADC_CHANNELS] {
        self.0
    }

    /// Check whether a channel is enabled
    pub fn is_enabled(&self, channel: AdcChannel) -> bool {
        self.0[channel.index()]
    }

    /// Enabled channels in wire order
    pub fn enabled(&self) -> Vec<AdcChannel> {
        AdcChannel::ALL
            .iter()
            .copied()
            .filter(|c| self.is_enabled(*c))
            .collect()
    }

    /// Number of enabled channels
    pub fn enabled_count(&self) -> usize {
        self.0.iter().filter(|&&f| f).count()
    }

    /// Encode as ten `0`/`1` digits
    pub fn to_digits(&self) -> String {
        self.0.iter().map(|&f| if f { '1' } else { '0' }).collect()
    }
}

/// A decoded command line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    /// `T<ms>`: sample time per conversion
    SetSampleTime { ms: u8 },
    /// `G<level>`: gain level, multiplier 2^(level-1)
    SetGain { level: u8 },
    /// `C<10 digits>`: photodiode enable mask
    SetAdcConfig(AdcSelection),
    /// `START`: begin streaming
    Start,
    /// `STOP`: stop streaming
    Stop,
    /// `ID`: query the device identifier
    Identify,
    /// Bare terminator
    Empty,
    /// Anything else, kept verbatim for the diagnostic reply
    Unrecognized(Vec<u8>),
}

impl Command {
    /// Classify a line
    ///
    /// The first matching rule wins: leading `T`, `G`, `C`, then the exact
    /// words `START`, `STOP`, `ID`.
    pub fn parse(line: &[u8]) -> Command {
        match line.first() {
            None => Command::Empty,
            Some(b'T') => Command::SetSampleTime {
                ms: parse_int(&line[1..])
                    .clamp(SAMPLE_TIME_MIN_MS as i64, SAMPLE_TIME_MAX_MS as i64)
                    as u8,
            },
            Some(b'G') => Command::SetGain {
                level: parse_int(&line[1..]).clamp(GAIN_LEVEL_MIN as i64, GAIN_LEVEL_MAX as i64)
                    as u8,
            },
            Some(b'C') => Command::SetAdcConfig(AdcSelection::parse(&line[1..])),
            Some(_) => match line {
                b"START" => Command::Start,
                b"STOP" => Command::Stop,
                b"ID" => Command::Identify,
                _ => Command::Unrecognized(line.to_vec()),
            },
        }
    }

    /// Canonical wire form, without terminator
    ///
    /// Unrecognized bytes that are not valid UTF-8 are replaced.
    pub fn encode(&self) -> String {
        match self {
            Command::SetSampleTime { ms } => format!("T{}", ms),
            Command::SetGain { level } => format!("G{}", level),
            Command::SetAdcConfig(selection) => format!("C{}", selection.to_digits()),
            Command::Start => "START".to_string(),
            Command::Stop => "STOP".to_string(),
            Command::Identify => "ID".to_string(),
            Command::Empty => String::new(),
            Command::Unrecognized(raw) => String::from_utf8_lossy(raw).into_owned(),
        }
    }

    /// Short name for logs and metrics labels
    pub fn name(&self) -> &'static str {
        match self {
            Command::SetSampleTime { .. } => "sample_time",
            Command::SetGain { .. } => "gain",
            Command::SetAdcConfig(_) => "adc_config",
            Command::Start => "start",
            Command::Stop => "stop",
            Command::Identify => "identify",
            Command::Empty => "empty",
            Command::Unrecognized(_) => "unrecognized",
        }
    }
}

/// Parse a leading decimal integer the way C `atoi` does
///
/// Skips leading ASCII whitespace, accepts one optional sign, then reads
/// digits up to the first non-digit. Text without digits yields 0 and large
/// values saturate instead of overflowing.
pub fn parse_int(text: &[u8]) -> i64 {
    let mut rest = text;
    while let Some((first, tail)) = rest.split_first() {
        if !first.is_ascii_whitespace() {
            break;
        }
        rest = tail;
    }

    let negative = match rest.first() {
        Some(b'-') => {
            rest = &rest[1..];
            true
        }
        Some(b'+') => {
            rest = &rest[1..];
            false
        }
        _ => false,
    };

    let magnitude = rest
        .iter()
        .take_while(|b| b.is_ascii_digit())
        .fold(0i64, |acc, &d| {
            acc.saturating_mul(10).saturating_add((d - b'0') as i64)
        });

    if negative {
        -magnitude
    } else {
        magnitude
    }
}
