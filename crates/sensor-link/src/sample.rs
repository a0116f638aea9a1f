//! Streamed Sample Lines
//!
//! While streaming, the device writes one tab-separated line per sample: for
//! each sensor channel, its intensity values followed by a saturation field.

use crate::error::LinkError;
use line_decoder::{gain_multiplier, AdcSelection};
use serde::{Deserialize, Serialize};

/// Largest raw count the ADC reports
const ADC_FULL_SCALE: f64 = 65535.0;
/// Integration cycles per millisecond of sample time
const CYCLES_PER_MS: f64 = 18.0;

/// Field layout of a sample line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleLayout {
    /// Sensor channels per line
    pub channels: usize,
    /// Intensity values per channel, before its saturation field
    pub values_per_channel: usize,
}

impl Default for SampleLayout {
    fn default() -> Self {
        Self {
            channels: 2,
            values_per_channel: 6,
        }
    }
}

impl SampleLayout {
    /// Number of fields a line must carry
    pub fn field_count(&self) -> usize {
        self.channels * (self.values_per_channel + 1)
    }
}

/// One sensor channel's part of a sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelReading {
    /// Intensity per enabled photodiode
    pub values: Vec<f64>,
    /// ADC saturated during this sample
    pub saturated: bool,
}

/// A parsed sample line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Host receive time (Unix ms)
    pub timestamp_ms: u64,
    /// Readings by sensor channel
    pub channels: Vec<ChannelReading>,
}

impl Sample {
    /// Parse a line using the given layout
    ///
    /// Extra trailing fields are ignored.
    pub fn parse(line: &str, layout: &SampleLayout, timestamp_ms: u64) -> Result<Self, LinkError> {
        let fields: Vec<&str> = line.trim_end().split('\t').collect();
        if fields.len() < layout.field_count() {
            return Err(LinkError::InvalidSample(format!(
                "expected {} fields, got {}",
                layout.field_count(),
                fields.len()
            )));
        }

        let mut values = Vec::with_capacity(layout.field_count());
        for field in &fields[..layout.field_count()] {
            let value: f64 = field
                .trim()
                .parse()
                .map_err(|_| LinkError::InvalidSample(format!("not a number: {:?}", field)))?;
            values.push(value);
        }

        let channels = values
            .chunks(layout.values_per_channel + 1)
            .map(|chunk| {
                let (readings, saturation) = chunk.split_at(layout.values_per_channel);
                ChannelReading {
                    values: readings.to_vec(),
                    saturated: saturation[0] > 0.0,
                }
            })
            .collect();

        Ok(Self {
            timestamp_ms,
            channels,
        })
    }

    /// Whether any channel saturated
    pub fn is_saturated(&self) -> bool {
        self.channels.iter().any(|c| c.saturated)
    }

    /// Render in the device's wire format, without terminator
    pub fn encode(&self) -> String {
        let mut fields = Vec::new();
        for channel in &self.channels {
            fields.extend(channel.values.iter().map(|v| format!("{:.2}", v)));
            fields.push(if channel.saturated { "1" } else { "0" }.to_string());
        }
        fields.join("\t")
    }

    /// One CSV row: timestamp, then every channel's values
    ///
    /// Saturation flags are left out, as in the header.
    pub fn to_csv_row(&self) -> String {
        let mut fields = vec![self.timestamp_ms.to_string()];
        for channel in &self.channels {
            fields.extend(channel.values.iter().map(|v| v.to_string()));
        }
        fields.join(",")
    }
}

/// CSV header matching [`Sample::to_csv_row`]
///
/// Columns are named `sensor<n>_<photodiode>` after the enabled photodiodes.
/// Columns beyond the enabled ones are numbered instead.
pub fn csv_header(layout: &SampleLayout, selection: &AdcSelection) -> String {
    let enabled = selection.enabled();
    let mut columns = vec!["timestamp".to_string()];
    for channel in 0..layout.channels {
        for value in 0..layout.values_per_channel {
            let column = match enabled.get(value) {
                Some(photodiode) => format!("sensor{}_{}", channel, photodiode.label()),
                None => format!("sensor{}_{}", channel, value),
            };
            columns.push(column);
        }
    }
    columns.join(",")
}

/// Tracks saturation across a stream so it is reported once per episode
#[derive(Debug, Clone, Copy, Default)]
pub struct SaturationWatch {
    saturated: bool,
}

impl SaturationWatch {
    /// Record a sample; true when saturation has just begun
    pub fn observe(&mut self, sample: &Sample) -> bool {
        let saturated = sample.is_saturated();
        let began = saturated && !self.saturated;
        self.saturated = saturated;
        began
    }
}

/// Quick check used to skip sample lines while waiting for a reply
pub fn looks_like_sample(line: &str) -> bool {
    line.contains('\t')
        && line
            .split('\t')
            .next()
            .map(|f| f.trim().parse::<f64>().is_ok())
            .unwrap_or(false)
}

/// Current time (Unix ms)
pub fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Largest physical intensity representable at a gain level and sample time
pub fn value_limit(gain_level: u8, sample_time_ms: u8) -> f64 {
    ADC_FULL_SCALE / (gain_multiplier(gain_level) * sample_time_ms.max(1) as f64 * CYCLES_PER_MS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use line_decoder::Reply;
    use proptest::prelude::*;

    const LINE: &str = concat!(
        "1.00\t2.00\t3.00\t4.00\t5.00\t6.00\t0\t",
        "7.00\t8.00\t9.00\t10.00\t11.00\t12.00\t1\r\n",
    );

    #[test]
    fn test_parse_default_layout() {
        let sample = Sample::parse(LINE, &SampleLayout::default(), 42).unwrap();
        assert_eq!(sample.timestamp_ms, 42);
        assert_eq!(sample.channels.len(), 2);
        assert_eq!(sample.channels[0].values, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert!(!sample.channels[0].saturated);
        assert_eq!(sample.channels[1].values[5], 12.0);
        assert!(sample.channels[1].saturated);
        assert!(sample.is_saturated());
    }

    #[test]
    fn test_parse_rejects_short_line() {
        let result = Sample::parse("1\t2\t3", &SampleLayout::default(), 0);
        assert!(matches!(result, Err(LinkError::InvalidSample(_))));
    }

    #[test]
    fn test_parse_rejects_non_numeric() {
        let line = LINE.replace("5.00", "abc");
        let result = Sample::parse(&line, &SampleLayout::default(), 0);
        assert!(matches!(result, Err(LinkError::InvalidSample(_))));
    }

    #[test]
    fn test_parse_ignores_extra_fields() {
        let line = format!("{}\t99", LINE.trim_end());
        let sample = Sample::parse(&line, &SampleLayout::default(), 0).unwrap();
        assert_eq!(sample.channels.len(), 2);
    }

    #[test]
    fn test_custom_layout() {
        let layout = SampleLayout {
            channels: 1,
            values_per_channel: 2,
        };
        assert_eq!(layout.field_count(), 3);
        let sample = Sample::parse("10\t20\t0", &layout, 0).unwrap();
        assert_eq!(sample.channels[0].values, vec![10.0, 20.0]);
        assert!(!sample.is_saturated());
    }

    #[test]
    fn test_encode_matches_wire_format() {
        let sample = Sample::parse(LINE, &SampleLayout::default(), 0).unwrap();
        assert_eq!(sample.encode(), LINE.trim_end());
    }

    #[test]
    fn test_looks_like_sample() {
        assert!(looks_like_sample(LINE));
        assert!(!looks_like_sample("OK"));
        assert!(!looks_like_sample("Wrong command (A\tB)"));
        assert!(!looks_like_sample("PocketLoCSensor"));
    }

    #[test]
    fn test_value_limit() {
        // 65535 / (1 * 10 * 18)
        assert!((value_limit(1, 10) - 364.083).abs() < 0.001);
        // Level 0 doubles the limit
        assert!((value_limit(0, 10) - 2.0 * value_limit(1, 10)).abs() < 1e-9);
    }

    #[test]
    fn test_saturation_reported_once_per_episode() {
        let layout = SampleLayout::default();
        let clean = Sample::parse(&LINE.replace("\t1\r\n", "\t0"), &layout, 0).unwrap();
        let saturated = Sample::parse(LINE, &layout, 0).unwrap();
        assert!(!clean.is_saturated());

        let mut watch = SaturationWatch::default();
        assert!(!watch.observe(&clean));
        assert!(watch.observe(&saturated));
        assert!(!watch.observe(&saturated));
        assert!(!watch.observe(&saturated));
        assert!(!watch.observe(&clean));
        assert!(watch.observe(&saturated));
    }

    #[test]
    fn test_csv_header_names_enabled_photodiodes() {
        let selection = AdcSelection::parse(b"1010101101");
        let header = csv_header(&SampleLayout::default(), &selection);
        assert_eq!(
            header,
            "timestamp,sensor0_F1,sensor0_F3,sensor0_F5,sensor0_F7,sensor0_F8,sensor0_NIR,\
             sensor1_F1,sensor1_F3,sensor1_F5,sensor1_F7,sensor1_F8,sensor1_NIR"
        );

        let sparse = csv_header(&SampleLayout::default(), &AdcSelection::parse(b"1"));
        assert!(sparse.starts_with("timestamp,sensor0_F1,sensor0_1,"));
    }

    #[test]
    fn test_csv_row_matches_header_width() {
        let sample = Sample::parse(LINE, &SampleLayout::default(), 42).unwrap();
        let row = sample.to_csv_row();
        assert!(row.starts_with("42,1,2,3,4,5,6,7,"));
        let header = csv_header(&SampleLayout::default(), &AdcSelection::ALL);
        assert_eq!(row.split(',').count(), header.split(',').count());
    }

    proptest! {
        #[test]
        fn prop_replies_never_look_like_samples(
            level in 0u8..=10,
            echoed in "[ -~\t]{0,24}",
        ) {
            let replies = [
                Reply::Ok,
                Reply::Started,
                Reply::Stopped,
                Reply::GainSelected { level },
                Reply::WrongCommand(echoed.into_bytes()),
            ];
            for reply in replies {
                prop_assert!(!looks_like_sample(&reply.to_string()));
            }
        }

        #[test]
        fn prop_device_samples_are_recognized(
            values in proptest::collection::vec(0.0f64..65535.0, 12),
            saturated in any::<(bool, bool)>(),
        ) {
            let sample = Sample {
                timestamp_ms: 0,
                channels: vec![
                    ChannelReading { values: values[..6].to_vec(), saturated: saturated.0 },
                    ChannelReading { values: values[6..].to_vec(), saturated: saturated.1 },
                ],
            };
            let line = sample.encode();
            prop_assert!(looks_like_sample(&line));
            let parsed = Sample::parse(&line, &SampleLayout::default(), 0).unwrap();
            prop_assert_eq!(parsed.is_saturated(), saturated.0 || saturated.1);
        }
    }
}
