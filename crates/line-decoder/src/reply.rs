//! Device Replies

use crate::limits::{GAIN_LEVEL_MAX, GAIN_LEVEL_MIN};
use serde::{Deserialize, Serialize};
use std::fmt;

const GAIN_PREFIX: &str = "OK. Selected gain: ";
const WRONG_PREFIX: &str = "Wrong command (";

/// Gain multiplier for a level: 2^(level-1), so level 0 is 0.5x
pub fn gain_multiplier(level: u8) -> f64 {
    2f64.powi(level as i32 - 1)
}

/// A reply line written by the device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Reply {
    /// Greeting for an empty line
    Banner(String),
    /// Configuration accepted
    Ok,
    /// Gain accepted
    GainSelected { level: u8 },
    /// Streaming started
    Started,
    /// Streaming stopped
    Stopped,
    /// Device identifier
    DeviceId(String),
    /// Unrecognized line, echoed back byte for byte
    WrongCommand(Vec<u8>),
}

impl Reply {
    /// Parse a reply line (terminator already stripped)
    ///
    /// Returns `None` for free text, which is how banners and identifiers
    /// look on the wire; the caller knows which one it asked for.
    pub fn parse(line: &str) -> Option<Reply> {
        match line {
            "OK" => return Some(Reply::Ok),
            "Started" => return Some(Reply::Started),
            "Stopped" => return Some(Reply::Stopped),
            _ => {}
        }

        if let Some(rest) = line.strip_prefix(GAIN_PREFIX) {
            let multiplier: f64 = rest.strip_suffix('x')?.trim().parse().ok()?;
            if multiplier <= 0.0 {
                return None;
            }
            let level = (multiplier.log2() + 1.0)
                .round()
                .clamp(GAIN_LEVEL_MIN as f64, GAIN_LEVEL_MAX as f64);
            return Some(Reply::GainSelected { level: level as u8 });
        }

        if let Some(rest) = line.strip_prefix(WRONG_PREFIX) {
            let echoed = rest.strip_suffix(')')?;
            return Some(Reply::WrongCommand(echoed.as_bytes().to_vec()));
        }

        None
    }

    /// Bytes written to the link, without terminator
    ///
    /// Unlike `Display`, the echo of an unrecognized line is not re-encoded.
    pub fn to_wire(&self) -> Vec<u8> {
        match self {
            Reply::WrongCommand(line) => {
                let mut wire = Vec::with_capacity(WRONG_PREFIX.len() + line.len() + 1);
                wire.extend_from_slice(WRONG_PREFIX.as_bytes());
                wire.extend_from_slice(line);
                wire.push(b')');
                wire
            }
            other => other.to_string().into_bytes(),
        }
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::Banner(text) => f.write_str(text),
            Reply::Ok => f.write_str("OK"),
            Reply::GainSelected { level } => {
                write!(f, "{}{}x", GAIN_PREFIX, gain_multiplier(*level))
            }
            Reply::Started => f.write_str("Started"),
            Reply::Stopped => f.write_str("Stopped"),
            Reply::DeviceId(id) => f.write_str(id),
            Reply::WrongCommand(line) => {
                write!(f, "{}{})", WRONG_PREFIX, String::from_utf8_lossy(line))
            }
        }
    }
}
