//! Pocket LoC Line Command Decoder
//!
//! This crate implements the device side of the Pocket LoC serial link: a
//! bounded input buffer that accumulates bytes from a transport, detects the
//! `\r\n` terminator and dispatches one text command per poll to the sensor
//! configuration collaborators.
//!
//! The command and reply grammar is shared with the host client in
//! `sensor-link`, so both ends encode and parse the same lines.

mod buffer;
mod command;
mod config;
mod decoder;
mod device;
mod error;
mod reply;
mod transport;

pub use buffer::{normalize, InputBuffer};
pub use command::{parse_int, AdcChannel, AdcSelection, Command};
pub use config::{DecoderConfig, OverflowPolicy};
pub use decoder::{DecoderStats, LineDecoder, PollOutcome};
pub use device::{ChannelSettings, SensorConfig, SimulatedSensor, StatusIndicator};
pub use error::DecoderError;
pub use reply::{gain_multiplier, Reply};
pub use transport::{MemoryTransport, Transport};

use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// Line terminator on the wire, in both directions
pub const TERMINATOR: &[u8; 2] = b"\r\n";

/// Protocol limits
pub mod limits {
    /// Default input buffer capacity in bytes
    pub const DEFAULT_CAPACITY: usize = 50;
    /// Shortest sample time per conversion (ms)
    pub const SAMPLE_TIME_MIN_MS: u8 = 1;
    /// Longest sample time per conversion (ms)
    pub const SAMPLE_TIME_MAX_MS: u8 = 182;
    /// Lowest gain level (0.5x)
    pub const GAIN_LEVEL_MIN: u8 = 0;
    /// Highest gain level (512x)
    pub const GAIN_LEVEL_MAX: u8 = 10;
    /// Number of selectable photodiodes in an ADC configuration
    pub const ADC_CHANNELS: usize = 10;
}

/// Initialize logging on stderr
///
/// Stdout is left untouched so the simulator can use it for protocol replies.
pub fn init_logging() {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(true)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set tracing subscriber");
}
