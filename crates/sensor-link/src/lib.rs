//! Pocket LoC Sensor Link
//!
//! Host side of the Pocket LoC serial link: finds the sensor, verifies its
//! identifier, applies a measurement configuration, sweeps the gain and
//! parses the streamed sample lines.

mod client;
mod config;
mod discovery;
mod error;
mod sample;

pub use client::SensorClient;
pub use config::{HostConfig, LinkConfig};
pub use discovery::{discover, matching_ports};
pub use error::LinkError;
pub use sample::{
    csv_header, looks_like_sample, now_ms, value_limit, ChannelReading, Sample, SampleLayout,
    SaturationWatch,
};

use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// Initialize logging on stderr, keeping stdout for sample output
pub fn init_logging() {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(true)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set tracing subscriber");
}
