//! Pocket LoC host - configure the sensor and stream samples as JSON lines

use sensor_link::{
    csv_header, discover, init_logging, value_limit, HostConfig, LinkError, SaturationWatch,
    SensorClient,
};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();

    info!("=== Pocket LoC host v{} ===", env!("CARGO_PKG_VERSION"));

    let path = std::env::args().nth(1).map(PathBuf::from);
    let config = HostConfig::load(path.as_deref())?;

    let mut client = match &config.link.port {
        Some(port) => {
            let mut client = SensorClient::open(port, &config.link)?;
            client.discard_pending(Duration::from_millis(200)).await?;
            client.verify(&config.link.device_id).await?;
            client
        }
        None => {
            let (port, mut client) = discover(&config.link).await?;
            info!("Using sensor on {}", port);
            client.discard_pending(Duration::from_millis(200)).await?;
            client
        }
    };

    let gain_level = client.apply(&config).await?;
    info!(
        "Gain level {}, sample time {}ms, value limit {:.1}",
        gain_level,
        config.sample_time_ms,
        value_limit(gain_level, config.sample_time_ms)
    );

    let mut csv = match &config.csv_path {
        Some(path) => {
            if let Some(dir) = path.parent() {
                std::fs::create_dir_all(dir)?;
            }
            let mut writer = BufWriter::new(File::create(path)?);
            writeln!(
                writer,
                "{}",
                csv_header(&config.link.layout, &config.adc_selection())
            )?;
            info!("Writing samples to {}", path.display());
            Some(writer)
        }
        None => None,
    };

    client.start().await?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let mut saturation = SaturationWatch::default();
    for _ in 0..config.sample_count {
        match client.read_sample().await {
            Ok(sample) => {
                if saturation.observe(&sample) {
                    warn!("Saturation, consider a lower gain");
                }

                writeln!(out, "{}", serde_json::to_string(&sample)?)?;
                if let Some(writer) = csv.as_mut() {
                    writeln!(writer, "{}", sample.to_csv_row())?;
                }
            }
            Err(LinkError::InvalidSample(msg)) => warn!("Skipping sample: {}", msg),
            Err(err) => return Err(err.into()),
        }
    }
    out.flush()?;
    if let Some(writer) = csv.as_mut() {
        writer.flush()?;
    }

    client.stop().await?;
    info!("Done");
    Ok(())
}
