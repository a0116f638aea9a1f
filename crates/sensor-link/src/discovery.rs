//! Serial Port Discovery

use crate::client::SensorClient;
use crate::config::LinkConfig;
use crate::error::LinkError;
use tokio_serial::{SerialPortInfo, SerialPortType, SerialStream};
use tracing::{debug, info, warn};

/// Names of USB ports whose VID:PID match, sorted
pub fn matching_ports(ports: &[SerialPortInfo], vid: u16, pid: u16) -> Vec<String> {
    let mut names: Vec<String> = ports
        .iter()
        .filter(|port| match &port.port_type {
            SerialPortType::UsbPort(usb) => usb.vid == vid && usb.pid == pid,
            _ => false,
        })
        .map(|port| port.port_name.clone())
        .collect();
    names.sort();
    names
}

/// Find the first port that answers `ID` with the configured identifier
///
/// Ports that cannot be opened (often still held by an aborted session) are
/// skipped with a warning.
pub async fn discover(
    config: &LinkConfig,
) -> Result<(String, SensorClient<SerialStream>), LinkError> {
    let ports = tokio_serial::available_ports()?;
    let candidates = matching_ports(&ports, config.usb_vid, config.usb_pid);
    info!(
        "Found {} candidate port(s) for {:04x}:{:04x}",
        candidates.len(),
        config.usb_vid,
        config.usb_pid
    );

    for port in candidates {
        let mut client = match SensorClient::open(&port, config) {
            Ok(client) => client,
            Err(err) => {
                warn!("Port {} unavailable, it may be held by another session: {}", port, err);
                continue;
            }
        };

        match client.verify(&config.device_id).await {
            Ok(()) => return Ok((port, client)),
            Err(err) => debug!("Port {} is not our sensor: {}", port, err),
        }
    }

    Err(LinkError::DeviceNotFound)
}
