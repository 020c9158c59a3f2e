//! Scan orchestration.
//!
//! This module provides:
//! - [`Scanner`]: drives one tuner over a frequency plan
//! - [`ScanSession`]: the ordered records of one run
//! - [`select_device`]: resolves the device to scan from discovery results

pub mod orchestrator;
pub mod session;

pub use orchestrator::{ScanOptions, ScanState, Scanner};
pub use session::ScanSession;

use thiserror::Error;

use hdhr_protocol::DeviceDescriptor;

/// Setup failures; any of these ends the run before a frequency is tuned.
#[derive(Debug, Error)]
pub enum ScanError {
    /// Discovery returned nothing.
    #[error("No HDHomeRun devices found")]
    NoDeviceFound,

    /// The requested device was not among the discovered ones.
    #[error("Device {0} not found")]
    DeviceNotFound(String),

    /// The requested tuner does not exist on the device.
    #[error("Tuner {tuner_index} is not available on device {device_id} ({tuner_count} tuners)")]
    TunerNotSelectable {
        device_id: String,
        tuner_index: u8,
        tuner_count: u8,
    },

    /// No frequencies to scan.
    #[error("Frequency plan is empty")]
    EmptyPlan,
}

/// Pick a device out of the discovery results.
///
/// With no `device_id` the only device is chosen; an ambiguous list
/// returns `Ok(None)` so the caller can ask the user.
pub fn select_device<'a>(
    devices: &'a [DeviceDescriptor],
    device_id: Option<&str>,
) -> Result<Option<&'a DeviceDescriptor>, ScanError> {
    if devices.is_empty() {
        return Err(ScanError::NoDeviceFound);
    }

    match device_id {
        Some(id) => devices
            .iter()
            .find(|d| d.id.eq_ignore_ascii_case(id) || d.address.as_deref() == Some(id))
            .map(Some)
            .ok_or_else(|| ScanError::DeviceNotFound(id.to_string())),
        None if devices.len() == 1 => Ok(devices.first()),
        None => Ok(None),
    }
}
