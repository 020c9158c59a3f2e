//! Tuner device access.
//!
//! This module provides:
//! - [`TunerControl`]: tune / status / program queries against one tuner
//! - [`DeviceDiscovery`]: enumeration of devices on the network
//! - [`HdhrConfigCli`]: both, implemented on top of `hdhomerun_config`

pub mod hdhomerun;

pub use hdhomerun::{HdhrConfigCli, HdhrConfigOptions};

use hdhr_protocol::{DeviceDescriptor, RawStatusResponse, ScanTarget, TunerError};

/// Commands issued against a single tuner.
///
/// Every call is synchronous and leaves at most one command outstanding.
pub trait TunerControl {
    /// Tune to `frequency_hz` and return the tuner status once it settles.
    fn tune(
        &mut self,
        target: &ScanTarget,
        frequency_hz: u32,
    ) -> Result<RawStatusResponse, TunerError>;

    /// Return the program listing of the currently tuned frequency.
    fn query_programs(&mut self, target: &ScanTarget) -> Result<RawStatusResponse, TunerError>;

    /// Give the tuner back once a session is finished.
    fn release(&mut self, _target: &ScanTarget) -> Result<(), TunerError> {
        Ok(())
    }
}

/// Enumeration of devices reachable from this host.
pub trait DeviceDiscovery {
    /// May return an empty list.
    fn discover(&mut self) -> Result<Vec<DeviceDescriptor>, TunerError>;
}
