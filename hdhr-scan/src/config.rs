//! Configuration file format.
//!
//! ```toml
//! [device]
//! id = "1040ABCD"
//! tuner = 0
//! all_tuners = false
//! command = "/usr/local/bin/hdhomerun_config"
//!
//! [scan]
//! plan = "us-bcast"
//! channels = "2-36"
//! lock_wait_ms = 2500
//! poll_interval_ms = 250
//! program_wait_ms = 3000
//! command_timeout_ms = 5000
//! busy_retries = 0
//! retry_backoff_ms = 1000
//!
//! [output]
//! dir = "scans"
//! format = "csv"
//!
//! [logging]
//! log_dir = "logs"
//! retention_days = 7
//! level = "info"
//! ```
//!
//! Every key is optional; command line values take precedence.

use std::io;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use hdhr_protocol::PlanKind;

use crate::export::OutputFormat;

/// Looked up in the working directory when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "hdhr-scan.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to parse {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid setting {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

#[derive(Debug, Deserialize, Default)]
pub struct ConfigFile {
    #[serde(default)]
    pub device: DeviceSection,
    #[serde(default)]
    pub scan: ScanSection,
    #[serde(default)]
    pub output: OutputSection,
    #[serde(default)]
    pub logging: LoggingSection,
}

#[derive(Debug, Deserialize, Default)]
pub struct DeviceSection {
    pub id: Option<String>,
    pub tuner: Option<u8>,
    pub all_tuners: Option<bool>,
    pub command: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Default)]
pub struct ScanSection {
    pub plan: Option<PlanKind>,
    pub channels: Option<String>,
    pub lock_wait_ms: Option<u64>,
    pub poll_interval_ms: Option<u64>,
    pub program_wait_ms: Option<u64>,
    pub command_timeout_ms: Option<u64>,
    pub busy_retries: Option<u32>,
    pub retry_backoff_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
pub struct OutputSection {
    pub dir: Option<PathBuf>,
    pub format: Option<OutputFormat>,
}

#[derive(Debug, Deserialize, Default)]
pub struct LoggingSection {
    pub log_dir: Option<PathBuf>,
    pub retention_days: Option<u64>,
    pub level: Option<String>,
}

/// Config file to use: the explicit path, else `hdhr-scan.toml` if present.
pub fn find_config(explicit: Option<&Path>) -> Option<PathBuf> {
    explicit.map(Path::to_path_buf).or_else(|| {
        let default_path = PathBuf::from(DEFAULT_CONFIG_FILE);
        default_path.exists().then_some(default_path)
    })
}

pub fn load_config(path: &Path) -> Result<ConfigFile, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn parse_config(contents: &str) -> Result<ConfigFile, toml::de::Error> {
    toml::from_str(contents)
}
