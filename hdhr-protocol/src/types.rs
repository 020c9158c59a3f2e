//! Shared type definitions for the hdhr-scan workspace.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Highest tuner index probed on a device (HDHomeRun units ship with 1-6 tuners).
pub const MAX_TUNERS: u8 = 8;

/// Number of program columns in the export schema.
pub const MAX_EXPORT_PROGRAMS: usize = 20;

// ============================================================================
// Device / tuner addressing
// ============================================================================

/// A tuner device found on the network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceDescriptor {
    /// 8-digit hexadecimal device ID (e.g. `1040ABCD`).
    pub id: String,
    /// IP address the device answered from, if known.
    pub address: Option<String>,
    /// Number of tuners the device exposes.
    pub tuner_count: u8,
}

impl DeviceDescriptor {
    /// Create a descriptor with no known address.
    pub fn new(id: impl Into<String>, tuner_count: u8) -> Self {
        Self {
            id: id.into(),
            address: None,
            tuner_count,
        }
    }

    /// Attach the address the device was discovered at.
    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    /// Iterator over every tuner of this device as a scan target.
    pub fn targets(&self) -> impl Iterator<Item = ScanTarget> + '_ {
        (0..self.tuner_count).map(move |index| ScanTarget::new(self.id.clone(), index))
    }
}

impl fmt::Display for DeviceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.address {
            Some(address) => write!(f, "{} at {} ({} tuners)", self.id, address, self.tuner_count),
            None => write!(f, "{} ({} tuners)", self.id, self.tuner_count),
        }
    }
}

/// One tuner resource on one device.
///
/// Constructed once before scanning and passed to the scanner explicitly.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScanTarget {
    pub device_id: String,
    pub tuner_index: u8,
}

impl ScanTarget {
    pub fn new(device_id: impl Into<String>, tuner_index: u8) -> Self {
        Self {
            device_id: device_id.into(),
            tuner_index,
        }
    }

    /// Path prefix of this tuner's variables (`/tuner0`).
    pub fn tuner_path(&self) -> String {
        format!("/tuner{}", self.tuner_index)
    }
}

impl fmt::Display for ScanTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.device_id, self.tuner_index)
    }
}

/// Which tuner(s) of a device to scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TunerSelection {
    /// A single tuner index.
    Index(u8),
    /// Every tuner, one independent session each.
    All,
}

// ============================================================================
// Frequency plan entries
// ============================================================================

/// One RF channel of a frequency plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrequencyEntry {
    /// Center frequency in Hz.
    pub frequency_hz: u32,
    /// Broadcast (RF) channel number.
    pub channel: u16,
}

impl FrequencyEntry {
    pub const fn new(frequency_hz: u32, channel: u16) -> Self {
        Self {
            frequency_hz,
            channel,
        }
    }
}

/// Result of looking a frequency up in a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChannelMapping {
    Channel(u16),
    /// The frequency is not part of the plan.
    Unmapped,
}

impl fmt::Display for ChannelMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelMapping::Channel(ch) => write!(f, "{}", ch),
            ChannelMapping::Unmapped => f.write_str("unmapped"),
        }
    }
}

// ============================================================================
// Scan results
// ============================================================================

/// Raw text returned by the tuner for one query.
///
/// Consumed by the status and program parsers; never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawStatusResponse(String);

impl RawStatusResponse {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Concatenate a follow-up response after this one (line separated).
    pub fn followed_by(&self, other: &RawStatusResponse) -> RawStatusResponse {
        let mut text = String::with_capacity(self.0.len() + other.0.len() + 1);
        text.push_str(&self.0);
        if !text.is_empty() && !text.ends_with('\n') {
            text.push('\n');
        }
        text.push_str(&other.0);
        RawStatusResponse(text)
    }
}

impl From<String> for RawStatusResponse {
    fn from(text: String) -> Self {
        Self(text)
    }
}

impl From<&str> for RawStatusResponse {
    fn from(text: &str) -> Self {
        Self(text.to_string())
    }
}

/// Lock outcome of one tune attempt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LockStatus {
    Locked,
    #[default]
    None,
}

impl LockStatus {
    pub fn is_locked(self) -> bool {
        self == LockStatus::Locked
    }

    /// Column value used in exports.
    pub fn as_str(self) -> &'static str {
        match self {
            LockStatus::Locked => "LOCKED",
            LockStatus::None => "NONE",
        }
    }
}

impl fmt::Display for LockStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed tuner status for one frequency.
///
/// Every reading is `None` when the tuner did not report it or did not lock;
/// a `Some(0.0)` is a genuine zero reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TunerStatus {
    pub frequency_hz: u32,
    pub lock: LockStatus,
    /// Modulation reported with the lock (`8vsb`, `qam256`, ...).
    pub modulation: Option<String>,
    /// Signal strength (`ss`).
    pub signal_strength: Option<f64>,
    /// Signal to noise quality (`snq`).
    pub snr_quality: Option<f64>,
    /// Symbol error quality (`seq`).
    pub symbol_quality: Option<f64>,
    pub transport_stream_id: Option<u16>,
}

impl TunerStatus {
    /// Status of a frequency that produced no usable data.
    pub fn unlocked(frequency_hz: u32) -> Self {
        Self {
            frequency_hz,
            lock: LockStatus::None,
            modulation: None,
            signal_strength: None,
            snr_quality: None,
            symbol_quality: None,
            transport_stream_id: None,
        }
    }

    pub fn is_locked(&self) -> bool {
        self.lock.is_locked()
    }
}

/// One program carried in a transport stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramEntry {
    /// Position in the listing, starting at 1.
    pub slot: usize,
    /// MPEG program number reported by the tuner.
    pub program_number: u16,
    /// Virtual channel (`7.1`), when reported.
    pub virtual_channel: Option<String>,
    pub name: String,
}

impl ProgramEntry {
    /// Text written to a program column (`7.1 KABC-HD`).
    pub fn label(&self) -> String {
        match &self.virtual_channel {
            Some(vch) => format!("{} {}", vch, self.name),
            None => self.name.clone(),
        }
    }
}

/// Ordered programs of one locked frequency.
///
/// Not capped; the export cap is applied by the aggregator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramListing {
    pub entries: Vec<ProgramEntry>,
}

impl ProgramListing {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ProgramEntry> {
        self.entries.iter()
    }
}

/// Everything recorded for one planned frequency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanRecord {
    pub status: TunerStatus,
    pub programs: ProgramListing,
}

impl ScanRecord {
    pub fn new(status: TunerStatus, programs: ProgramListing) -> Self {
        // Programs are only meaningful with a lock.
        let programs = if status.is_locked() {
            programs
        } else {
            ProgramListing::empty()
        };
        Self { status, programs }
    }

    /// The "unlocked, no data" record.
    pub fn no_data(frequency_hz: u32) -> Self {
        Self {
            status: TunerStatus::unlocked(frequency_hz),
            programs: ProgramListing::empty(),
        }
    }

    pub fn frequency_hz(&self) -> u32 {
        self.status.frequency_hz
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_targets() {
        let device = DeviceDescriptor::new("1040ABCD", 2).with_address("192.168.1.18");
        let targets: Vec<_> = device.targets().collect();
        assert_eq!(
            targets,
            vec![ScanTarget::new("1040ABCD", 0), ScanTarget::new("1040ABCD", 1)]
        );
        assert_eq!(targets[1].tuner_path(), "/tuner1");
        assert_eq!(device.to_string(), "1040ABCD at 192.168.1.18 (2 tuners)");
    }

    #[test]
    fn test_channel_mapping_display() {
        assert_eq!(ChannelMapping::Channel(7).to_string(), "7");
        assert_eq!(ChannelMapping::Unmapped.to_string(), "unmapped");
    }

    #[test]
    fn test_raw_response_followed_by() {
        let status = RawStatusResponse::from("lock=8vsb ss=80");
        let programs = RawStatusResponse::from("1: 7.1 KABC\ntsid=0x0001\n");
        let merged = status.followed_by(&programs);
        assert_eq!(merged.as_str(), "lock=8vsb ss=80\n1: 7.1 KABC\ntsid=0x0001\n");
    }

    #[test]
    fn test_unlocked_record_drops_programs() {
        let programs = ProgramListing {
            entries: vec![ProgramEntry {
                slot: 1,
                program_number: 3,
                virtual_channel: None,
                name: "KABC".to_string(),
            }],
        };
        let record = ScanRecord::new(TunerStatus::unlocked(57_000_000), programs);
        assert!(record.programs.is_empty());
        assert_eq!(record, ScanRecord::no_data(57_000_000));
    }

    #[test]
    fn test_program_label() {
        let mut entry = ProgramEntry {
            slot: 1,
            program_number: 3,
            virtual_channel: Some("7.1".to_string()),
            name: "KABC-HD".to_string(),
        };
        assert_eq!(entry.label(), "7.1 KABC-HD");
        entry.virtual_channel = None;
        assert_eq!(entry.label(), "KABC-HD");
    }
}
