//! Frequency plans for the US broadcast and cable channel maps.
//!
//! Channel numbers and center frequencies follow the HDHomeRun channel maps
//! of the same name (`us-bcast`, `us-cable`). Each plan is generated from a
//! table of contiguous 6 MHz bands:
//!
//! ```text
//! center_hz = band_base_hz + (channel - band_first_channel) * 6 MHz
//! ```
//!
//! # Example
//! ```
//! use hdhr_protocol::frequency_plan::{FrequencyPlan, PlanKind};
//! use hdhr_protocol::ChannelMapping;
//!
//! let plan = FrequencyPlan::from_kind(PlanKind::UsBcast);
//! assert_eq!(plan.entries()[0].frequency_hz, 57_000_000);
//! assert_eq!(plan.channel_for(177_000_000), ChannelMapping::Channel(7));
//! assert_eq!(plan.channel_for(100_000_000), ChannelMapping::Unmapped);
//! ```

use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::types::{ChannelMapping, FrequencyEntry};

/// Width of one US television channel.
const CHANNEL_WIDTH_HZ: u32 = 6_000_000;

/// A run of channels with evenly spaced center frequencies.
struct Band {
    first: u16,
    last: u16,
    base_hz: u32,
}

const fn band(first: u16, last: u16, base_mhz: u32) -> Band {
    Band {
        first,
        last,
        base_hz: base_mhz * 1_000_000,
    }
}

/// Over-the-air ATSC channels (post-repack, RF 2-36).
const US_BCAST_BANDS: &[Band] = &[
    // VHF low
    band(2, 4, 57),
    band(5, 6, 79),
    // VHF high
    band(7, 13, 177),
    // UHF
    band(14, 36, 473),
];

/// Cable QAM channels (EIA-542 standard plan).
const US_CABLE_BANDS: &[Band] = &[
    band(2, 4, 57),
    band(5, 6, 79),
    band(7, 13, 177),
    // Midband
    band(14, 22, 123),
    // Superband / hyperband
    band(23, 94, 219),
    band(95, 99, 93),
    band(100, 158, 651),
];

/// Supported channel maps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PlanKind {
    /// ATSC 8VSB over-the-air.
    #[default]
    UsBcast,
    /// QAM cable.
    UsCable,
}

impl PlanKind {
    /// Channel map name as used by the device.
    pub fn name(self) -> &'static str {
        match self {
            PlanKind::UsBcast => "us-bcast",
            PlanKind::UsCable => "us-cable",
        }
    }

    fn bands(self) -> &'static [Band] {
        match self {
            PlanKind::UsBcast => US_BCAST_BANDS,
            PlanKind::UsCable => US_CABLE_BANDS,
        }
    }
}

impl fmt::Display for PlanKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PlanKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "us-bcast" | "bcast" | "atsc" => Ok(PlanKind::UsBcast),
            "us-cable" | "cable" | "qam" => Ok(PlanKind::UsCable),
            other => Err(format!("unknown channel map '{}'", other)),
        }
    }
}

/// Ordered list of frequencies to scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrequencyPlan {
    kind: PlanKind,
    entries: Vec<FrequencyEntry>,
}

impl FrequencyPlan {
    /// Build the full plan for a channel map, ascending by channel number.
    pub fn from_kind(kind: PlanKind) -> Self {
        let mut entries: Vec<FrequencyEntry> = kind
            .bands()
            .iter()
            .flat_map(|band| {
                (band.first..=band.last).map(move |ch| {
                    let offset = u32::from(ch - band.first) * CHANNEL_WIDTH_HZ;
                    FrequencyEntry::new(band.base_hz + offset, ch)
                })
            })
            .collect();
        entries.sort_by_key(|e| e.channel);

        Self { kind, entries }
    }

    /// Build a plan from explicit entries (sorted by channel number).
    pub fn from_entries(kind: PlanKind, mut entries: Vec<FrequencyEntry>) -> Self {
        entries.sort_by_key(|e| e.channel);
        Self { kind, entries }
    }

    /// Keep only the channels within `range`, preserving scan order.
    pub fn restricted(&self, range: RangeInclusive<u16>) -> Self {
        Self {
            kind: self.kind,
            entries: self
                .entries
                .iter()
                .filter(|e| range.contains(&e.channel))
                .copied()
                .collect(),
        }
    }

    pub fn kind(&self) -> PlanKind {
        self.kind
    }

    pub fn entries(&self) -> &[FrequencyEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Broadcast channel carried at `frequency_hz`.
    pub fn channel_for(&self, frequency_hz: u32) -> ChannelMapping {
        self.entries
            .iter()
            .find(|e| e.frequency_hz == frequency_hz)
            .map(|e| ChannelMapping::Channel(e.channel))
            .unwrap_or(ChannelMapping::Unmapped)
    }
}

/// Parse a channel range such as `"14-36"` or `"7"`.
pub fn parse_channel_range(range: &str) -> Option<RangeInclusive<u16>> {
    let parts: Vec<&str> = range.split('-').map(str::trim).collect();
    match parts.as_slice() {
        [single] => {
            let ch = single.parse().ok()?;
            Some(ch..=ch)
        }
        [start, end] => {
            let start: u16 = start.parse().ok()?;
            let end: u16 = end.parse().ok()?;
            (start <= end).then_some(start..=end)
        }
        _ => None,
    }
}
