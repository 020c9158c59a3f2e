//! Results of one scan run.

use chrono::{DateTime, Local};
use serde::Serialize;

use hdhr_protocol::{PlanKind, ScanRecord, ScanTarget};

/// Ordered records of one tuner's pass over a frequency plan.
///
/// The metadata only labels the export; records are always one per
/// planned frequency, in plan order.
#[derive(Debug, Clone, Serialize)]
pub struct ScanSession {
    pub device_id: String,
    pub tuner_index: u8,
    pub plan: PlanKind,
    pub started_at: DateTime<Local>,
    pub finished_at: DateTime<Local>,
    pub records: Vec<ScanRecord>,
}

impl ScanSession {
    pub fn target(&self) -> ScanTarget {
        ScanTarget::new(self.device_id.clone(), self.tuner_index)
    }

    /// Number of frequencies that locked.
    pub fn locked_count(&self) -> usize {
        self.records.iter().filter(|r| r.status.is_locked()).count()
    }

    /// Total programs found across all frequencies.
    pub fn program_count(&self) -> usize {
        self.records.iter().map(|r| r.programs.len()).sum()
    }
}
