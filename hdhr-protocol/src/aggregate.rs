//! Shaping scan records into fixed-width export rows.

use serde::Serialize;

use crate::frequency_plan::FrequencyPlan;
use crate::types::{ScanRecord, MAX_EXPORT_PROGRAMS};

/// Columns preceding the program columns.
pub const FIXED_COLUMNS: [&str; 7] = [
    "Frequency",
    "US-Broadcast Channel",
    "Lock Status",
    "Signal Strength (dBmV)",
    "Signal to Noise Quality",
    "Symbol Error Quality",
    "TSID",
];

/// Total number of columns in every row.
pub const COLUMN_COUNT: usize = FIXED_COLUMNS.len() + MAX_EXPORT_PROGRAMS;

/// One export row; always [`COLUMN_COUNT`] cells, absent values empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportRow(Vec<String>);

impl ExportRow {
    pub fn cells(&self) -> &[String] {
        &self.0
    }
}

fn decimal(value: Option<f64>) -> String {
    value.map(|v| format!("{:.1}", v)).unwrap_or_default()
}

/// Builds export rows against a frequency plan.
pub struct ResultAggregator<'a> {
    plan: &'a FrequencyPlan,
}

impl<'a> ResultAggregator<'a> {
    pub fn new(plan: &'a FrequencyPlan) -> Self {
        Self { plan }
    }

    /// Header row: fixed columns then `Program1..Program20`.
    pub fn header() -> Vec<String> {
        FIXED_COLUMNS
            .iter()
            .map(|c| c.to_string())
            .chain((1..=MAX_EXPORT_PROGRAMS).map(|i| format!("Program{}", i)))
            .collect()
    }

    /// Shape one record. Programs beyond the cap are dropped, short
    /// listings are padded with empty cells.
    pub fn row(&self, record: &ScanRecord) -> ExportRow {
        let status = &record.status;
        let mut cells = Vec::with_capacity(COLUMN_COUNT);

        cells.push(status.frequency_hz.to_string());
        cells.push(self.plan.channel_for(status.frequency_hz).to_string());
        cells.push(status.lock.as_str().to_string());
        cells.push(decimal(status.signal_strength));
        cells.push(decimal(status.snr_quality));
        cells.push(decimal(status.symbol_quality));
        cells.push(
            status
                .transport_stream_id
                .map(|tsid| format!("0x{:04X}", tsid))
                .unwrap_or_default(),
        );

        cells.extend(
            record
                .programs
                .iter()
                .take(MAX_EXPORT_PROGRAMS)
                .map(|p| p.label()),
        );
        cells.resize(COLUMN_COUNT, String::new());

        ExportRow(cells)
    }

    /// One row per record, in record order.
    pub fn rows(&self, records: &[ScanRecord]) -> Vec<ExportRow> {
        records.iter().map(|r| self.row(r)).collect()
    }
}
