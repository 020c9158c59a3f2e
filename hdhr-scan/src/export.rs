//! Writing scan sessions to disk.
//!
//! Files are named `<host>_<device>_tuner<N>_<YYYYmmdd_HHMMSS>.<ext>` and
//! written through a `.partial` sibling that is renamed only once the
//! whole session has been written.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use hdhr_protocol::{ExportRow, FrequencyPlan, ResultAggregator};

use crate::scanner::ScanSession;

/// Export errors. Any of these leaves no output file behind.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Output file format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Comma separated values with a header row
    #[default]
    Csv,
    /// The session and its export rows as JSON
    Json,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Csv => "csv",
            OutputFormat::Json => "json",
        }
    }
}

/// Host name used to label exports.
pub fn host_name() -> String {
    match dns_lookup::get_hostname() {
        Ok(name) if !name.trim().is_empty() => name,
        Ok(_) => "localhost".to_string(),
        Err(e) => {
            warn!("Failed to get host name: {}", e);
            "localhost".to_string()
        }
    }
}

/// Keep names portable across filesystems.
fn sanitize(part: &str) -> String {
    part.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' {
                c
            } else {
                '-'
            }
        })
        .collect()
}

/// File name of a session export.
pub fn artifact_name(host: &str, session: &ScanSession, format: OutputFormat) -> String {
    format!(
        "{}_{}_tuner{}_{}.{}",
        sanitize(host),
        sanitize(&session.device_id),
        session.tuner_index,
        session.started_at.format("%Y%m%d_%H%M%S"),
        format.extension()
    )
}

/// Write the header and one row per record as CSV.
pub fn write_csv<W: Write>(
    writer: W,
    plan: &FrequencyPlan,
    session: &ScanSession,
) -> Result<(), ExportError> {
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(ResultAggregator::header())?;
    for row in ResultAggregator::new(plan).rows(&session.records) {
        csv.write_record(row.cells())?;
    }
    csv.flush()?;
    Ok(())
}

#[derive(Serialize)]
struct JsonExport<'a> {
    session: &'a ScanSession,
    columns: Vec<String>,
    rows: Vec<ExportRow>,
}

/// Write the session, the column names and the export rows as JSON.
pub fn write_json<W: Write>(
    mut writer: W,
    plan: &FrequencyPlan,
    session: &ScanSession,
) -> Result<(), ExportError> {
    let document = JsonExport {
        session,
        columns: ResultAggregator::header(),
        rows: ResultAggregator::new(plan).rows(&session.records),
    };
    serde_json::to_writer_pretty(&mut writer, &document)?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}

/// Write `session` into `dir`, returning the final path.
pub fn export_session(
    dir: &Path,
    host: &str,
    plan: &FrequencyPlan,
    session: &ScanSession,
    format: OutputFormat,
) -> Result<PathBuf, ExportError> {
    fs::create_dir_all(dir)?;

    let path = dir.join(artifact_name(host, session, format));
    let partial = path.with_extension(format!("{}.partial", format.extension()));
    debug!("Writing {:?}", partial);

    let result = File::create(&partial)
        .map_err(ExportError::from)
        .and_then(|file| {
            let writer = BufWriter::new(file);
            match format {
                OutputFormat::Csv => write_csv(writer, plan, session),
                OutputFormat::Json => write_json(writer, plan, session),
            }
        })
        .and_then(|_| fs::rename(&partial, &path).map_err(ExportError::from));

    if let Err(e) = result {
        if partial.exists() {
            if let Err(rm) = fs::remove_file(&partial) {
                warn!("Failed to remove {:?}: {}", partial, rm);
            }
        }
        return Err(e);
    }

    info!(
        "Wrote {} rows for tuner {} to {}",
        session.records.len(),
        session.target(),
        path.display()
    );
    Ok(path)
}
