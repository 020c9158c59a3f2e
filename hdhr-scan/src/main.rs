//! hdhr-scan: Channel scanner for HDHomeRun network tuners.
//!
//! Tunes every frequency of a channel map on one tuner (or each tuner in
//! turn), records lock status, signal quality and the program listing, and
//! exports one row per frequency.

use std::io;
use std::ops::RangeInclusive;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use log::{debug, error, info};

mod config;
mod device;
mod export;
mod logging;
mod prompt;
mod scanner;

use hdhr_protocol::{parse_channel_range, FrequencyPlan, PlanKind, ScanTarget, TunerSelection};

use config::{ConfigError, ConfigFile};
use device::{DeviceDiscovery, HdhrConfigCli, HdhrConfigOptions};
use export::OutputFormat;
use scanner::{ScanError, ScanOptions, Scanner};

const DEFAULT_LOG_DIR: &str = "logs";
const DEFAULT_LOG_RETENTION_DAYS: u64 = 7;
const DEFAULT_OUTPUT_DIR: &str = ".";

/// hdhr-scan - Scan HDHomeRun tuners and export the programs found
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Device ID or IP address (prompted when several devices are found)
    #[arg(short, long)]
    device: Option<String>,

    /// Tuner index to scan (prompted when omitted)
    #[arg(short, long, conflicts_with = "all")]
    tuner: Option<u8>,

    /// Scan every tuner of the device, one after another
    #[arg(short, long)]
    all: bool,

    /// Channel map: us-bcast or us-cable
    #[arg(short, long)]
    plan: Option<PlanKind>,

    /// Restrict the scan to a channel range, e.g. "2-13" or "7"
    #[arg(long)]
    channels: Option<String>,

    /// Directory for the exported files
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Export format
    #[arg(long, value_enum)]
    format: Option<OutputFormat>,

    /// Path to the hdhomerun_config utility
    #[arg(long)]
    command: Option<PathBuf>,

    /// How long to wait for a lock after tuning, in milliseconds
    #[arg(long)]
    lock_wait_ms: Option<u64>,

    /// How long to wait for the program listing, in milliseconds
    #[arg(long)]
    program_wait_ms: Option<u64>,

    /// Extra tune attempts when the tuner is in use elsewhere
    #[arg(long)]
    busy_retries: Option<u32>,

    /// Configuration file path
    #[arg(short = 'f', long)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Directory where log files are stored
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Number of days to keep log files
    #[arg(long)]
    log_retention_days: Option<u64>,
}

/// Effective settings after merging the command line over the config file.
#[derive(Debug)]
struct Settings {
    device_id: Option<String>,
    tuner: Option<TunerSelection>,
    plan: PlanKind,
    channels: Option<RangeInclusive<u16>>,
    driver: HdhrConfigOptions,
    scan: ScanOptions,
    output_dir: PathBuf,
    format: OutputFormat,
    log_dir: PathBuf,
    log_retention_days: u64,
    log_level: Option<String>,
    verbose: bool,
}

impl Args {
    fn into_settings(self, file: ConfigFile) -> Result<Settings, ConfigError> {
        let tuner = match (self.tuner, self.all) {
            (Some(index), _) => Some(TunerSelection::Index(index)),
            (None, true) => Some(TunerSelection::All),
            (None, false) if file.device.all_tuners == Some(true) => Some(TunerSelection::All),
            (None, false) => file.device.tuner.map(TunerSelection::Index),
        };

        let channels = match self.channels.or(file.scan.channels) {
            Some(text) => Some(parse_channel_range(&text).ok_or(ConfigError::Invalid {
                key: "channels",
                reason: format!("{:?} is not a channel or range", text),
            })?),
            None => None,
        };

        let defaults = HdhrConfigOptions::default();
        let millis = |cli: Option<u64>, file: Option<u64>, default: Duration| {
            cli.or(file).map(Duration::from_millis).unwrap_or(default)
        };
        let driver = HdhrConfigOptions {
            command: self
                .command
                .or(file.device.command)
                .unwrap_or(defaults.command),
            command_timeout: millis(None, file.scan.command_timeout_ms, defaults.command_timeout),
            lock_wait: millis(self.lock_wait_ms, file.scan.lock_wait_ms, defaults.lock_wait),
            program_wait: millis(
                self.program_wait_ms,
                file.scan.program_wait_ms,
                defaults.program_wait,
            ),
            poll_interval: millis(None, file.scan.poll_interval_ms, defaults.poll_interval),
        };
        if driver.poll_interval.is_zero() {
            return Err(ConfigError::Invalid {
                key: "poll_interval_ms",
                reason: "must be greater than zero".to_string(),
            });
        }

        let scan_defaults = ScanOptions::default();
        let scan = ScanOptions {
            busy_retries: self
                .busy_retries
                .or(file.scan.busy_retries)
                .unwrap_or(scan_defaults.busy_retries),
            retry_backoff: millis(None, file.scan.retry_backoff_ms, scan_defaults.retry_backoff),
        };

        Ok(Settings {
            device_id: self.device.or(file.device.id),
            tuner,
            plan: self.plan.or(file.scan.plan).unwrap_or_default(),
            channels,
            driver,
            scan,
            output_dir: self
                .output_dir
                .or(file.output.dir)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR)),
            format: self.format.or(file.output.format).unwrap_or_default(),
            log_dir: self
                .log_dir
                .or(file.logging.log_dir)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_DIR)),
            log_retention_days: self
                .log_retention_days
                .or(file.logging.retention_days)
                .unwrap_or(DEFAULT_LOG_RETENTION_DAYS),
            log_level: file.logging.level,
            verbose: self.verbose,
        })
    }
}

impl Settings {
    fn frequency_plan(&self) -> Result<FrequencyPlan, ScanError> {
        let full = FrequencyPlan::from_kind(self.plan);
        let plan = match &self.channels {
            Some(range) => full.restricted(range.clone()),
            None => full,
        };
        if plan.is_empty() {
            return Err(ScanError::EmptyPlan);
        }
        Ok(plan)
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Load config file: explicit path > auto-detect > default
    let file_config = match config::find_config(args.config.as_deref()) {
        Some(path) => match config::load_config(&path) {
            Ok(c) => {
                eprintln!("Loaded config from: {}", path.display());
                c
            }
            Err(e) => {
                eprintln!("Failed to load config file: {}", e);
                return Err(e.into());
            }
        },
        None => ConfigFile::default(),
    };

    let settings = match args.into_settings(file_config) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("{}", e);
            return Err(e.into());
        }
    };

    logging::init_logging(
        &settings.log_dir,
        settings.log_retention_days,
        settings.verbose,
        settings.log_level.as_deref(),
    )?;

    if let Err(e) = run(&settings) {
        error!("{}", e);
        return Err(e);
    }
    Ok(())
}

fn run(settings: &Settings) -> Result<(), Box<dyn std::error::Error>> {
    let plan = settings.frequency_plan()?;

    info!("hdhr-scan starting...");
    info!("  Channel map: {} ({} frequencies)", plan.kind(), plan.len());
    info!("  Command: {}", settings.driver.command.display());
    info!("  Output: {} ({:?})", settings.output_dir.display(), settings.format);

    let mut driver = HdhrConfigCli::new(settings.driver.clone())?;
    let devices = driver.discover()?;

    let device = match scanner::select_device(&devices, settings.device_id.as_deref())? {
        Some(device) => device,
        None => prompt::prompt_device(&devices, &mut io::stdin().lock(), &mut io::stdout())?,
    };
    info!("Using device {}", device);

    let selection = match settings.tuner {
        Some(selection) => selection,
        None => prompt::prompt_tuner(device, &mut io::stdin().lock(), &mut io::stdout())?,
    };

    let mut scanner = Scanner::new(driver, &plan, settings.scan.clone());
    let sessions = match selection {
        TunerSelection::Index(index) => {
            let target = ScanTarget::new(device.id.clone(), index);
            vec![scanner.run(device, &target)?]
        }
        TunerSelection::All => scanner.run_all(device)?,
    };
    debug!("Scanner finished: {:?}", scanner.state());

    // Only complete sessions reach this point; nothing is exported on failure.
    let host = export::host_name();
    for session in &sessions {
        let path =
            export::export_session(&settings.output_dir, &host, &plan, session, settings.format)?;
        println!(
            "Tuner {}: {} of {} frequencies locked, {} programs -> {}",
            session.target(),
            session.locked_count(),
            session.records.len(),
            session.program_count(),
            path.display()
        );
    }

    Ok(())
}
