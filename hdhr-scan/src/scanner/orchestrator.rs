//! Per-frequency scan loop.
//!
//! # States
//!
//! ```text
//! Idle -> SelectTuner -> Scanning(0) -> ... -> Scanning(n-1) -> Done
//!              \
//!               -> Aborted   (tuner not selectable, nothing tuned)
//! ```
//!
//! Each `Scanning(i)` runs one cycle:
//! `TuneRequested -> StatusQueried -> Locked | Unlocked -> Recorded`.
//! A cycle always ends in a record, so a session holds exactly one record
//! per planned frequency no matter how many locked.

use std::time::Duration;

use chrono::Local;
use log::{debug, info, trace, warn};

use hdhr_protocol::{
    DeviceDescriptor, FrequencyEntry, FrequencyPlan, ProgramListing, RawStatusResponse,
    ScanRecord, ScanTarget, TunerError, TunerStatus,
};

use crate::device::TunerControl;
use crate::scanner::session::ScanSession;
use crate::scanner::ScanError;

/// Scanner configuration.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Extra tune attempts when the tuner reports busy (0 = no retry).
    pub busy_retries: u32,
    /// Pause before a busy retry.
    pub retry_backoff: Duration,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            busy_retries: 0,
            retry_backoff: Duration::from_millis(1000),
        }
    }
}

/// Scanner state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    Idle,
    SelectTuner,
    /// Scanning the plan entry at `index`.
    Scanning { index: usize },
    Done,
    /// Tuner selection failed before any frequency was tried.
    Aborted,
}

/// Steps of a single frequency cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CyclePhase {
    TuneRequested,
    StatusQueried,
    Locked,
    Unlocked,
    Recorded,
}

/// Drives one tuner over a frequency plan.
pub struct Scanner<'p, T: TunerControl> {
    tuner: T,
    plan: &'p FrequencyPlan,
    options: ScanOptions,
    state: ScanState,
}

impl<'p, T: TunerControl> Scanner<'p, T> {
    pub fn new(tuner: T, plan: &'p FrequencyPlan, options: ScanOptions) -> Self {
        Self {
            tuner,
            plan,
            options,
            state: ScanState::Idle,
        }
    }

    pub fn state(&self) -> ScanState {
        self.state
    }

    #[cfg(test)]
    fn tuner(&self) -> &T {
        &self.tuner
    }

    /// Scan every planned frequency on `target`, a tuner of `device`.
    ///
    /// Only tuner selection can fail; per-frequency failures become
    /// "unlocked, no data" records.
    pub fn run(
        &mut self,
        device: &DeviceDescriptor,
        target: &ScanTarget,
    ) -> Result<ScanSession, ScanError> {
        self.state = ScanState::SelectTuner;
        let target = match self.select_tuner(device, target) {
            Ok(target) => target,
            Err(e) => {
                self.state = ScanState::Aborted;
                return Err(e);
            }
        };

        let plan = self.plan;
        let total = plan.len();
        let started_at = Local::now();
        info!(
            "Scanner: Scanning {} frequencies ({}) on tuner {}",
            total,
            plan.kind(),
            target
        );

        let mut records = Vec::with_capacity(total);
        for (index, entry) in plan.entries().iter().enumerate() {
            self.state = ScanState::Scanning { index };
            let record = self.scan_frequency(&target, entry);

            info!(
                "Scanner: [{}/{}] {} Hz (ch {}): {}{}",
                index + 1,
                total,
                entry.frequency_hz,
                entry.channel,
                record.status.lock,
                if record.status.is_locked() {
                    format!(" ({} programs)", record.programs.len())
                } else {
                    String::new()
                }
            );
            records.push(record);
        }

        if let Err(e) = self.tuner.release(&target) {
            warn!("Scanner: Failed to release tuner {}: {}", target, e);
        }

        self.state = ScanState::Done;
        let session = ScanSession {
            device_id: target.device_id.clone(),
            tuner_index: target.tuner_index,
            plan: plan.kind(),
            started_at,
            finished_at: Local::now(),
            records,
        };
        log_session_summary(&session);

        Ok(session)
    }

    /// Scan every tuner of `device` in turn, one independent session each.
    pub fn run_all(&mut self, device: &DeviceDescriptor) -> Result<Vec<ScanSession>, ScanError> {
        if device.tuner_count == 0 {
            self.state = ScanState::Aborted;
            return Err(ScanError::TunerNotSelectable {
                device_id: device.id.clone(),
                tuner_index: 0,
                tuner_count: 0,
            });
        }

        device
            .targets()
            .map(|target| self.run(device, &target))
            .collect()
    }

    fn select_tuner(
        &self,
        device: &DeviceDescriptor,
        target: &ScanTarget,
    ) -> Result<ScanTarget, ScanError> {
        if !target.device_id.eq_ignore_ascii_case(&device.id) {
            return Err(ScanError::DeviceNotFound(target.device_id.clone()));
        }
        if target.tuner_index >= device.tuner_count {
            return Err(ScanError::TunerNotSelectable {
                device_id: device.id.clone(),
                tuner_index: target.tuner_index,
                tuner_count: device.tuner_count,
            });
        }
        if self.plan.is_empty() {
            return Err(ScanError::EmptyPlan);
        }
        Ok(ScanTarget::new(device.id.clone(), target.tuner_index))
    }

    /// One tune/status cycle. Never fails: errors yield the no-data record.
    fn scan_frequency(&mut self, target: &ScanTarget, entry: &FrequencyEntry) -> ScanRecord {
        let frequency_hz = entry.frequency_hz;

        trace_phase(entry, CyclePhase::TuneRequested);
        let status_raw = match self.tune_with_retry(target, frequency_hz) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Scanner: {} Hz on {}: {}", frequency_hz, target, e);
                trace_phase(entry, CyclePhase::Recorded);
                return ScanRecord::no_data(frequency_hz);
            }
        };

        trace_phase(entry, CyclePhase::StatusQueried);
        let status = TunerStatus::parse(&status_raw, frequency_hz);
        if !status.is_locked() {
            trace_phase(entry, CyclePhase::Unlocked);
            trace_phase(entry, CyclePhase::Recorded);
            return ScanRecord::new(status, ProgramListing::empty());
        }

        trace_phase(entry, CyclePhase::Locked);
        let record = match self.tuner.query_programs(target) {
            Ok(programs_raw) => {
                debug!(
                    "Scanner: {} Hz: {:?} / {:?}",
                    frequency_hz,
                    status_raw.as_str(),
                    programs_raw.as_str()
                );
                // TSID is only reported alongside the programs.
                let combined = status_raw.followed_by(&programs_raw);
                ScanRecord::new(
                    TunerStatus::parse(&combined, frequency_hz),
                    ProgramListing::parse(&programs_raw),
                )
            }
            Err(e) => {
                warn!(
                    "Scanner: Program query for {} Hz on {} failed: {}",
                    frequency_hz, target, e
                );
                ScanRecord::no_data(frequency_hz)
            }
        };

        trace_phase(entry, CyclePhase::Recorded);
        record
    }

    /// Tune, retrying up to `busy_retries` times while the tuner is busy.
    fn tune_with_retry(
        &mut self,
        target: &ScanTarget,
        frequency_hz: u32,
    ) -> Result<RawStatusResponse, TunerError> {
        let mut attempt = 0;
        loop {
            match self.tuner.tune(target, frequency_hz) {
                Err(e) if e.is_busy() && attempt < self.options.busy_retries => {
                    attempt += 1;
                    warn!(
                        "Scanner: {} (attempt {}/{}), retrying in {:?}",
                        e,
                        attempt,
                        self.options.busy_retries + 1,
                        self.options.retry_backoff
                    );
                    std::thread::sleep(self.options.retry_backoff);
                }
                result => return result,
            }
        }
    }
}

fn trace_phase(entry: &FrequencyEntry, phase: CyclePhase) {
    trace!("Scanner: ch {} {:?}", entry.channel, phase);
}

/// Log the outcome of a finished session.
fn log_session_summary(session: &ScanSession) {
    let elapsed = session.finished_at - session.started_at;

    info!("Scanner: ==== Scan Results Summary ====");
    info!(
        "Scanner: Tuner {}: {}/{} frequencies locked, {} programs, {}s",
        session.target(),
        session.locked_count(),
        session.records.len(),
        session.program_count(),
        elapsed.num_seconds()
    );
    for record in session.records.iter().filter(|r| r.status.is_locked()) {
        let status = &record.status;
        let tsid = status
            .transport_stream_id
            .map(|t| format!("0x{:04X}", t))
            .unwrap_or_else(|| "N/A".to_string());
        let names: Vec<String> = record.programs.iter().map(|p| p.label()).collect();
        info!(
            "Scanner:   {} Hz TSID={} ss={:?} snq={:?} seq={:?} [{}]",
            status.frequency_hz,
            tsid,
            status.signal_strength,
            status.snr_quality,
            status.symbol_quality,
            names.join(", ")
        );
    }
    info!("Scanner: ==== End of Results ====");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{HashMap, VecDeque};

    use hdhr_protocol::{LockStatus, PlanKind, ResultAggregator, COLUMN_COUNT};

    /// Scripted tuner: replies per frequency, consumed in order.
    #[derive(Default)]
    struct FakeTuner {
        status: HashMap<u32, VecDeque<Result<String, TunerError>>>,
        programs: HashMap<u32, Result<String, TunerError>>,
        current: Option<u32>,
        tune_calls: Vec<(ScanTarget, u32)>,
        program_calls: usize,
        released: Vec<ScanTarget>,
    }

    impl FakeTuner {
        fn status(mut self, frequency_hz: u32, reply: Result<&str, TunerError>) -> Self {
            self.status
                .entry(frequency_hz)
                .or_default()
                .push_back(reply.map(str::to_string));
            self
        }

        fn programs(mut self, frequency_hz: u32, reply: Result<&str, TunerError>) -> Self {
            self.programs.insert(frequency_hz, reply.map(str::to_string));
            self
        }
    }

    impl TunerControl for FakeTuner {
        fn tune(
            &mut self,
            target: &ScanTarget,
            frequency_hz: u32,
        ) -> Result<RawStatusResponse, TunerError> {
            self.tune_calls.push((target.clone(), frequency_hz));
            self.current = Some(frequency_hz);
            let reply = self
                .status
                .get_mut(&frequency_hz)
                .and_then(|replies| replies.pop_front())
                .unwrap_or_else(|| Ok("lock=none ss=0 snq=0 seq=0".to_string()));
            reply.map(RawStatusResponse::from)
        }

        fn query_programs(&mut self, _target: &ScanTarget) -> Result<RawStatusResponse, TunerError> {
            self.program_calls += 1;
            let frequency_hz = self.current.expect("query before tune");
            self.programs
                .get(&frequency_hz)
                .cloned()
                .unwrap_or_else(|| Ok("none".to_string()))
                .map(RawStatusResponse::from)
        }

        fn release(&mut self, target: &ScanTarget) -> Result<(), TunerError> {
            self.released.push(target.clone());
            Ok(())
        }
    }

    fn busy() -> TunerError {
        TunerError::ResourceBusy {
            owner: "192.168.1.50".to_string(),
        }
    }

    fn plan(entries: &[(u32, u16)]) -> FrequencyPlan {
        FrequencyPlan::from_entries(
            PlanKind::UsBcast,
            entries
                .iter()
                .map(|&(hz, ch)| FrequencyEntry::new(hz, ch))
                .collect(),
        )
    }

    fn device(tuners: u8) -> DeviceDescriptor {
        DeviceDescriptor::new("1040ABCD", tuners)
    }

    fn target(index: u8) -> ScanTarget {
        ScanTarget::new("1040ABCD", index)
    }

    fn no_retry() -> ScanOptions {
        ScanOptions {
            busy_retries: 0,
            retry_backoff: Duration::ZERO,
        }
    }

    #[test]
    fn test_scan_options_default() {
        let options = ScanOptions::default();
        assert_eq!(options.busy_retries, 0);
        assert_eq!(options.retry_backoff, Duration::from_millis(1000));
    }

    #[test]
    fn test_locked_and_unlocked_scenario() {
        let plan = plan(&[(57_000_000, 2), (63_000_000, 3)]);
        let tuner = FakeTuner::default()
            .status(57_000_000, Ok("ch=auto:57000000 lock=8vsb ss=12.3 snq=35.0 bps=19394080"))
            .programs(57_000_000, Ok("1: KABC-HD\n2: KABC-SD\ntsid=0x0A1B\n"))
            .status(63_000_000, Ok("ch=auto:63000000 lock=none ss=0 snq=0 seq=0"));

        let mut scanner = Scanner::new(tuner, &plan, no_retry());
        assert_eq!(scanner.state(), ScanState::Idle);
        let session = scanner.run(&device(4), &target(0)).unwrap();
        assert_eq!(scanner.state(), ScanState::Done);

        assert_eq!(session.records.len(), 2);
        let first = &session.records[0].status;
        assert_eq!(first.lock, LockStatus::Locked);
        assert_eq!(first.signal_strength, Some(12.3));
        assert_eq!(first.snr_quality, Some(35.0));
        assert_eq!(first.symbol_quality, None);
        assert_eq!(first.transport_stream_id, Some(0x0A1B));
        assert_eq!(session.records[1], ScanRecord::no_data(63_000_000));

        let rows = ResultAggregator::new(&plan).rows(&session.records);
        assert_eq!(rows.len(), 2);
        assert_eq!(
            &rows[0].cells()[..9],
            &["57000000", "2", "LOCKED", "12.3", "35.0", "", "0x0A1B", "KABC-HD", "KABC-SD"]
        );
        assert!(rows[0].cells()[9..].iter().all(String::is_empty));
        assert_eq!(&rows[1].cells()[..3], &["63000000", "3", "NONE"]);
        assert!(rows[1].cells()[3..].iter().all(String::is_empty));
        assert!(rows.iter().all(|r| r.cells().len() == COLUMN_COUNT));

        // programs are only queried for the locked frequency
        assert_eq!(scanner.tuner().program_calls, 1);
        assert_eq!(scanner.tuner().released, vec![ScanTarget::new("1040ABCD", 0)]);
    }

    #[test]
    fn test_busy_frequency_is_isolated() {
        let plan = plan(&[(57_000_000, 2), (63_000_000, 3), (69_000_000, 4)]);
        let tuner = FakeTuner::default()
            .status(57_000_000, Ok("lock=8vsb ss=80 snq=90 seq=100"))
            .status(63_000_000, Err(busy()))
            .status(69_000_000, Ok("lock=8vsb ss=70 snq=60 seq=100"));

        let mut scanner = Scanner::new(tuner, &plan, no_retry());
        let session = scanner.run(&device(2), &target(1)).unwrap();

        assert_eq!(session.records.len(), 3);
        assert!(session.records[0].status.is_locked());
        assert_eq!(session.records[1], ScanRecord::no_data(63_000_000));
        assert!(session.records[2].status.is_locked());

        // no retry by default: one tune per frequency
        let tuned: Vec<u32> = scanner.tuner().tune_calls.iter().map(|(_, hz)| *hz).collect();
        assert_eq!(tuned, vec![57_000_000, 63_000_000, 69_000_000]);
    }

    #[test]
    fn test_busy_retry_is_bounded() {
        let plan = plan(&[(57_000_000, 2)]);
        let tuner = FakeTuner::default()
            .status(57_000_000, Err(busy()))
            .status(57_000_000, Err(busy()))
            .status(57_000_000, Err(busy()))
            .status(57_000_000, Ok("lock=8vsb ss=80"));
        let options = ScanOptions {
            busy_retries: 2,
            retry_backoff: Duration::ZERO,
        };

        let mut scanner = Scanner::new(tuner, &plan, options);
        let session = scanner.run(&device(1), &target(0)).unwrap();

        assert_eq!(scanner.tuner().tune_calls.len(), 3);
        assert_eq!(session.records[0], ScanRecord::no_data(57_000_000));
    }

    #[test]
    fn test_busy_retry_recovers() {
        let plan = plan(&[(57_000_000, 2)]);
        let tuner = FakeTuner::default()
            .status(57_000_000, Err(busy()))
            .status(57_000_000, Ok("lock=8vsb ss=80"));
        let options = ScanOptions {
            busy_retries: 1,
            retry_backoff: Duration::ZERO,
        };

        let mut scanner = Scanner::new(tuner, &plan, options);
        let session = scanner.run(&device(1), &target(0)).unwrap();

        assert_eq!(scanner.tuner().tune_calls.len(), 2);
        assert!(session.records[0].status.is_locked());
    }

    #[test]
    fn test_other_errors_are_not_retried() {
        let plan = plan(&[(57_000_000, 2)]);
        let tuner = FakeTuner::default()
            .status(57_000_000, Err(TunerError::NoResponse("1040ABCD".to_string())));
        let options = ScanOptions {
            busy_retries: 3,
            retry_backoff: Duration::ZERO,
        };

        let mut scanner = Scanner::new(tuner, &plan, options);
        let session = scanner.run(&device(1), &target(0)).unwrap();

        assert_eq!(scanner.tuner().tune_calls.len(), 1);
        assert_eq!(session.records[0], ScanRecord::no_data(57_000_000));
    }

    #[test]
    fn test_program_query_failure_records_no_data() {
        let plan = plan(&[(57_000_000, 2)]);
        let tuner = FakeTuner::default()
            .status(57_000_000, Ok("lock=8vsb ss=80"))
            .programs(57_000_000, Err(busy()));

        let mut scanner = Scanner::new(tuner, &plan, no_retry());
        let session = scanner.run(&device(1), &target(0)).unwrap();
        assert_eq!(session.records[0], ScanRecord::no_data(57_000_000));
    }

    #[test]
    fn test_unlocked_stray_numbers_suppressed() {
        let plan = plan(&[(57_000_000, 2)]);
        let tuner = FakeTuner::default()
            .status(57_000_000, Ok("lock=none ss=45 snq=12 seq=7 tsid=0x0001"))
            .programs(57_000_000, Ok("1: GHOST\n"));

        let mut scanner = Scanner::new(tuner, &plan, no_retry());
        let session = scanner.run(&device(1), &target(0)).unwrap();

        let record = &session.records[0];
        assert_eq!(record.status, TunerStatus::unlocked(57_000_000));
        assert!(record.programs.is_empty());
        assert_eq!(scanner.tuner().program_calls, 0);
    }

    #[test]
    fn test_record_count_matches_plan() {
        let plan = FrequencyPlan::from_kind(PlanKind::UsBcast);
        let mut scanner = Scanner::new(FakeTuner::default(), &plan, no_retry());
        let session = scanner.run(&device(1), &target(0)).unwrap();

        assert_eq!(session.records.len(), plan.len());
        let order: Vec<u32> = session.records.iter().map(|r| r.frequency_hz()).collect();
        let expected: Vec<u32> = plan.entries().iter().map(|e| e.frequency_hz).collect();
        assert_eq!(order, expected);
        assert_eq!(session.locked_count(), 0);
    }

    #[test]
    fn test_tuner_not_selectable_aborts() {
        let plan = plan(&[(57_000_000, 2)]);
        let mut scanner = Scanner::new(FakeTuner::default(), &plan, no_retry());

        let err = scanner.run(&device(2), &target(3)).unwrap_err();
        assert!(matches!(
            err,
            ScanError::TunerNotSelectable {
                tuner_index: 3,
                tuner_count: 2,
                ..
            }
        ));
        assert_eq!(scanner.state(), ScanState::Aborted);
        assert!(scanner.tuner().tune_calls.is_empty());
        assert!(scanner.tuner().released.is_empty());
    }

    #[test]
    fn test_target_on_other_device_aborts() {
        let plan = plan(&[(57_000_000, 2)]);
        let mut scanner = Scanner::new(FakeTuner::default(), &plan, no_retry());

        let other = ScanTarget::new("10A0F00D", 0);
        assert!(matches!(
            scanner.run(&device(2), &other),
            Err(ScanError::DeviceNotFound(id)) if id == "10A0F00D"
        ));
        assert_eq!(scanner.state(), ScanState::Aborted);
        assert!(scanner.tuner().tune_calls.is_empty());

        // device ids compare case-insensitively
        assert!(scanner.run(&device(2), &ScanTarget::new("1040abcd", 1)).is_ok());
    }

    #[test]
    fn test_empty_plan_aborts() {
        let plan = plan(&[]);
        let mut scanner = Scanner::new(FakeTuner::default(), &plan, no_retry());
        assert!(matches!(scanner.run(&device(1), &target(0)), Err(ScanError::EmptyPlan)));
        assert_eq!(scanner.state(), ScanState::Aborted);
    }

    #[test]
    fn test_run_all_scans_each_tuner() {
        let plan = plan(&[(57_000_000, 2), (63_000_000, 3)]);
        let mut scanner = Scanner::new(FakeTuner::default(), &plan, no_retry());

        let sessions = scanner.run_all(&device(3)).unwrap();
        assert_eq!(sessions.len(), 3);
        for (index, session) in sessions.iter().enumerate() {
            assert_eq!(session.tuner_index as usize, index);
            assert_eq!(session.records.len(), 2);
        }
        assert_eq!(scanner.tuner().tune_calls.len(), 6);
        assert_eq!(scanner.tuner().released.len(), 3);
    }

    #[test]
    fn test_run_all_without_tuners() {
        let plan = plan(&[(57_000_000, 2)]);
        let mut scanner = Scanner::new(FakeTuner::default(), &plan, no_retry());
        assert!(matches!(
            scanner.run_all(&device(0)),
            Err(ScanError::TunerNotSelectable { tuner_count: 0, .. })
        ));
    }
}
