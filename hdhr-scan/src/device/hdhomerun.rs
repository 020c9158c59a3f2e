//! `hdhomerun_config` command line driver.
//!
//! Every operation is one or more invocations of the SiliconDust utility:
//!
//! ```text
//! hdhomerun_config discover
//! hdhomerun_config <id> set /tuner0/channel auto:57000000
//! hdhomerun_config <id> get /tuner0/status
//! hdhomerun_config <id> get /tuner0/streaminfo
//! hdhomerun_config <id> set /tuner0/channel none
//! ```
//!
//! Invocations run to completion one at a time. A small current-thread
//! runtime is kept only to put a timeout on each child process.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};

use log::{debug, info, trace, warn};
use tokio::process::Command;
use tokio::runtime::Runtime;

use hdhr_protocol::{
    check_reply, parse_discover_output, DeviceDescriptor, RawStatusResponse, ScanTarget,
    TunerError, TunerStatus, MAX_TUNERS,
};

use super::{DeviceDiscovery, TunerControl};

/// Default name of the utility on `PATH`.
pub const DEFAULT_COMMAND: &str = "hdhomerun_config";

/// Marker of a complete stream info reply.
const STREAMINFO_TSID: &str = "tsid=";

/// Driver settings.
#[derive(Debug, Clone)]
pub struct HdhrConfigOptions {
    /// Path or name of `hdhomerun_config`.
    pub command: PathBuf,
    /// Limit for a single invocation.
    pub command_timeout: Duration,
    /// How long to wait for a lock after tuning.
    pub lock_wait: Duration,
    /// How long to wait for the program listing of a locked frequency.
    pub program_wait: Duration,
    /// Delay between status polls.
    pub poll_interval: Duration,
}

impl Default for HdhrConfigOptions {
    fn default() -> Self {
        Self {
            command: PathBuf::from(DEFAULT_COMMAND),
            command_timeout: Duration::from_secs(5),
            lock_wait: Duration::from_millis(2500),
            program_wait: Duration::from_millis(3000),
            poll_interval: Duration::from_millis(250),
        }
    }
}

/// [`TunerControl`] and [`DeviceDiscovery`] backed by `hdhomerun_config`.
pub struct HdhrConfigCli {
    options: HdhrConfigOptions,
    runtime: Runtime,
}

impl HdhrConfigCli {
    pub fn new(options: HdhrConfigOptions) -> Result<Self, TunerError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .enable_io()
            .build()
            .map_err(|e| TunerError::Unavailable(format!("failed to start runtime: {}", e)))?;

        Ok(Self { options, runtime })
    }

    /// Run the utility with `args`, returning its standard output.
    ///
    /// `label` names the device in errors.
    fn run(&self, label: &str, args: &[&str]) -> Result<String, TunerError> {
        trace!("HdhrConfigCli: {} {}", self.options.command.display(), args.join(" "));

        let mut command = Command::new(&self.options.command);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let timeout = self.options.command_timeout;
        let result = self
            .runtime
            .block_on(async { tokio::time::timeout(timeout, command.output()).await });

        let output = match result {
            Err(_) => {
                debug!("HdhrConfigCli: {} timed out after {:?}", label, timeout);
                return Err(TunerError::NoResponse(label.to_string()));
            }
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(TunerError::Unavailable(format!(
                    "{} not found",
                    self.options.command.display()
                )));
            }
            Ok(Err(e)) => return Err(TunerError::Unavailable(e.to_string())),
            Ok(Ok(output)) => output,
        };

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr);

        check_reply(label, &stdout)?;
        check_reply(label, &stderr)?;

        if !output.status.success() {
            let message = stderr.trim();
            return Err(TunerError::CommandFailed(if message.is_empty() {
                format!("{} exited with {}", self.options.command.display(), output.status)
            } else {
                message.to_string()
            }));
        }

        Ok(stdout)
    }

    fn get(&self, device_id: &str, item: &str) -> Result<String, TunerError> {
        self.run(device_id, &[device_id, "get", item])
    }

    fn set(&self, device_id: &str, item: &str, value: &str) -> Result<(), TunerError> {
        self.run(device_id, &[device_id, "set", item, value]).map(|_| ())
    }

    /// Poll `item` until `done` accepts the reply or `wait` runs out.
    ///
    /// The last reply is returned either way.
    fn poll_until(
        &self,
        device_id: &str,
        item: &str,
        wait: Duration,
        done: impl Fn(&str) -> bool,
    ) -> Result<String, TunerError> {
        let deadline = Instant::now() + wait;
        loop {
            let reply = self.get(device_id, item)?;
            if done(&reply) || Instant::now() >= deadline {
                return Ok(reply);
            }
            std::thread::sleep(self.options.poll_interval);
        }
    }

    /// Count tuners by probing `/tunerN/status` until the device rejects one.
    fn count_tuners(&self, device_id: &str) -> u8 {
        let mut count = 0;
        for index in 0..MAX_TUNERS {
            match self.get(device_id, &format!("/tuner{}/status", index)) {
                Ok(_) => count += 1,
                Err(TunerError::CommandFailed(_)) => break,
                Err(e) => {
                    warn!("HdhrConfigCli: probing tuner {} of {} failed: {}", index, device_id, e);
                    break;
                }
            }
        }
        count
    }
}

impl TunerControl for HdhrConfigCli {
    fn tune(
        &mut self,
        target: &ScanTarget,
        frequency_hz: u32,
    ) -> Result<RawStatusResponse, TunerError> {
        let tuner = target.tuner_path();
        self.set(
            &target.device_id,
            &format!("{}/channel", tuner),
            &format!("auto:{}", frequency_hz),
        )?;

        let status = self.poll_until(
            &target.device_id,
            &format!("{}/status", tuner),
            self.options.lock_wait,
            |reply| TunerStatus::reports_lock(&RawStatusResponse::from(reply)),
        )?;

        Ok(RawStatusResponse::from(status))
    }

    fn query_programs(&mut self, target: &ScanTarget) -> Result<RawStatusResponse, TunerError> {
        let streaminfo = self.poll_until(
            &target.device_id,
            &format!("{}/streaminfo", target.tuner_path()),
            self.options.program_wait,
            |reply| reply.contains(STREAMINFO_TSID),
        )?;

        Ok(RawStatusResponse::from(streaminfo))
    }

    fn release(&mut self, target: &ScanTarget) -> Result<(), TunerError> {
        self.set(
            &target.device_id,
            &format!("{}/channel", target.tuner_path()),
            "none",
        )
    }
}

impl DeviceDiscovery for HdhrConfigCli {
    fn discover(&mut self) -> Result<Vec<DeviceDescriptor>, TunerError> {
        let output = self.run("discover", &["discover"])?;
        let found = parse_discover_output(&output);
        info!("HdhrConfigCli: {} device(s) found", found.len());

        let devices = found
            .into_iter()
            .map(|device| {
                let tuner_count = self.count_tuners(&device.id);
                debug!("HdhrConfigCli: device {} has {} tuner(s)", device.id, tuner_count);
                let descriptor = DeviceDescriptor::new(device.id, tuner_count);
                match device.address {
                    Some(address) => descriptor.with_address(address),
                    None => descriptor,
                }
            })
            .collect();

        Ok(devices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(command: &str) -> HdhrConfigOptions {
        HdhrConfigOptions {
            command: PathBuf::from(command),
            command_timeout: Duration::from_secs(5),
            lock_wait: Duration::ZERO,
            program_wait: Duration::ZERO,
            poll_interval: Duration::from_millis(1),
        }
    }

    #[test]
    fn test_options_default() {
        let options = HdhrConfigOptions::default();
        assert_eq!(options.command, PathBuf::from("hdhomerun_config"));
        assert_eq!(options.command_timeout, Duration::from_secs(5));
        assert!(options.poll_interval < options.lock_wait);
    }

    #[test]
    fn test_missing_command_is_unavailable() {
        let mut cli = HdhrConfigCli::new(options("/nonexistent/hdhomerun_config")).unwrap();
        let target = ScanTarget::new("1040ABCD", 0);

        let err = cli.tune(&target, 57_000_000).unwrap_err();
        assert!(matches!(err, TunerError::Unavailable(_)));
        assert!(matches!(cli.discover(), Err(TunerError::Unavailable(_))));
    }

    #[cfg(unix)]
    #[test]
    fn test_echo_stands_in_for_device() {
        // `echo` prints its arguments, which never carry a lock or an error.
        let mut cli = HdhrConfigCli::new(options("echo")).unwrap();
        let target = ScanTarget::new("1040ABCD", 1);

        let status = cli.tune(&target, 57_000_000).unwrap();
        assert_eq!(status.as_str().trim(), "1040ABCD get /tuner1/status");
        assert!(!TunerStatus::reports_lock(&status));

        let programs = cli.query_programs(&target).unwrap();
        assert_eq!(programs.as_str().trim(), "1040ABCD get /tuner1/streaminfo");

        assert!(cli.release(&target).is_ok());
        assert!(cli.discover().unwrap().is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_failing_command_is_reported() {
        let mut cli = HdhrConfigCli::new(options("false")).unwrap();
        let err = cli.query_programs(&ScanTarget::new("1040ABCD", 0)).unwrap_err();
        assert!(matches!(err, TunerError::CommandFailed(_)));
    }
}
