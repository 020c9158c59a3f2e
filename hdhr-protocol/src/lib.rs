//! Frequency plans and response parsing for HDHomeRun channel scans.
//!
//! This crate holds everything about a scan that does not touch the
//! network: the channel maps, the parsers for the text `hdhomerun_config`
//! prints, and the shaping of scan records into export rows.
//!
//! # Example
//!
//! ```rust
//! use hdhr_protocol::{
//!     FrequencyPlan, PlanKind, ProgramListing, RawStatusResponse, ResultAggregator,
//!     ScanRecord, TunerStatus,
//! };
//!
//! let plan = FrequencyPlan::from_kind(PlanKind::UsBcast);
//! let entry = plan.entries()[0];
//!
//! let status = RawStatusResponse::from("ch=auto:57000000 lock=8vsb ss=83 snq=91 seq=100");
//! let programs = RawStatusResponse::from("3: 2.1 KCBS-HD\n4: 2.2 START\ntsid=0x0801\n");
//!
//! let record = ScanRecord::new(
//!     TunerStatus::parse(&status.followed_by(&programs), entry.frequency_hz),
//!     ProgramListing::parse(&programs),
//! );
//!
//! let rows = ResultAggregator::new(&plan).rows(&[record]);
//! assert_eq!(rows[0].cells()[1], "2");
//! assert_eq!(rows[0].cells()[6], "0x0801");
//! assert_eq!(rows[0].cells()[7], "2.1 KCBS-HD");
//! ```

pub mod aggregate;
pub mod discover;
pub mod error;
pub mod frequency_plan;
pub mod program;
pub mod status;
pub mod types;

pub use aggregate::{ExportRow, ResultAggregator, COLUMN_COUNT, FIXED_COLUMNS};
pub use discover::{parse_discover_output, DiscoveredDevice};
pub use error::{check_reply, TunerError};
pub use frequency_plan::{parse_channel_range, FrequencyPlan, PlanKind};
pub use types::{
    ChannelMapping, DeviceDescriptor, FrequencyEntry, LockStatus, ProgramEntry, ProgramListing,
    RawStatusResponse, ScanRecord, ScanTarget, TunerSelection, TunerStatus, MAX_EXPORT_PROGRAMS,
    MAX_TUNERS,
};
