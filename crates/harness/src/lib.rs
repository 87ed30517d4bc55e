//! Execution harness for kernelsuite.
//!
//! [`KernelLifecycle`] takes one kernel through allocate, timed run,
//! checksum and release for a (variant, tuning) pair. [`SuiteExecutor`]
//! drives a whole selection through it, cross-validates the checksums and
//! hands the result to [`SuiteReport`].

pub mod error;
pub mod executor;
pub mod lifecycle;
pub mod metrics;
pub mod records;
pub mod report;
pub mod runner;
pub mod validate;

pub use error::HarnessError;
pub use executor::{
    ExecutorOptions, KernelRunSummary, Selection, SkipEntry, SkipReason, SuiteExecutor, SuiteRun,
    TuningSelection, VariantRequest,
};
pub use lifecycle::{KernelLifecycle, LifecycleState, RunOutcome, Timing};
pub use metrics::RunMetrics;
pub use records::{RunKey, RunRecord, RunRecordTable, RunSample, RunStatus};
pub use report::{HistoryStats, ReportRow, RowDelta, SuiteReport};
pub use runner::{run_timed, MonotonicTimer, Timer};
pub use validate::{CrossValidator, Discrepancy, RunReference};
