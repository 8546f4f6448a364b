//! Multi-start run orchestration: driver, persistence and aggregation.
//!
//! The driver ([`driver`]) walks the problems × starts cross-product and
//! appends one durable row per trial to the raw log ([`log`]); the
//! aggregator ([`aggregate`]) reduces a raw log into per-problem summary
//! statistics. Row types shared by all three live in [`record`].

pub mod aggregate;
pub mod driver;
pub mod log;
pub mod record;

pub use driver::{RunPlan, RunReport, run};
pub use record::{RunRecord, StartKind, SummaryRecord, TrialStatus};

use std::path::PathBuf;
use thiserror::Error;

/// Errors from the run driver, the persistence layer and the aggregator.
#[derive(Debug, Error)]
pub enum RunError {
    /// Aggregation was requested but no raw log exists; there is no
    /// fallback. The binary maps this to a distinct exit status.
    #[error("Raw result log not found at '{path}'; run the harness first")]
    MissingRawLog { path: PathBuf },

    /// Filesystem failure around the raw or summary log
    #[error("I/O error on result log: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed row or write failure in the CSV layer
    #[error("CSV error on result log: {0}")]
    Csv(#[from] csv::Error),
}
