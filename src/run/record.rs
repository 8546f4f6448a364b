//! Row types for the raw trial log and the per-problem summary table.
//!
//! Field order in these structs is the persisted column order; the CSV
//! header row written from the field names is the schema identifier. Do not
//! reorder fields without versioning the log.

use nalgebra::DVector;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

/// How a trial's starting point was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StartKind {
    /// The problem's canonical starting point (always start index 1).
    Default,
    /// Drawn from the seeded random source (start indices 2..=N+1).
    Random,
}

impl Display for StartKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            StartKind::Default => write!(f, "default"),
            StartKind::Random => write!(f, "random"),
        }
    }
}

/// Terminal classification of one trial as persisted in the raw log.
///
/// `Maxiter` and `LinesearchFailed` are valid algorithm outcomes surfaced as
/// data; `Error` marks a trial whose construction or stepping failed
/// unexpectedly and was isolated by the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrialStatus {
    Optimal,
    Maxiter,
    LinesearchFailed,
    Error,
}

impl Display for TrialStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            TrialStatus::Optimal => write!(f, "optimal"),
            TrialStatus::Maxiter => write!(f, "maxiter"),
            TrialStatus::LinesearchFailed => write!(f, "linesearch_failed"),
            TrialStatus::Error => write!(f, "error"),
        }
    }
}

/// One row per (problem, start) trial. Written once, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub problem_id: u32,
    pub problem_name: String,
    pub n: usize,
    pub m: usize,
    pub start_index: usize,
    pub start_kind: StartKind,
    pub status: TrialStatus,
    pub iterations: usize,
    pub f_evals: u64,
    pub g_evals: u64,
    pub final_residual: f64,
    pub elapsed_seconds: f64,
    /// Final residual vector, semicolon-joined fixed-precision floats.
    /// Empty for `error` rows.
    pub objective_values: String,
}

/// One row per problem in the summary table. Recomputed wholesale from
/// [`RunRecord`]s; never persisted incrementally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryRecord {
    pub problem_id: u32,
    pub problem_name: String,
    pub n: usize,
    pub m: usize,
    pub n_starts: usize,
    pub n_optimal: usize,
    pub success_rate: f64,
    /// Medians are over `optimal` rows only; NaN when none converged.
    pub median_iterations: f64,
    pub median_f_evals: f64,
    pub median_elapsed_seconds: f64,
    pub median_residual: f64,
}

/// Join a residual vector into the persisted `objective_values` form.
pub fn join_objective_values(residual: &DVector<f64>) -> String {
    residual
        .iter()
        .map(|v| format!("{:.8e}", v))
        .collect::<Vec<_>>()
        .join(";")
}
