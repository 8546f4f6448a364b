//! # multistart
//!
//! A resumable multi-start benchmark harness for iterative nonlinear-system
//! solvers.
//!
//! The harness runs a solver over the cross-product of registered test
//! problems and starting points (one canonical start plus `N` seeded random
//! starts per problem), persists one durable row per trial, and reduces the
//! raw log into per-problem summary statistics.
//!
//! ## Architecture
//!
//! - **Problem source** ([`core::problem`]): immutable descriptors for
//!   classic small nonlinear systems with analytic Jacobians and stable ids.
//! - **Evaluation counting** ([`core::counter`]): per-trial counters wrapped
//!   around every residual and Jacobian call.
//! - **Solver state machine** ([`solver::gauss_newton`]): damped
//!   Gauss-Newton with Armijo backtracking, driven pull-based one transition
//!   per `step()`, with explicit terminal states.
//! - **Presets** ([`solver::presets`]): named parameter bundles merged with
//!   explicit overrides.
//! - **Run driver** ([`run::driver`]): sequential trial execution with
//!   per-trial failure isolation and append+flush persistence.
//! - **Persistence** ([`run::log`]): append-only CSV raw log with
//!   whole-problem completion detection for resume.
//! - **Aggregation** ([`run::aggregate`]): idempotent per-problem medians
//!   and success rates over converged trials.
//!
//! ## Example
//!
//! ```no_run
//! use multistart::run::{RunPlan, run};
//! use multistart::solver::presets::Overrides;
//!
//! # fn main() -> Result<(), multistart::MultistartError> {
//! let plan = RunPlan {
//!     problem_ids: vec![1, 2, 3],
//!     random_starts: 10,
//!     seed: 12345,
//!     preset: "default".to_string(),
//!     overrides: Overrides::default(),
//!     log_path: "results/runs.csv".into(),
//!     resume: false,
//! };
//! let report = run(&plan)?;
//! println!("{} trials recorded", report.records.len());
//! # Ok(())
//! # }
//! ```

pub mod core;
pub mod error;
pub mod logger;
pub mod run;
pub mod solver;

pub use crate::core::counter::{CountedProblem, EvalCounter};
pub use crate::core::problem::{FeasibleSet, ProblemDescriptor};
pub use crate::error::{MultistartError, MultistartResult};
pub use crate::logger::{init_logger, init_logger_with_level};
pub use crate::run::driver::{RunPlan, RunReport, run};
pub use crate::run::record::{RunRecord, StartKind, SummaryRecord, TrialStatus};
pub use crate::solver::presets::{ConfigError, Overrides, Preset, SolverConfig};
pub use crate::solver::{GaussNewton, Iterate, SolverError, StepOutcome, TerminalStatus};
