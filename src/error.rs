//! Error types for the multistart harness.
//!
//! The harness uses a hierarchical error system:
//! - [`MultistartError`] is the top-level error exposed through public APIs
//! - Module errors ([`CoreError`](crate::core::CoreError),
//!   [`ConfigError`](crate::solver::presets::ConfigError),
//!   [`SolverError`](crate::solver::SolverError),
//!   [`RunError`](crate::run::RunError)) are wrapped inside it
//! - Error sources are preserved, allowing full error chain inspection
//!
//! Only configuration-level problems reach this type during a run; failures
//! inside a single trial are absorbed by the run driver into the result data
//! (an `error` row) and never propagate here.

use crate::{core::CoreError, run::RunError, solver::SolverError, solver::presets::ConfigError};
use std::error::Error as StdError;
use thiserror::Error;

/// Main result type used throughout the harness.
pub type MultistartResult<T> = Result<T, MultistartError>;

/// Top-level error type for the multistart harness.
///
/// Wraps module-specific errors while preserving the full error chain for
/// diagnostics.
#[derive(Debug, Error)]
pub enum MultistartError {
    /// Problem registry errors (unknown problem id, empty selection)
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Configuration errors (unknown preset, invalid tolerance or iteration cap)
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Solver state machine errors
    #[error(transparent)]
    Solver(#[from] SolverError),

    /// Run driver, persistence and aggregation errors
    #[error(transparent)]
    Run(#[from] RunError),
}

impl MultistartError {
    /// Get the full error chain as a multi-line string for logging.
    ///
    /// Traverses the source chain from the top-level error down to the root
    /// cause.
    pub fn chain(&self) -> String {
        let mut chain = vec![self.to_string()];
        let mut source = self.source();

        while let Some(err) = source {
            chain.push(format!("  → {}", err));
            source = err.source();
        }

        chain.join("\n")
    }

    /// Get a compact single-line error chain.
    pub fn chain_compact(&self) -> String {
        let mut chain = vec![self.to_string()];
        let mut source = self.source();

        while let Some(err) = source {
            chain.push(err.to_string());
            source = err.source();
        }

        chain.join(" → ")
    }
}
