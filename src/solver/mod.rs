//! Iterative solvers driven as cooperative state machines.
//!
//! A solver instance covers exactly one (problem, start) pair. The caller
//! pulls the iteration forward one transition at a time with `step()`; the
//! machine suspends after each produced iterate and never runs in the
//! background. Termination is data: [`TerminalStatus`] distinguishes
//! convergence from hitting the iteration cap and from an exhausted line
//! search. Only genuinely unexpected numerical breakdown travels through the
//! [`SolverError`] channel.

pub mod gauss_newton;
pub mod line_search;
pub mod presets;

pub use gauss_newton::GaussNewton;
pub use presets::{ConfigError, Overrides, Preset, SolverConfig};

use nalgebra::DVector;
use std::fmt::{self, Display, Formatter};
use thiserror::Error;
use tracing::error;

/// Solver state machine errors.
///
/// These are *not* algorithm outcomes: reaching the iteration cap or
/// exhausting the line search are terminal states of the machine, not
/// errors. Errors cover misuse and numerical breakdown only.
#[derive(Debug, Clone, Error)]
pub enum SolverError {
    /// `step()` was called on a machine that already reached a terminal state
    #[error("Solver already reached a terminal state; stepping it again is a usage error")]
    AlreadyFinished,

    /// The residual evaluation produced NaN or infinite entries
    #[error("Non-finite residual at iteration {iteration}")]
    NonFiniteResidual { iteration: usize },

    /// The Jacobian evaluation produced NaN or infinite entries
    #[error("Non-finite Jacobian at iteration {iteration}")]
    NonFiniteJacobian { iteration: usize },

    /// The computed search direction contains NaN or infinite entries
    #[error("Non-finite search direction at iteration {iteration}")]
    NonFiniteDirection { iteration: usize },
}

impl SolverError {
    /// Log the error with `tracing::error` and return self for chaining.
    #[must_use]
    pub fn log(self) -> Self {
        error!("{}", self);
        self
    }
}

/// Result type for solver operations.
pub type SolverResult<T> = Result<T, SolverError>;

/// Terminal classification of a finished solver instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminalStatus {
    /// The residual norm fell below the configured tolerance
    Converged,
    /// The iteration cap was reached before convergence
    MaxIterExceeded,
    /// The line search exhausted its attempt budget without an acceptable step
    LineSearchFailed,
}

impl Display for TerminalStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            TerminalStatus::Converged => write!(f, "Converged"),
            TerminalStatus::MaxIterExceeded => write!(f, "Maximum iterations exceeded"),
            TerminalStatus::LineSearchFailed => write!(f, "Line search failed"),
        }
    }
}

/// One produced iterate, yielded by `step()` on each non-terminal transition.
#[derive(Debug, Clone)]
pub struct Iterate {
    /// The new current point.
    pub x: DVector<f64>,
    /// Euclidean norm of the residual at `x`.
    pub residual_norm: f64,
    /// Iteration index of this iterate (1-based; the canonical start is 0).
    pub iteration: usize,
}

/// Outcome of one `step()` call.
#[derive(Debug, Clone)]
pub enum StepOutcome {
    /// The machine advanced and suspended after producing this iterate.
    Iterate(Iterate),
    /// The machine reached a terminal state; further stepping is an error.
    Terminal(TerminalStatus),
}
