//! Evaluation counting for residual and Jacobian calls.
//!
//! Each trial owns its own counters; there is no process-wide evaluation
//! state. The solver only sees the counted wrapper, so every objective
//! evaluation is observable to the run driver after the trial finishes.

use crate::core::problem::ProblemDescriptor;
use nalgebra::{DMatrix, DVector};
use std::cell::Cell;

/// Monotone invocation counter.
///
/// Incremented once per wrapped evaluation, never decremented, reset only at
/// construction. `Cell`-based because trials are strictly single-threaded.
#[derive(Debug, Default)]
pub struct EvalCounter(Cell<u64>);

impl EvalCounter {
    /// Create a counter at zero.
    pub fn new() -> Self {
        Self(Cell::new(0))
    }

    /// Record one invocation.
    pub fn bump(&self) {
        self.0.set(self.0.get() + 1);
    }

    /// Current invocation count.
    pub fn count(&self) -> u64 {
        self.0.get()
    }
}

/// A problem descriptor paired with evaluation counters.
///
/// The solver state machine evaluates residuals and Jacobians exclusively
/// through this wrapper; counter increments are its only externally
/// observable side effect besides the produced iterates.
pub struct CountedProblem<'a> {
    descriptor: &'a ProblemDescriptor,
    residual_evals: EvalCounter,
    jacobian_evals: EvalCounter,
}

impl<'a> CountedProblem<'a> {
    /// Wrap a descriptor with fresh counters.
    pub fn new(descriptor: &'a ProblemDescriptor) -> Self {
        Self {
            descriptor,
            residual_evals: EvalCounter::new(),
            jacobian_evals: EvalCounter::new(),
        }
    }

    /// The wrapped descriptor.
    pub fn descriptor(&self) -> &ProblemDescriptor {
        self.descriptor
    }

    /// Evaluate the residual vector `r(x)`, counting the call.
    pub fn residual(&self, x: &DVector<f64>) -> DVector<f64> {
        self.residual_evals.bump();
        self.descriptor.residual(x)
    }

    /// Evaluate the Jacobian `J(x)`, counting the call.
    pub fn jacobian(&self, x: &DVector<f64>) -> DMatrix<f64> {
        self.jacobian_evals.bump();
        self.descriptor.jacobian(x)
    }

    /// Number of residual evaluations so far.
    pub fn residual_count(&self) -> u64 {
        self.residual_evals.count()
    }

    /// Number of Jacobian evaluations so far.
    pub fn jacobian_count(&self) -> u64 {
        self.jacobian_evals.count()
    }
}
