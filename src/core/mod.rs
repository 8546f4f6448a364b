//! Problem definitions and evaluation bookkeeping.
//!
//! This module supplies the immutable test-problem descriptors the run driver
//! iterates over ([`problem`]) and the counted evaluation wrapper the solver
//! evaluates through ([`counter`]).

pub mod counter;
pub mod problem;

pub use counter::{CountedProblem, EvalCounter};
pub use problem::{FeasibleSet, ProblemDescriptor};

use thiserror::Error;

/// Errors from the problem registry.
#[derive(Debug, Clone, Error)]
pub enum CoreError {
    /// A problem id that is not present in the registry was requested
    #[error("Unknown problem id: {id}")]
    UnknownProblem { id: u32 },

    /// The run was asked to execute an empty set of problems
    #[error("No problems selected")]
    EmptySelection,
}
