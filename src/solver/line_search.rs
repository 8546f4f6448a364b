//! Backtracking line search with an Armijo sufficient-decrease condition.
//!
//! Works on the merit function `φ(x) = ½‖r(x)‖²`. Starting from the
//! configured initial step, the step size is shrunk geometrically until
//!
//! ```text
//! φ(x + t·d) ≤ φ(x) + c·t·(g·d)
//! ```
//!
//! holds, where `g = Jᵀr` is the merit gradient. Exhausting the attempt
//! budget is an ordinary outcome, not an error: the state machine maps it to
//! its `LineSearchFailed` terminal state.

use crate::core::counter::CountedProblem;
use crate::solver::presets::SolverConfig;
use nalgebra::DVector;

/// Result of one backtracking search.
pub enum LineSearchOutcome {
    /// A step satisfying the Armijo condition was found.
    Accepted {
        /// Accepted step size `t`.
        step_size: f64,
        /// The new point `x + t·d`.
        x: DVector<f64>,
        /// Residual vector at the new point (already evaluated and counted).
        residual: DVector<f64>,
    },
    /// The attempt budget ran out without an acceptable step.
    Exhausted {
        /// Number of trial steps evaluated.
        attempts: usize,
    },
}

/// Backtrack along `direction` from `x` until the Armijo condition holds.
///
/// `merit` is `½‖r(x)‖²` and `directional_derivative` is `g·d` at `x`; both
/// are supplied by the caller, which already has the residual and gradient in
/// hand. Every trial point costs one counted residual evaluation. Trial
/// points with non-finite merit are treated as rejections and backtracked
/// past, so a step that leaves the domain of the problem shrinks away
/// instead of poisoning the iteration.
pub fn backtrack(
    problem: &CountedProblem<'_>,
    x: &DVector<f64>,
    direction: &DVector<f64>,
    merit: f64,
    directional_derivative: f64,
    config: &SolverConfig,
) -> LineSearchOutcome {
    let mut step_size = config.initial_step;

    for _ in 0..config.max_backtracks {
        let trial_x = x + direction * step_size;
        let trial_residual = problem.residual(&trial_x);
        let trial_merit = 0.5 * trial_residual.norm_squared();

        // NaN comparisons are false, so a non-finite trial merit falls
        // through to the next shrink.
        if trial_merit <= merit + config.armijo_c * step_size * directional_derivative {
            return LineSearchOutcome::Accepted {
                step_size,
                x: trial_x,
                residual: trial_residual,
            };
        }

        step_size *= config.backtrack_factor;
    }

    LineSearchOutcome::Exhausted {
        attempts: config.max_backtracks,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::problem::{FeasibleSet, ProblemDescriptor};
    use nalgebra::{DMatrix, DVector, dvector};

    /// r(x) = x, so φ(x) = ½‖x‖² with minimum at the origin.
    fn identity_descriptor() -> ProblemDescriptor {
        fn residual(x: &DVector<f64>) -> DVector<f64> {
            x.clone()
        }
        fn jacobian(x: &DVector<f64>) -> DMatrix<f64> {
            DMatrix::identity(x.len(), x.len())
        }
        ProblemDescriptor::new(
            100,
            "identity",
            2,
            2,
            dvector![1.0, 1.0],
            FeasibleSet::Unbounded { radius: 1.0 },
            residual,
            jacobian,
        )
    }

    #[test]
    fn test_full_step_accepted_on_well_scaled_problem() {
        let descriptor = identity_descriptor();
        let problem = CountedProblem::new(&descriptor);
        let x = dvector![1.0, 1.0];
        let residual = problem.residual(&x);
        let merit = 0.5 * residual.norm_squared();
        // Newton direction for r(x) = x is -x; g·d = -‖x‖².
        let direction = dvector![-1.0, -1.0];
        let gd = -x.norm_squared();

        match backtrack(&problem, &x, &direction, merit, gd, &SolverConfig::default()) {
            LineSearchOutcome::Accepted { step_size, x, .. } => {
                assert_eq!(step_size, 1.0);
                assert!(x.norm() < 1e-12);
            }
            LineSearchOutcome::Exhausted { .. } => panic!("full step should be accepted"),
        }
    }

    #[test]
    fn test_ascent_direction_exhausts_budget() {
        let descriptor = identity_descriptor();
        let problem = CountedProblem::new(&descriptor);
        let x = dvector![1.0, 1.0];
        let residual = problem.residual(&x);
        let merit = 0.5 * residual.norm_squared();
        // Moving away from the origin only increases the merit; the Armijo
        // test is fed the true (positive) directional derivative.
        let direction = dvector![1.0, 1.0];
        let gd = x.norm_squared();

        let config = SolverConfig::default().with_max_backtracks(10);
        match backtrack(&problem, &x, &direction, merit, gd, &config) {
            LineSearchOutcome::Exhausted { attempts } => assert_eq!(attempts, 10),
            LineSearchOutcome::Accepted { .. } => panic!("ascent direction must not be accepted"),
        }
    }

    #[test]
    fn test_each_attempt_counts_one_residual_evaluation() {
        let descriptor = identity_descriptor();
        let problem = CountedProblem::new(&descriptor);
        let x = dvector![1.0, 1.0];
        let residual = problem.residual(&x);
        let merit = 0.5 * residual.norm_squared();
        let before = problem.residual_count();

        let config = SolverConfig::default().with_max_backtracks(6);
        let _ = backtrack(&problem, &x, &dvector![1.0, 1.0], merit, x.norm_squared(), &config);

        assert_eq!(problem.residual_count() - before, 6);
    }
}
