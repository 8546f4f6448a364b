//! Damped Gauss-Newton for nonlinear systems, driven as a pull-based state
//! machine.
//!
//! Solves `r(x) = 0` for `r: ℝⁿ → ℝᵐ`, `m ≥ n`, by minimizing the merit
//! function `φ(x) = ½‖r(x)‖²`. Each transition:
//!
//! 1. Declares [`TerminalStatus::Converged`] when `‖r(x)‖₂ < tol`, checked
//!    before the first step (the start may already be a root) and after
//!    every update.
//! 2. Declares [`TerminalStatus::MaxIterExceeded`] when the iteration index
//!    reaches the cap before convergence.
//! 3. Otherwise takes the Gauss-Newton direction from the least-squares
//!    solve `J·d ≈ -r` (steepest descent `-Jᵀr` when the solve is
//!    degenerate or not a descent direction), finds a step size by Armijo
//!    backtracking, and suspends after yielding the new iterate. An
//!    exhausted backtracking budget is the terminal
//!    [`TerminalStatus::LineSearchFailed`], distinct from the iteration cap.
//!
//! The machine is cooperative and pull-based: nothing advances until the
//! caller invokes [`GaussNewton::step`], and each call performs exactly one
//! transition. The internal state (previous iterate, current iterate,
//! previous direction, residual at the current iterate, iteration index) is
//! replaced wholesale at every transition, never mutated in place. A
//! finished machine is not restartable; stepping it again is the usage
//! error [`SolverError::AlreadyFinished`].
//!
//! The only side effects besides the yielded iterates are the evaluation
//! counter increments on the wrapped problem.

use crate::core::counter::CountedProblem;
use crate::solver::line_search::{self, LineSearchOutcome};
use crate::solver::presets::{ConfigError, SolverConfig};
use crate::solver::{Iterate, SolverError, SolverResult, StepOutcome, TerminalStatus};
use nalgebra::{DMatrix, DVector};
use tracing::trace;

/// Iteration state. Replaced, not mutated, at every transition so the
/// caller can inspect a consistent snapshot between steps.
#[derive(Debug, Clone)]
struct IterState {
    prev_x: Option<DVector<f64>>,
    x: DVector<f64>,
    prev_direction: Option<DVector<f64>>,
    residual: DVector<f64>,
    iteration: usize,
}

enum Machine {
    /// Constructed, nothing evaluated yet.
    Initial { x0: DVector<f64> },
    /// Suspended mid-iteration.
    Running(IterState),
    /// Terminal; retains the final state for inspection.
    Finished {
        status: TerminalStatus,
        state: IterState,
    },
    /// Transient marker while a transition owns the state.
    Transitioning,
}

/// One Gauss-Newton solve over one (problem, start) pair.
pub struct GaussNewton<'a> {
    problem: &'a CountedProblem<'a>,
    config: SolverConfig,
    machine: Machine,
}

impl<'a> GaussNewton<'a> {
    /// Construct a machine over a counted problem, a starting point and a
    /// resolved configuration.
    ///
    /// Fails fast with a descriptive [`ConfigError`] when the tolerance or
    /// the iteration cap is not strictly positive. No evaluation happens
    /// here; the initial residual is evaluated (and counted) by the first
    /// [`step`](Self::step).
    pub fn new(
        problem: &'a CountedProblem<'a>,
        x0: DVector<f64>,
        config: SolverConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            problem,
            config,
            machine: Machine::Initial { x0 },
        })
    }

    /// Perform one transition: yield the next iterate or a terminal status.
    ///
    /// Returns [`SolverError::AlreadyFinished`] if the machine already
    /// reached a terminal state, and a numerical [`SolverError`] when an
    /// evaluation breaks down; both leave the machine inspectable.
    pub fn step(&mut self) -> SolverResult<StepOutcome> {
        let state = match std::mem::replace(&mut self.machine, Machine::Transitioning) {
            Machine::Finished { status, state } => {
                self.machine = Machine::Finished { status, state };
                return Err(SolverError::AlreadyFinished);
            }
            Machine::Initial { x0 } => {
                let residual = self.problem.residual(&x0);
                if !residual.iter().all(|v| v.is_finite()) {
                    self.machine = Machine::Initial { x0 };
                    return Err(SolverError::NonFiniteResidual { iteration: 0 }.log());
                }
                IterState {
                    prev_x: None,
                    x: x0,
                    prev_direction: None,
                    residual,
                    iteration: 0,
                }
            }
            Machine::Running(state) => state,
            Machine::Transitioning => unreachable!("step() re-entered mid-transition"),
        };
        self.advance(state)
    }

    fn advance(&mut self, state: IterState) -> SolverResult<StepOutcome> {
        let residual_norm = state.residual.norm();
        if residual_norm < self.config.tol {
            return Ok(self.finish(TerminalStatus::Converged, state));
        }
        if state.iteration >= self.config.max_iterations {
            return Ok(self.finish(TerminalStatus::MaxIterExceeded, state));
        }

        let jacobian = self.problem.jacobian(&state.x);
        if !jacobian.iter().all(|v| v.is_finite()) {
            let iteration = state.iteration;
            self.machine = Machine::Running(state);
            return Err(SolverError::NonFiniteJacobian { iteration }.log());
        }

        let gradient = jacobian.transpose() * &state.residual;
        let direction = Self::direction(&jacobian, &state.residual, &gradient);
        if !direction.iter().all(|v| v.is_finite()) {
            let iteration = state.iteration;
            self.machine = Machine::Running(state);
            return Err(SolverError::NonFiniteDirection { iteration }.log());
        }

        let directional_derivative = gradient.dot(&direction);
        let merit = 0.5 * residual_norm * residual_norm;

        match line_search::backtrack(
            self.problem,
            &state.x,
            &direction,
            merit,
            directional_derivative,
            &self.config,
        ) {
            LineSearchOutcome::Accepted {
                step_size,
                x,
                residual,
            } => {
                let next = IterState {
                    prev_x: Some(state.x),
                    x,
                    prev_direction: Some(direction),
                    residual,
                    iteration: state.iteration + 1,
                };
                let iterate = Iterate {
                    x: next.x.clone(),
                    residual_norm: next.residual.norm(),
                    iteration: next.iteration,
                };
                trace!(
                    "iter {:>4}  step {:.3e}  residual {:.6e}",
                    iterate.iteration, step_size, iterate.residual_norm
                );
                self.machine = Machine::Running(next);
                Ok(StepOutcome::Iterate(iterate))
            }
            LineSearchOutcome::Exhausted { attempts } => {
                trace!(
                    "line search exhausted after {} attempts at iter {}",
                    attempts, state.iteration
                );
                Ok(self.finish(TerminalStatus::LineSearchFailed, state))
            }
        }
    }

    fn finish(&mut self, status: TerminalStatus, state: IterState) -> StepOutcome {
        self.machine = Machine::Finished { status, state };
        StepOutcome::Terminal(status)
    }

    /// Gauss-Newton direction via the SVD least-squares solve `J·d ≈ -r`,
    /// falling back to steepest descent `-g` when the solve fails or the
    /// candidate is not a descent direction for the merit function.
    fn direction(
        jacobian: &DMatrix<f64>,
        residual: &DVector<f64>,
        gradient: &DVector<f64>,
    ) -> DVector<f64> {
        let svd = jacobian.clone().svd(true, true);
        if let Ok(candidate) = svd.solve(&(-residual), 1e-12)
            && candidate.iter().all(|v| v.is_finite())
            && gradient.dot(&candidate) < 0.0
        {
            return candidate;
        }
        -gradient
    }

    /// Terminal status, if the machine has finished.
    pub fn status(&self) -> Option<TerminalStatus> {
        match &self.machine {
            Machine::Finished { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Iteration index of the current state (0 until the first accepted
    /// step).
    pub fn iterations(&self) -> usize {
        match &self.machine {
            Machine::Running(state) | Machine::Finished { state, .. } => state.iteration,
            _ => 0,
        }
    }

    /// The current iterate: the starting point until the first accepted
    /// step, then the most recent iterate.
    pub fn current_x(&self) -> &DVector<f64> {
        match &self.machine {
            Machine::Initial { x0 } => x0,
            Machine::Running(state) | Machine::Finished { state, .. } => &state.x,
            Machine::Transitioning => unreachable!("inspected mid-transition"),
        }
    }

    /// Residual vector at the current iterate; `None` before the first step.
    pub fn current_residual(&self) -> Option<&DVector<f64>> {
        match &self.machine {
            Machine::Running(state) | Machine::Finished { state, .. } => Some(&state.residual),
            _ => None,
        }
    }

    /// The previous iterate, once at least one step was accepted.
    pub fn previous_x(&self) -> Option<&DVector<f64>> {
        match &self.machine {
            Machine::Running(state) | Machine::Finished { state, .. } => state.prev_x.as_ref(),
            _ => None,
        }
    }

    /// The most recent accepted search direction.
    pub fn previous_direction(&self) -> Option<&DVector<f64>> {
        match &self.machine {
            Machine::Running(state) | Machine::Finished { state, .. } => {
                state.prev_direction.as_ref()
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::problem::{self, FeasibleSet, ProblemDescriptor};
    use approx::assert_relative_eq;
    use nalgebra::dvector;

    fn drive(machine: &mut GaussNewton<'_>) -> SolverResult<TerminalStatus> {
        loop {
            match machine.step()? {
                StepOutcome::Iterate(_) => continue,
                StepOutcome::Terminal(status) => return Ok(status),
            }
        }
    }

    #[test]
    fn test_rosenbrock_converges_from_canonical_start() {
        let descriptor = problem::by_id(1).unwrap();
        let counted = CountedProblem::new(&descriptor);
        let config = SolverConfig::default();
        let mut machine = GaussNewton::new(&counted, descriptor.x0.clone(), config).unwrap();

        let status = drive(&mut machine).unwrap();

        assert_eq!(status, TerminalStatus::Converged);
        let x = machine.current_x();
        assert_relative_eq!(x[0], 1.0, epsilon = 1e-6);
        assert_relative_eq!(x[1], 1.0, epsilon = 1e-6);
        assert!(machine.iterations() > 0);
        assert!(counted.residual_count() > 0);
        assert!(counted.jacobian_count() > 0);
    }

    #[test]
    fn test_start_at_root_converges_in_zero_iterations() {
        fn residual(x: &DVector<f64>) -> DVector<f64> {
            dvector![x[0] - 1.0, x[1] + 2.0]
        }
        fn jacobian(x: &DVector<f64>) -> DMatrix<f64> {
            DMatrix::identity(x.len(), x.len())
        }
        let descriptor = ProblemDescriptor::new(
            101,
            "shifted_identity",
            2,
            2,
            dvector![1.0, -2.0],
            FeasibleSet::Unbounded { radius: 1.0 },
            residual,
            jacobian,
        );
        let counted = CountedProblem::new(&descriptor);
        let mut machine =
            GaussNewton::new(&counted, descriptor.x0.clone(), SolverConfig::default()).unwrap();

        match machine.step().unwrap() {
            StepOutcome::Terminal(TerminalStatus::Converged) => {}
            other => panic!("expected immediate convergence, got {:?}", other),
        }
        assert_eq!(machine.iterations(), 0);
        // Exactly the single initial residual evaluation.
        assert_eq!(counted.residual_count(), 1);
        assert_eq!(counted.jacobian_count(), 0);
    }

    #[test]
    fn test_iteration_cap_is_terminal_not_error() {
        let descriptor = problem::by_id(1).unwrap();
        let counted = CountedProblem::new(&descriptor);
        let config = SolverConfig::default().with_max_iterations(2);
        let mut machine = GaussNewton::new(&counted, descriptor.x0.clone(), config).unwrap();

        let status = drive(&mut machine).unwrap();

        assert_eq!(status, TerminalStatus::MaxIterExceeded);
        assert_eq!(machine.iterations(), 2);
    }

    #[test]
    fn test_exhausted_backtracking_is_line_search_failure() {
        let descriptor = problem::by_id(1).unwrap();
        let counted = CountedProblem::new(&descriptor);
        let config = SolverConfig::default().with_max_backtracks(0);
        let mut machine = GaussNewton::new(&counted, descriptor.x0.clone(), config).unwrap();

        let status = drive(&mut machine).unwrap();

        assert_eq!(status, TerminalStatus::LineSearchFailed);
    }

    #[test]
    fn test_stepping_finished_machine_is_usage_error() {
        let descriptor = problem::by_id(1).unwrap();
        let counted = CountedProblem::new(&descriptor);
        let config = SolverConfig::default().with_max_iterations(1);
        let mut machine = GaussNewton::new(&counted, descriptor.x0.clone(), config).unwrap();

        drive(&mut machine).unwrap();
        assert!(matches!(
            machine.step(),
            Err(SolverError::AlreadyFinished)
        ));
        // The terminal classification survives the failed call.
        assert_eq!(machine.status(), Some(TerminalStatus::MaxIterExceeded));
    }

    #[test]
    fn test_constructor_validates_tolerance_and_cap() {
        let descriptor = problem::by_id(1).unwrap();
        let counted = CountedProblem::new(&descriptor);

        let bad_tol = SolverConfig::default().with_tol(0.0);
        assert!(matches!(
            GaussNewton::new(&counted, descriptor.x0.clone(), bad_tol),
            Err(ConfigError::NonPositiveTolerance { .. })
        ));

        let bad_cap = SolverConfig::default().with_max_iterations(0);
        assert!(matches!(
            GaussNewton::new(&counted, descriptor.x0.clone(), bad_cap),
            Err(ConfigError::ZeroIterationCap)
        ));
    }

    #[test]
    fn test_state_snapshot_tracks_previous_iterate_and_direction() {
        let descriptor = problem::by_id(1).unwrap();
        let counted = CountedProblem::new(&descriptor);
        let mut machine =
            GaussNewton::new(&counted, descriptor.x0.clone(), SolverConfig::default()).unwrap();

        assert!(machine.previous_x().is_none());
        let outcome = machine.step().unwrap();
        assert!(matches!(outcome, StepOutcome::Iterate(_)));
        assert_eq!(machine.previous_x(), Some(&descriptor.x0));
        assert!(machine.previous_direction().is_some());
        assert_eq!(machine.iterations(), 1);
    }
}
