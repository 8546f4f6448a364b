//! Multi-start run driver.
//!
//! For every selected problem the driver executes `N+1` trials: start index
//! 1 is the problem's canonical starting point, indices 2..=N+1 are drawn
//! from a deterministic random source. The source is re-seeded with the run
//! seed for every problem, so a problem's random starts depend only on the
//! seed, not on which other problems run or in which order. That is what
//! makes whole-problem resume reproducible.
//!
//! Execution is strictly sequential: one trial runs to completion (or
//! failure) before the next begins. A failing trial is isolated: its error
//! is classified into the persisted data as an `error` row and the run
//! continues; only configuration-level problems abort the invocation.
//! Every trial is appended and forced to durable storage before the next
//! trial starts.

use crate::core::CoreError;
use crate::core::counter::CountedProblem;
use crate::core::problem::{self, ProblemDescriptor};
use crate::error::MultistartResult;
use crate::run::log::{self, RunLog};
use crate::run::record::{self, RunRecord, StartKind, TrialStatus};
use crate::solver::gauss_newton::GaussNewton;
use crate::solver::presets::{self, Overrides, SolverConfig};
use crate::solver::{StepOutcome, TerminalStatus};
use nalgebra::DVector;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::collections::BTreeSet;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::time::Instant;
use tracing::{info, warn};

/// Everything one run invocation needs.
#[derive(Debug, Clone)]
pub struct RunPlan {
    /// Problems to run, by registry id.
    pub problem_ids: Vec<u32>,
    /// Number of randomized starts per problem (the driver adds the
    /// canonical start on top).
    pub random_starts: usize,
    /// Seed for the start sampler; reused per problem.
    pub seed: u64,
    /// Preset name resolved through the preset table.
    pub preset: String,
    /// Explicit parameter overrides; always win over the preset.
    pub overrides: Overrides,
    /// Raw log location.
    pub log_path: PathBuf,
    /// Skip problems the raw log already holds complete results for.
    pub resume: bool,
}

/// What a run invocation produced.
#[derive(Debug)]
pub struct RunReport {
    /// Rows appended by this invocation, in execution order.
    pub records: Vec<RunRecord>,
    /// Problems skipped as already complete (resume mode).
    pub skipped: Vec<u32>,
}

/// Execute the plan.
///
/// Fails fast, before any trial runs, on configuration errors: unknown
/// preset, invalid tolerance or iteration cap, unknown problem id, empty
/// selection. Everything after that point is absorbed into the result data.
pub fn run(plan: &RunPlan) -> MultistartResult<RunReport> {
    let config = presets::resolve(&plan.preset, &plan.overrides)?;
    config.validate()?;

    if plan.problem_ids.is_empty() {
        return Err(CoreError::EmptySelection.into());
    }
    let problems: Vec<ProblemDescriptor> = plan
        .problem_ids
        .iter()
        .map(|&id| problem::by_id(id))
        .collect::<Result<_, _>>()?;

    let rows_per_problem = plan.random_starts + 1;

    // Resume: detect complete problems by row count and prune stale rows of
    // problems that will be rerun, so the log never holds duplicates.
    let mut completed = BTreeSet::new();
    if plan.resume && plan.log_path.exists() {
        let existing = log::read_all(&plan.log_path)?;
        completed = log::completed_problems(&existing, rows_per_problem);
        let retained: Vec<RunRecord> = existing
            .into_iter()
            .filter(|r| completed.contains(&r.problem_id))
            .collect();
        log::rewrite(&plan.log_path, &retained)?;
        info!(
            "resume: {} problem(s) already complete in {}",
            completed.len(),
            plan.log_path.display()
        );
    }

    let mut raw_log = if plan.resume {
        RunLog::append_to(&plan.log_path)?
    } else {
        RunLog::create(&plan.log_path)?
    };

    info!(
        "running {} problem(s), {} start(s) each (preset '{}', tol {:.1e}, max {} iterations)",
        problems.len(),
        rows_per_problem,
        plan.preset,
        config.tol,
        config.max_iterations
    );

    let mut records = Vec::new();
    let mut skipped = Vec::new();

    for descriptor in &problems {
        if completed.contains(&descriptor.id) {
            info!(
                "problem {:>2} ({}): already complete, skipping",
                descriptor.id, descriptor.name
            );
            skipped.push(descriptor.id);
            continue;
        }

        // Same seed reused per problem: re-runs are bit-reproducible.
        let mut rng = StdRng::seed_from_u64(plan.seed);

        for start_index in 1..=rows_per_problem {
            let (start_kind, x0) = if start_index == 1 {
                (StartKind::Default, descriptor.x0.clone())
            } else {
                (StartKind::Random, descriptor.sample_start(&mut rng))
            };

            let record = run_trial(descriptor, start_index, start_kind, x0, &config);
            info!(
                "problem {:>2} ({:<20}) start {:>2}/{} [{}]: {} in {} iters, residual {:.3e}, {:.1}ms",
                descriptor.id,
                descriptor.name,
                start_index,
                rows_per_problem,
                record.start_kind,
                record.status,
                record.iterations,
                record.final_residual,
                record.elapsed_seconds * 1000.0
            );

            raw_log.append(&record)?;
            records.push(record);
        }
    }

    log_summary_table(&records, &skipped);
    Ok(RunReport { records, skipped })
}

/// Run one trial to its terminal state, isolating any failure into an
/// `error` row. Never aborts the run.
fn run_trial(
    descriptor: &ProblemDescriptor,
    start_index: usize,
    start_kind: StartKind,
    x0: DVector<f64>,
    config: &SolverConfig,
) -> RunRecord {
    let counted = CountedProblem::new(descriptor);
    let started = Instant::now();

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| drive(&counted, x0, config)));
    let elapsed_seconds = started.elapsed().as_secs_f64();

    match outcome {
        Ok(Ok((status, final_residual))) => RunRecord {
            problem_id: descriptor.id,
            problem_name: descriptor.name.to_string(),
            n: descriptor.n,
            m: descriptor.m,
            start_index,
            start_kind,
            status: classify(status),
            iterations: final_residual.iterations,
            f_evals: counted.residual_count(),
            g_evals: counted.jacobian_count(),
            final_residual: final_residual.norm,
            elapsed_seconds,
            objective_values: record::join_objective_values(&final_residual.vector),
        },
        Ok(Err(err)) => {
            warn!(
                "problem {:>2} ({}) start {}: trial failed: {}",
                descriptor.id,
                descriptor.name,
                start_index,
                err.chain_compact()
            );
            degraded_record(descriptor, start_index, start_kind, elapsed_seconds)
        }
        Err(_) => {
            warn!(
                "problem {:>2} ({}) start {}: trial panicked",
                descriptor.id, descriptor.name, start_index
            );
            degraded_record(descriptor, start_index, start_kind, elapsed_seconds)
        }
    }
}

/// Final state captured from a finished machine.
struct FinalResidual {
    vector: DVector<f64>,
    norm: f64,
    iterations: usize,
}

/// Drive one machine to its terminal state with an explicit pull loop.
fn drive(
    counted: &CountedProblem<'_>,
    x0: DVector<f64>,
    config: &SolverConfig,
) -> MultistartResult<(TerminalStatus, FinalResidual)> {
    let mut machine = GaussNewton::new(counted, x0, config.clone())?;
    loop {
        match machine.step()? {
            StepOutcome::Iterate(_) => continue,
            StepOutcome::Terminal(status) => {
                let vector = machine
                    .current_residual()
                    .cloned()
                    .unwrap_or_else(|| DVector::zeros(0));
                let norm = vector.norm();
                return Ok((
                    status,
                    FinalResidual {
                        vector,
                        norm,
                        iterations: machine.iterations(),
                    },
                ));
            }
        }
    }
}

fn classify(status: TerminalStatus) -> TrialStatus {
    match status {
        TerminalStatus::Converged => TrialStatus::Optimal,
        TerminalStatus::MaxIterExceeded => TrialStatus::Maxiter,
        TerminalStatus::LineSearchFailed => TrialStatus::LinesearchFailed,
    }
}

/// Row for a trial whose construction or stepping failed: numeric fields
/// zeroed or NaN, status `error`.
fn degraded_record(
    descriptor: &ProblemDescriptor,
    start_index: usize,
    start_kind: StartKind,
    elapsed_seconds: f64,
) -> RunRecord {
    RunRecord {
        problem_id: descriptor.id,
        problem_name: descriptor.name.to_string(),
        n: descriptor.n,
        m: descriptor.m,
        start_index,
        start_kind,
        status: TrialStatus::Error,
        iterations: 0,
        f_evals: 0,
        g_evals: 0,
        final_residual: f64::NAN,
        elapsed_seconds,
        objective_values: String::new(),
    }
}

fn log_summary_table(records: &[RunRecord], skipped: &[u32]) {
    if records.is_empty() {
        if !skipped.is_empty() {
            info!("nothing to do: all selected problems already complete");
        }
        return;
    }

    info!("RUN SUMMARY");
    info!(
        "{:<4} | {:<20} | {:<6} | {:<7} | {:<7} | {:<9} | {:<5}",
        "id", "problem", "starts", "optimal", "maxiter", "ls_failed", "error"
    );
    info!("{}", "-".repeat(78));

    let mut by_problem: Vec<(u32, &str)> = Vec::new();
    for record in records {
        if !by_problem.iter().any(|&(id, _)| id == record.problem_id) {
            by_problem.push((record.problem_id, record.problem_name.as_str()));
        }
    }

    for (id, name) in by_problem {
        let rows: Vec<&RunRecord> = records.iter().filter(|r| r.problem_id == id).collect();
        let count_of = |status: TrialStatus| rows.iter().filter(|r| r.status == status).count();
        info!(
            "{:<4} | {:<20} | {:<6} | {:<7} | {:<7} | {:<9} | {:<5}",
            id,
            name,
            rows.len(),
            count_of(TrialStatus::Optimal),
            count_of(TrialStatus::Maxiter),
            count_of(TrialStatus::LinesearchFailed),
            count_of(TrialStatus::Error)
        );
    }

    info!("{}", "-".repeat(78));
    let optimal = records
        .iter()
        .filter(|r| r.status == TrialStatus::Optimal)
        .count();
    info!("{}/{} trial(s) converged", optimal, records.len());
    if !skipped.is_empty() {
        info!("skipped {} already-complete problem(s)", skipped.len());
    }
}
