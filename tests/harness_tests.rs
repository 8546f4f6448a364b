//! End-to-end tests for the multi-start harness.
//!
//! These tests drive the full pipeline (planning, trial execution,
//! durable logging, resume, aggregation) against the built-in problem
//! registry and verify the harness's contract:
//!
//! - A completed run holds exactly `N+1` rows per problem
//! - Resume skips complete problems and reproduces an uninterrupted run
//! - Aggregation is idempotent (byte-identical summaries)
//! - Runs are bit-reproducible for a fixed seed
//! - Aggregating without a raw log is a typed, fatal error

use multistart::run::record::{RunRecord, StartKind, TrialStatus};
use multistart::run::{RunError, RunPlan, aggregate, log, run};
use multistart::solver::presets::Overrides;
use std::fs;
use std::path::{Path, PathBuf};

/// A plan matching the documented end-to-end scenario: `tol = 1e-6`,
/// iteration cap 5000, one canonical plus `random_starts` random starts.
fn plan(problem_ids: Vec<u32>, random_starts: usize, log_path: PathBuf) -> RunPlan {
    RunPlan {
        problem_ids,
        random_starts,
        seed: 12345,
        preset: "default".to_string(),
        overrides: Overrides {
            tol: Some(1e-6),
            max_iterations: Some(5000),
            ..Overrides::default()
        },
        log_path,
        resume: false,
    }
}

/// Everything in a record that must be reproducible across runs: all fields
/// except wall-clock time. NaN-safe via bit comparison.
fn stable_fields(record: &RunRecord) -> (u32, String, usize, usize, usize, StartKind, TrialStatus, usize, u64, u64, u64, String) {
    (
        record.problem_id,
        record.problem_name.clone(),
        record.n,
        record.m,
        record.start_index,
        record.start_kind,
        record.status,
        record.iterations,
        record.f_evals,
        record.g_evals,
        record.final_residual.to_bits(),
        record.objective_values.clone(),
    )
}

fn read_log(path: &Path) -> Vec<RunRecord> {
    log::read_all(path).expect("raw log should be readable")
}

#[test]
fn test_end_to_end_produces_exactly_one_row_per_start() {
    let dir = tempfile::tempdir().unwrap();
    let log_path = dir.path().join("runs.csv");

    // n=2 problem, canonical start far from the root, 1 default + 5 random.
    let report = run(&plan(vec![1], 5, log_path.clone())).unwrap();

    assert_eq!(report.records.len(), 6);
    let persisted = read_log(&log_path);
    assert_eq!(persisted.len(), 6);

    for (i, record) in persisted.iter().enumerate() {
        assert_eq!(record.problem_id, 1);
        assert_eq!(record.start_index, i + 1);
        if i == 0 {
            assert_eq!(record.start_kind, StartKind::Default);
        } else {
            assert_eq!(record.start_kind, StartKind::Random);
        }
        assert!(record.iterations <= 5000);
        assert!(matches!(
            record.status,
            TrialStatus::Optimal
                | TrialStatus::Maxiter
                | TrialStatus::LinesearchFailed
                | TrialStatus::Error
        ));
    }

    // The canonical Rosenbrock start converges.
    assert_eq!(persisted[0].status, TrialStatus::Optimal);
    assert!(persisted[0].final_residual < 1e-6);
}

#[test]
fn test_full_registry_run_has_complete_row_counts() {
    let dir = tempfile::tempdir().unwrap();
    let log_path = dir.path().join("runs.csv");

    let ids = multistart::core::problem::all_ids();
    let mut quick = plan(ids.clone(), 2, log_path.clone());
    quick.preset = "fast".to_string();
    quick.overrides = Overrides::default();
    run(&quick).unwrap();

    let persisted = read_log(&log_path);
    for id in ids {
        let rows = persisted.iter().filter(|r| r.problem_id == id).count();
        assert_eq!(rows, 3, "problem {} must have exactly N+1 rows", id);
    }
}

#[test]
fn test_resume_skips_complete_problems_and_matches_uninterrupted_run() {
    let dir = tempfile::tempdir().unwrap();
    let interrupted = dir.path().join("interrupted.csv");
    let uninterrupted = dir.path().join("uninterrupted.csv");

    // First invocation covers only problem 1, simulating an interruption
    // before problem 3 started.
    run(&plan(vec![1], 4, interrupted.clone())).unwrap();

    // Resumed invocation over the full selection.
    let mut resumed = plan(vec![1, 3], 4, interrupted.clone());
    resumed.resume = true;
    let report = run(&resumed).unwrap();
    assert_eq!(report.skipped, vec![1]);

    // Reference: the same selection in one uninterrupted invocation.
    run(&plan(vec![1, 3], 4, uninterrupted.clone())).unwrap();

    let resumed_rows: Vec<_> = read_log(&interrupted).iter().map(stable_fields).collect();
    let reference_rows: Vec<_> = read_log(&uninterrupted).iter().map(stable_fields).collect();
    assert_eq!(resumed_rows, reference_rows);
}

#[test]
fn test_resume_reruns_partial_problems_from_scratch() {
    let dir = tempfile::tempdir().unwrap();
    let log_path = dir.path().join("runs.csv");

    // A complete run of problem 1, then truncate its tail to fake a crash
    // mid-problem.
    run(&plan(vec![1], 4, log_path.clone())).unwrap();
    let mut rows = read_log(&log_path);
    assert_eq!(rows.len(), 5);
    rows.truncate(3);
    log::rewrite(&log_path, &rows).unwrap();

    let mut resumed = plan(vec![1], 4, log_path.clone());
    resumed.resume = true;
    let report = run(&resumed).unwrap();

    // The partial problem was not treated as complete: it reran fully and
    // the stale partial rows were pruned, not duplicated.
    assert!(report.skipped.is_empty());
    let rows = read_log(&log_path);
    assert_eq!(rows.len(), 5);
    let indices: Vec<usize> = rows.iter().map(|r| r.start_index).collect();
    assert_eq!(indices, vec![1, 2, 3, 4, 5]);
}

#[test]
fn test_runs_are_bit_reproducible_for_fixed_seed() {
    let dir = tempfile::tempdir().unwrap();
    let first = dir.path().join("first.csv");
    let second = dir.path().join("second.csv");

    run(&plan(vec![1, 4, 6], 5, first.clone())).unwrap();
    run(&plan(vec![1, 4, 6], 5, second.clone())).unwrap();

    let a: Vec<_> = read_log(&first).iter().map(stable_fields).collect();
    let b: Vec<_> = read_log(&second).iter().map(stable_fields).collect();
    assert_eq!(a, b);
}

#[test]
fn test_aggregation_is_idempotent_to_the_byte() {
    let dir = tempfile::tempdir().unwrap();
    let log_path = dir.path().join("runs.csv");
    let summary_path = dir.path().join("summary.csv");

    run(&plan(vec![1, 2], 5, log_path.clone())).unwrap();

    aggregate::summarize(&log_path, &summary_path).unwrap();
    let first = fs::read(&summary_path).unwrap();
    aggregate::summarize(&log_path, &summary_path).unwrap();
    let second = fs::read(&summary_path).unwrap();

    assert_eq!(first, second);
}

#[test]
fn test_summary_has_one_row_per_problem_with_consistent_counts() {
    let dir = tempfile::tempdir().unwrap();
    let log_path = dir.path().join("runs.csv");
    let summary_path = dir.path().join("summary.csv");

    run(&plan(vec![1, 3], 5, log_path.clone())).unwrap();
    let summary = aggregate::summarize(&log_path, &summary_path).unwrap();

    assert_eq!(summary.len(), 2);
    for row in &summary {
        assert_eq!(row.n_starts, 6);
        assert!(row.n_optimal <= row.n_starts);
        let expected_rate = row.n_optimal as f64 / row.n_starts as f64;
        assert_eq!(row.success_rate, expected_rate);
        if row.n_optimal == 0 {
            assert!(row.median_iterations.is_nan());
            assert!(row.median_residual.is_nan());
        } else {
            assert!(row.median_iterations.is_finite());
        }
    }
}

#[test]
fn test_aggregation_without_raw_log_is_fatal_typed_error() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("absent.csv");
    let summary_path = dir.path().join("summary.csv");

    let err = aggregate::summarize(&missing, &summary_path).unwrap_err();
    assert!(matches!(err, RunError::MissingRawLog { .. }));
    assert!(!summary_path.exists(), "no fallback summary may be written");
}

#[test]
fn test_unknown_preset_aborts_before_any_trial() {
    let dir = tempfile::tempdir().unwrap();
    let log_path = dir.path().join("runs.csv");

    let mut bad = plan(vec![1], 3, log_path.clone());
    bad.preset = "turbo".to_string();
    assert!(run(&bad).is_err());
    assert!(!log_path.exists(), "no log may be created for a fatal config error");
}

#[test]
fn test_unknown_problem_id_aborts_before_any_trial() {
    let dir = tempfile::tempdir().unwrap();
    let log_path = dir.path().join("runs.csv");

    assert!(run(&plan(vec![1, 999], 3, log_path.clone())).is_err());
    assert!(!log_path.exists());
}
