use clap::Parser;
use multistart::core::problem;
use multistart::init_logger_with_level;
use multistart::run::{RunError, RunPlan, aggregate, run};
use multistart::solver::presets::Overrides;
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::process;
use tracing::{Level, error, info};

#[derive(Parser)]
#[command(name = "multistart")]
#[command(about = "Multi-start benchmark harness for nonlinear-system solvers")]
struct Args {
    /// Problem ids or inclusive ranges, comma separated (e.g. "1,3,5-8")
    #[arg(short, long, value_delimiter = ',', conflicts_with = "all")]
    problems: Vec<String>,

    /// Run every registered problem
    #[arg(long)]
    all: bool,

    /// Number of random starts per problem (the canonical start is added on top)
    #[arg(short = 'n', long, default_value_t = 10)]
    starts: usize,

    /// Seed for the start sampler; reused per problem for reproducible runs
    #[arg(long, default_value_t = 12345)]
    seed: u64,

    /// Solver preset: "default", "strict" or "fast"
    #[arg(long, default_value = "default")]
    preset: String,

    /// Override the preset's residual-norm tolerance
    #[arg(long)]
    tol: Option<f64>,

    /// Override the preset's iteration cap
    #[arg(long)]
    max_iterations: Option<usize>,

    /// Skip problems the raw log already holds complete results for
    #[arg(long, conflicts_with = "summary")]
    resume: bool,

    /// Aggregate an existing raw log instead of running trials
    #[arg(long)]
    summary: bool,

    /// Silence per-trial progress output
    #[arg(short, long)]
    quiet: bool,

    /// Raw log path
    #[arg(long, default_value = "results/runs.csv")]
    log: PathBuf,

    /// Summary table path (aggregation mode)
    #[arg(long, default_value = "results/summary.csv")]
    summary_out: PathBuf,
}

/// Expand explicit ids and inclusive ranges into an ordered, deduplicated
/// id list.
fn parse_problem_selection(args: &Args) -> Result<Vec<u32>, String> {
    if args.all {
        return Ok(problem::all_ids());
    }

    let mut ids = Vec::new();
    let mut seen = BTreeSet::new();
    for token in &args.problems {
        let token = token.trim();
        let parsed: Vec<u32> = if let Some((lo, hi)) = token.split_once('-') {
            let lo: u32 = lo
                .trim()
                .parse()
                .map_err(|_| format!("invalid problem range '{token}'"))?;
            let hi: u32 = hi
                .trim()
                .parse()
                .map_err(|_| format!("invalid problem range '{token}'"))?;
            if lo > hi {
                return Err(format!("empty problem range '{token}'"));
            }
            (lo..=hi).collect()
        } else {
            vec![
                token
                    .parse()
                    .map_err(|_| format!("invalid problem id '{token}'"))?,
            ]
        };
        for id in parsed {
            if seen.insert(id) {
                ids.push(id);
            }
        }
    }
    Ok(ids)
}

fn main() {
    let args = Args::parse();
    init_logger_with_level(if args.quiet { Level::WARN } else { Level::INFO });

    // Aggregation-only mode: reduce an existing raw log, never run trials.
    if args.summary {
        match aggregate::summarize(&args.log, &args.summary_out) {
            Ok(summary) => {
                info!(
                    "wrote {} summary row(s) to {}",
                    summary.len(),
                    args.summary_out.display()
                );
            }
            Err(RunError::MissingRawLog { path }) => {
                error!("no raw log at '{}'; nothing to aggregate", path.display());
                process::exit(2);
            }
            Err(err) => {
                error!("aggregation failed: {}", err);
                process::exit(1);
            }
        }
        return;
    }

    let problem_ids = match parse_problem_selection(&args) {
        Ok(ids) => ids,
        Err(message) => {
            error!("{}", message);
            process::exit(1);
        }
    };

    let plan = RunPlan {
        problem_ids,
        random_starts: args.starts,
        seed: args.seed,
        preset: args.preset.clone(),
        overrides: Overrides {
            tol: args.tol,
            max_iterations: args.max_iterations,
            ..Overrides::default()
        },
        log_path: args.log.clone(),
        resume: args.resume,
    };

    if let Err(err) = run(&plan) {
        error!("run aborted: {}", err.chain_compact());
        process::exit(1);
    }
}
