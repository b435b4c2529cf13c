use std::{
    fs::File,
    io::{self, BufWriter, Write},
    path::PathBuf,
    time::Duration,
};

use anyhow::Context;
use clap::Parser;
use tracing::info;

use hhcrsp_grasp::{
    grasp::construction::CostModel,
    model::evaluation::LatenessScope,
    solver::solver::{solve_problem, SolverConfig},
    util::output::{write_solution, OutputFormat},
};

#[derive(Parser)]
#[command(author, version, about = "GRASP solver for home health care routing and scheduling", long_about = None)]
struct Cli {
    /// Instance file, labeled text format or `.json`
    #[arg(short = 'f', long = "file")]
    file: PathBuf,

    /// Where to write the best solution (default: standard output)
    #[arg(short = 'o', long = "output")]
    output: Option<PathBuf>,

    /// GRASP iterations; 0 runs until the time limit
    #[arg(short = 'x', long, default_value_t = 100)]
    iterations: usize,

    /// Fraction of the candidate list to draw from, in (0, 1]
    #[arg(short = 'a', long, default_value_t = 0.3, value_parser = parse_alpha)]
    alpha: f64,

    /// Neighbors generated per local search round
    #[arg(short = 'k', long, default_value_t = 10)]
    neighborhood_size: usize,

    /// Local search rounds per iteration
    #[arg(short = 'r', long, default_value_t = 20)]
    rounds: usize,

    #[arg(short = 't', long, default_value_t = 1)]
    threads: usize,

    /// Base seed; worker w uses seed + w
    #[arg(short = 's', long, default_value_t = 0)]
    seed: u64,

    /// Wall clock budget in seconds
    #[arg(long, value_parser = parse_seconds)]
    time_limit: Option<Duration>,

    #[arg(long, value_enum, default_value_t)]
    cost_model: CostModel,

    #[arg(long, value_enum, default_value_t)]
    lateness_scope: LatenessScope,

    #[arg(long, value_enum, default_value_t)]
    format: OutputFormat,

    #[arg(short, long)]
    verbose: bool,

    /// Hide the progress bar
    #[arg(short, long)]
    quiet: bool,
}

fn parse_alpha(value: &str) -> Result<f64, String> {
    let alpha: f64 = value.parse().map_err(|_| format!("`{value}` is not a number"))?;
    if alpha > 0.0 && alpha <= 1.0 {
        Ok(alpha)
    } else {
        Err(format!("alpha must lie in (0, 1], got {alpha}"))
    }
}

fn parse_seconds(value: &str) -> Result<Duration, String> {
    let seconds: f64 = value.parse().map_err(|_| format!("`{value}` is not a number"))?;
    Duration::try_from_secs_f64(seconds).map_err(|e| format!("invalid duration `{value}`: {e}"))
}

fn main() -> Result<(), anyhow::Error> {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_max_level(if cli.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        })
        .init();

    let config = SolverConfig {
        problem_instance_location: cli.file.display().to_string(),
        iterations: cli.iterations,
        alpha: cli.alpha,
        neighborhood_size: cli.neighborhood_size,
        local_search_rounds: cli.rounds,
        nbr_threads: cli.threads,
        seed: cli.seed,
        time_limit: cli.time_limit,
        cost_model: cli.cost_model,
        lateness_scope: cli.lateness_scope,
        show_progress: !cli.quiet,
    };

    let result = solve_problem(&config)
        .with_context(|| format!("failed to solve {}", cli.file.display()))?;

    match &cli.output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            let mut out = BufWriter::new(file);
            write_solution(&mut out, &result, &config, cli.format)?;
            out.flush()?;
            info!("solution written to {}", path.display());
        }
        None => {
            let mut out = io::stdout().lock();
            write_solution(&mut out, &result, &config, cli.format)?;
        }
    }

    Ok(())
}
