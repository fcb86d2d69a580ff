//! Beam Planning CLI
//!
//! Builds a beam plan for a scenario, or checks an existing solution against it.
//!
//! Usage:
//!   beam-planner plan scenarios/00_example.txt --trials 20 --output solution.txt
//!   beam-planner evaluate scenarios/00_example.txt solution.txt
//!   beam-planner plan scenarios/00_example.txt | beam-planner evaluate scenarios/00_example.txt

use anyhow::{Context, Result};
use beam_planner::constraints::evaluate;
use beam_planner::optimizer::{PlanningOptimizer, DEFAULT_TRIALS};
use beam_planner::report::PlanReport;
use beam_planner::{io, PlannerConfig};
use clap::{Args, Parser, Subcommand};
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(
    name = "beam-planner",
    about = "Assign satellite beams to users under interference and visibility constraints"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build a solution for a scenario
    Plan(PlanArgs),
    /// Check a solution against a scenario
    Evaluate(EvaluateArgs),
}

#[derive(Args, Debug)]
struct PlanArgs {
    /// Scenario file
    scenario: PathBuf,

    /// Also write the solution to this file
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Write a JSON run report
    #[arg(short, long)]
    report: Option<PathBuf>,

    /// Number of shuffled planning trials
    #[arg(short, long, default_value_t = DEFAULT_TRIALS)]
    trials: usize,

    /// Seed for the trial shuffles
    #[arg(short, long)]
    seed: Option<u64>,

    /// JSON planner configuration
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct EvaluateArgs {
    /// Scenario file
    scenario: PathBuf,

    /// Solution file; stdin when omitted
    solution: Option<PathBuf>,

    /// JSON planner configuration
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn load_config(path: Option<&PathBuf>) -> Result<PlannerConfig> {
    match path {
        Some(path) => PlannerConfig::from_json_file(path)
            .with_context(|| format!("loading config {:?}", path)),
        None => Ok(PlannerConfig::default()),
    }
}

fn plan(args: PlanArgs) -> Result<ExitCode> {
    let config = load_config(args.config.as_ref())?;
    let scenario = io::load_scenario(&args.scenario)
        .with_context(|| format!("reading scenario {:?}", args.scenario))?;

    let mut optimizer = PlanningOptimizer::new(config.clone()).with_trials(args.trials);
    if let Some(seed) = args.seed {
        optimizer = optimizer.with_seed(seed);
    }
    let result = optimizer.run(&scenario);

    io::write_solution(std::io::stdout().lock(), &result.best.solution)?;

    if let Some(path) = &args.output {
        info!("Writing solution to {:?}", path);
        let file = File::create(path).with_context(|| format!("creating {:?}", path))?;
        io::write_solution(BufWriter::new(file), &result.best.solution)?;
    }

    if let Some(path) = &args.report {
        PlanReport::new(&scenario, &result, &config).write_json(path)?;
    }

    info!(
        "{:.2}% of {} total users covered",
        result.best.coverage_rate * 100.0,
        scenario.users.len()
    );

    Ok(ExitCode::SUCCESS)
}

fn evaluate_solution(args: EvaluateArgs) -> Result<ExitCode> {
    let config = load_config(args.config.as_ref())?;
    let scenario = io::load_scenario(&args.scenario)
        .with_context(|| format!("reading scenario {:?}", args.scenario))?;

    let solution = match &args.solution {
        Some(path) => io::load_solution(path, &scenario, &config)
            .with_context(|| format!("reading solution {:?}", path))?,
        None => {
            info!("Reading solution from stdin");
            io::read_solution(std::io::stdin().lock(), &scenario, &config)
                .context("reading solution from stdin")?
        }
    };

    info!(
        "{:.2}% of {} total users covered",
        solution.coverage_rate(&scenario) * 100.0,
        scenario.users.len()
    );

    match evaluate(&scenario, &solution, &config.limits) {
        Ok(()) => {
            println!("Solution passed all checks!");
            Ok(ExitCode::SUCCESS)
        }
        Err(violation) => {
            error!("{}", violation);
            println!("Solution rejected: {}", violation);
            Ok(ExitCode::FAILURE)
        }
    }
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // Logs go to stderr so stdout carries only the solution
    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Command::Plan(args) => plan(args),
        Command::Evaluate(args) => evaluate_solution(args),
    }
}
