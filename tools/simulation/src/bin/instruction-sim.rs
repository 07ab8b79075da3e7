//! instruction-sim entry point
//!
//! Runs scenario files against an in-memory ledger, checks replay
//! determinism, and generates paired-transfer workloads.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use instruction::ChaincodeConfig;
use simulation::export::{build_export, export_json, write_to_file};
use simulation::replay::verify_replay;
use simulation::scenario::{paired_transfers, WorkloadConfig};
use simulation::{RunnerConfig, Scenario, ScenarioRunner};

/// Instruction chaincode simulator
#[derive(Parser, Debug)]
#[command(name = "instruction-sim", version = simulation::VERSION, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Chaincode configuration JSON, replacing the scenario's own.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a scenario and print its metrics.
    Run(RunArgs),

    /// Run a scenario twice and compare the resulting ledgers.
    Replay(RunArgs),

    /// Write a generated paired-transfer scenario.
    Generate(GenerateArgs),
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Scenario JSON file.
    scenario: PathBuf,

    /// Write the JSON report here.
    #[arg(long)]
    out: Option<PathBuf>,

    /// Transaction id prefix.
    #[arg(long, default_value = "tx")]
    tx_prefix: String,

    /// Timestamp of the clock before the first transaction.
    #[arg(long, default_value_t = 0)]
    start: i64,

    /// Clock increment per transaction.
    #[arg(long, default_value_t = 1)]
    step: i64,

    /// Stop at the first step with an unexpected status.
    #[arg(long)]
    fail_fast: bool,
}

#[derive(Args, Debug)]
struct GenerateArgs {
    /// Number of transfers, each instructed by both sides.
    #[arg(long, default_value_t = 100)]
    pairs: usize,

    /// Lots per transfer.
    #[arg(long, default_value_t = 10)]
    quantity: u64,

    /// Lots seeded in the delivering account.
    #[arg(long, default_value_t = 1_000_000)]
    opening: u64,

    /// Make every n-th receiver half disagree on quantity.
    #[arg(long)]
    mismatch_every: Option<usize>,

    /// Make every n-th transfer DVP.
    #[arg(long)]
    dvp_every: Option<usize>,

    /// Output file; stdout when absent.
    #[arg(long)]
    out: Option<PathBuf>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let result = match &cli.command {
        Commands::Run(args) => run(args, cli.config.as_deref()),
        Commands::Replay(args) => replay(args, cli.config.as_deref()),
        Commands::Generate(args) => generate(args),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::from(1)
        }
    }
}

fn runner(args: &RunArgs, config: Option<&Path>) -> anyhow::Result<ScenarioRunner> {
    let runner = ScenarioRunner::new(RunnerConfig {
        tx_prefix: args.tx_prefix.clone(),
        start_timestamp: args.start,
        timestamp_step: args.step,
        fail_fast: args.fail_fast,
    });
    match config {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("reading chaincode config {}", path.display()))?;
            let config = ChaincodeConfig::from_json(&json).context("parsing chaincode config")?;
            Ok(runner.with_chaincode_config(config))
        }
        None => Ok(runner),
    }
}

fn run(args: &RunArgs, config: Option<&Path>) -> anyhow::Result<u8> {
    let scenario = Scenario::load(&args.scenario)?;
    let report = runner(args, config)?.run(&scenario)?;

    println!("{}", report.metrics.summary());
    println!("State hash: {}", report.state_hash);
    for failure in report.failures() {
        println!(
            "step {} ({}) returned {}, expected {}",
            failure.index,
            failure.function,
            failure.status,
            failure.expected.unwrap_or_default()
        );
    }

    if let Some(out) = &args.out {
        write_to_file(&build_export(&report, None), out)
            .with_context(|| format!("writing report {}", out.display()))?;
    }
    Ok(if report.all_passed() { 0 } else { 2 })
}

fn replay(args: &RunArgs, config: Option<&Path>) -> anyhow::Result<u8> {
    let scenario = Scenario::load(&args.scenario)?;
    let runner = runner(args, config)?;
    let report = runner.run(&scenario)?;
    let validation = verify_replay(&runner, &scenario)?;

    if validation.matches {
        println!("Replay matches: {}", validation.original.state_hash);
    } else {
        println!(
            "Replay diverged: {} != {}",
            validation.original.state_hash, validation.replayed.state_hash
        );
    }

    let matches = validation.matches;
    let export = build_export(&report, Some(validation));
    match &args.out {
        Some(out) => write_to_file(&export, out).with_context(|| format!("writing report {}", out.display()))?,
        None => tracing::debug!("{}", export_json(&export)?),
    }
    Ok(if matches { 0 } else { 3 })
}

fn generate(args: &GenerateArgs) -> anyhow::Result<u8> {
    let scenario = paired_transfers(&WorkloadConfig {
        pairs: args.pairs,
        quantity: args.quantity,
        opening: args.opening,
        mismatch_every: args.mismatch_every,
        dvp_every: args.dvp_every,
    });
    let json = scenario.to_json()?;
    match &args.out {
        Some(out) => std::fs::write(out, json).with_context(|| format!("writing scenario {}", out.display()))?,
        None => println!("{}", json),
    }
    Ok(0)
}
