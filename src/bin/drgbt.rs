//! Run the DRGBT controller on a moving-obstacle scenario
//!
//! ```bash
//! drgbt --config data/drgbt.yaml --scenario data/planar_crossing.yaml --output drgbt.log
//! ```
//!
//! Without `--scenario` the built-in planar crossing scenario is used.
//! Log verbosity follows `RUST_LOG` (default `info`).

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use rust_replanning::environment::ScenarioConfig;
use rust_replanning::{DrgbtConfig, DrgbtPlanner, RoboticsResult};

#[derive(Parser, Debug)]
#[command(name = "drgbt")]
#[command(about = "Reactive motion replanning among moving obstacles")]
struct Args {
    /// Planner configuration (YAML); defaults are used when omitted
    #[arg(long)]
    config: Option<PathBuf>,

    /// Scenario description (YAML)
    #[arg(long)]
    scenario: Option<PathBuf>,

    /// Trace file to write after the run
    #[arg(long)]
    output: Option<PathBuf>,

    /// Append to the trace file instead of overwriting it
    #[arg(long)]
    append: bool,

    /// Leave the realized path out of the trace
    #[arg(long)]
    no_path: bool,

    /// Seed overriding the configuration
    #[arg(long)]
    seed: Option<u64>,
}

fn run(args: &Args) -> RoboticsResult<bool> {
    let mut config = match &args.config {
        Some(path) => DrgbtConfig::from_yaml_file(path)?,
        None => DrgbtConfig::default(),
    };
    if args.seed.is_some() {
        config.seed = args.seed;
    }
    let scenario = match &args.scenario {
        Some(path) => ScenarioConfig::from_yaml_file(path)?,
        None => ScenarioConfig::planar_crossing(),
    };

    let (space, start, goal) = scenario.build()?;
    let mut planner = DrgbtPlanner::new(space, start, goal, config)?;
    let termination = planner.solve();

    let info = planner.planner_info();
    info!(
        ?termination,
        iterations = info.num_iterations(),
        replans = info.num_replans(),
        path_length = planner.realized_path().total_length(),
        "run complete"
    );

    if let Some(output) = &args.output {
        planner.output_planner_data(output, !args.no_path, args.append)?;
    }
    Ok(termination.is_success())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    match run(&args) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            error!("{}", e);
            ExitCode::from(2)
        }
    }
}
