mod error;
mod models;
mod run;
mod scenario;

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::error::AppResult;
use crate::scenario::OutputFormat;

#[derive(Parser)]
#[command(name = "ms-cli")]
#[command(about = "ModSim CLI - real-time electric machine simulation", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check a scenario file and print its configuration
    Validate {
        /// Path to the scenario YAML (or .json) file
        scenario_path: PathBuf,
    },
    /// Run a scenario and print the state trajectory
    Run {
        /// Path to the scenario YAML (or .json) file
        scenario_path: PathBuf,
        /// Number of steps (batch mode)
        #[arg(long)]
        steps: Option<u64>,
        /// Pace steps against the wall clock
        #[arg(long)]
        realtime: bool,
        /// Simulated duration in seconds (real-time mode)
        #[arg(long)]
        duration: Option<f64>,
        /// Print every N-th step
        #[arg(long)]
        print_every: Option<u64>,
        /// Output format
        #[arg(long, value_enum)]
        format: Option<FormatArg>,
        /// Override the supply voltage
        #[arg(long)]
        voltage: Option<f64>,
        /// Override the load torque
        #[arg(long)]
        load_torque: Option<f64>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum FormatArg {
    Table,
    Json,
}

impl From<FormatArg> for OutputFormat {
    fn from(f: FormatArg) -> Self {
        match f {
            FormatArg::Table => OutputFormat::Table,
            FormatArg::Json => OutputFormat::Json,
        }
    }
}

fn main() -> AppResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Validate { scenario_path } => cmd_validate(&scenario_path),
        Commands::Run {
            scenario_path,
            steps,
            realtime,
            duration,
            print_every,
            format,
            voltage,
            load_torque,
        } => {
            let mut scenario = scenario::load(&scenario_path)?;
            if let Some(steps) = steps {
                scenario.run.steps = steps;
            }
            if realtime {
                scenario.run.realtime = true;
            }
            if duration.is_some() {
                scenario.run.duration_s = duration;
            }
            if let Some(n) = print_every {
                scenario.run.print_every = n;
            }
            if let Some(f) = format {
                scenario.run.format = f.into();
            }
            if let Some(v) = voltage {
                scenario.inputs.voltage = v;
            }
            if let Some(tl) = load_torque {
                scenario.inputs.load_torque = tl;
            }
            scenario.validate()?;
            cmd_run(&scenario)
        }
    }
}

fn cmd_validate(scenario_path: &Path) -> AppResult<()> {
    println!("Validating scenario: {}", scenario_path.display());
    let scenario = scenario::load(scenario_path)?;
    println!("✓ Scenario '{}' is valid", scenario.name);
    println!("  model:        {}", scenario.model.kind());
    println!("  states:       {:?}", scenario.model.state_names());
    println!("  cont_states:  {}", scenario.model.cont_states());
    println!(
        "  step:         {} ms wall clock, {} s simulated",
        scenario.sim.delta_t_ms,
        scenario.sim.delta_t()
    );
    for (label, value) in scenario.model.characteristics(&scenario.inputs) {
        println!("  {label}: {value:.4}");
    }
    Ok(())
}

fn cmd_run(scenario: &scenario::Scenario) -> AppResult<()> {
    info!(
        scenario = %scenario.name,
        model = scenario.model.kind(),
        realtime = scenario.run.realtime,
        "starting run"
    );
    let summary = run::run(scenario)?;
    info!(
        steps = summary.steps,
        t = summary.t,
        x = ?summary.x,
        "run complete"
    );
    Ok(())
}
