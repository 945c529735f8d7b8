use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use livestats::manager::Manager;
use std::path::PathBuf;

/// Stream a simulated sweep measurement and track its standard error live.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Directory holding `config.toml` and the `run-NNNN` directories.
    #[arg(long)]
    run_root: PathBuf,

    #[command(subcommand)]
    action: Action,
}

#[derive(Debug, Subcommand)]
enum Action {
    /// Start a new run and acquire its first file.
    Create,

    /// Acquire the next file of an existing run from its checkpoint.
    Resume {
        /// Index of the run to continue.
        #[arg(long)]
        run_idx: usize,
    },

    /// Compare every run's streamed estimate with the two-pass result.
    Analyze,

    /// Remove all run directories.
    Clean,
}

impl Action {
    fn execute(self, mgr: &Manager) -> Result<()> {
        match self {
            Action::Create => mgr.create_run(),
            Action::Resume { run_idx } => mgr
                .resume_run(run_idx)
                .with_context(|| format!("failed to resume run {run_idx}")),
            Action::Analyze => mgr.analyze_runs(),
            Action::Clean => mgr.clean_runs(),
        }
    }
}

fn main() {
    env_logger::Builder::new()
        .format_timestamp_millis()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    if let Err(error) = run_cli() {
        log::error!("{error:#?}");
        std::process::exit(1);
    }
}

fn run_cli() -> Result<()> {
    let Cli { run_root, action } = Cli::parse();
    log::info!("{action:?} in {run_root:?}");

    let mgr = Manager::new(&run_root)
        .with_context(|| format!("failed to open run root {run_root:?}"))?;

    action.execute(&mgr)
}
