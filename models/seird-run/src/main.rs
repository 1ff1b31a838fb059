pub mod environment;
pub mod logging;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use log::{LevelFilter, info};

use environment::RunEnvironment;

/// Runs the SEIRD model on a Model Run Protocol document.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Run document (.json or .toml). Read as JSON from stdin when omitted.
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Write outputs here instead of where the document says.
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    #[arg(long, default_value = "warn")]
    log_level: LevelFilter,
}

fn main() -> ExitCode {
    match run(Args::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", error_line(&e));
            ExitCode::FAILURE
        }
    }
}

/// The whole context chain on a single line.
fn error_line(e: &anyhow::Error) -> String {
    format!("Error: {e:#}")
}

fn run(args: Args) -> anyhow::Result<()> {
    logging::init(args.log_level)?;

    let mut env = match &args.input {
        Some(path) => RunEnvironment::from_path(path)
            .with_context(|| format!("failed to read {}", path.display()))?,
        None => RunEnvironment::from_stdin().context("failed to read run document")?,
    };
    if let Some(dir) = args.output_dir {
        env = env.with_output_dir(dir);
    }

    let output = env.run().context("model run failed")?;

    let summary = output.summary;
    info!(
        "peak infected: {} (day {}), total deaths: {}",
        summary.peak_infected, summary.peak_day, summary.total_deaths
    );
    info!(
        "solver: {} accepted steps, {} rejected, {} evaluations",
        output.stats.accepted_steps, output.stats.rejected_steps, output.stats.function_evaluations
    );
    if let Some(dir) = env.output_dir() {
        info!("outputs written to {}", dir.display());
    }
    Ok(())
}
