//! spike-pipeline command line entry point
//!
//! Usage: `spike-pipeline <run.toml|run.json>`
//!
//! Detects peaks on the configured binary recording, runs the configured
//! peak pipeline and writes the outputs to the run's output folder.

use anyhow::{bail, Context};
use spike_pipeline::{config::RunConfig, runner};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,spike_pipeline=debug")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut args = std::env::args().skip(1);
    let Some(config_path) = args.next() else {
        bail!("usage: spike-pipeline <run.toml|run.json>");
    };
    if args.next().is_some() {
        bail!("expected a single run file argument");
    }

    tracing::info!("Starting spike-pipeline with {}", config_path);
    let config = RunConfig::load(&config_path)
        .with_context(|| format!("could not load run file {}", config_path))?;

    let summary = runner::run(&config)?;
    for output in &summary.manifest.outputs {
        tracing::info!("  {} {:?} -> {}", output.name, output.shape, output.file);
    }

    Ok(())
}
