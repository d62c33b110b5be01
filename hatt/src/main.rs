//! hatt: feed stdin through the rule engine one HTTP request at a time.
//!
//! ```text
//! hatt -u rules.toml [-v] [-d N] < capture.raw
//! ```

mod config;

use std::io;

use anyhow::Context;
use clap::Parser;
use hatt_core::{replay, ConsoleReporter, RuleEngine};
use tracing::info;
use tracing_subscriber::EnvFilter;

use config::{Cli, ENV_LOG};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_env(ENV_LOG).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    let engine = RuleEngine::load(&cli.rules)
        .with_context(|| format!("cannot initialize engine from {}", cli.rules.display()))?;
    let options = cli.run_options();

    let stdin = io::stdin();
    let stdout = io::stdout();
    let mut reporter = ConsoleReporter::new(stdout.lock(), cli.verbose);
    let summary = replay(&mut stdin.lock(), &engine, &options, &mut reporter)
        .context("replay failed")?;

    info!(
        reads = summary.reads,
        bytes = summary.bytes,
        feeds = summary.feeds,
        completed = summary.completed,
        trailing = summary.trailing_bytes,
        "stream consumed"
    );
    Ok(())
}
