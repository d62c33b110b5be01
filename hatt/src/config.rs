//! Command line and environment configuration for the `hatt` driver.

use std::path::PathBuf;

use clap::Parser;
use hatt_core::RunOptions;

/// Env override for the read buffer capacity in bytes.
pub const ENV_READ_BUFFER_SIZE: &str = "HATT_READ_BUFFER_SIZE";
/// Env override for the window (max bytes per feed).
pub const ENV_WINDOW_SIZE: &str = "HATT_WINDOW_SIZE";
/// Log filter, `EnvFilter` syntax.
pub const ENV_LOG: &str = "HATT_LOG";

/// Replay a captured HTTP byte stream from stdin through a rule file.
#[derive(Debug, Parser)]
#[command(name = "hatt", version, about)]
pub struct Cli {
    /// Rule file (TOML).
    #[arg(short = 'u', long = "rules", value_name = "FILE")]
    pub rules: PathBuf,

    /// Print every feed and completion, not only denials.
    #[arg(short, long)]
    pub verbose: bool,

    /// Ordinal of the request to dump to hatt_request_<n>.dump; 0 means none.
    #[arg(short, long, value_name = "N", default_value_t = 0)]
    pub dump: u64,
}

impl Cli {
    /// Defaults, then environment overrides, then flags.
    pub fn run_options(&self) -> RunOptions {
        let mut opts = from_env(|key| std::env::var(key).ok());
        opts.dump = self.dump;
        opts
    }
}

/// Build options from defaults and the env lookup. Unparseable values are ignored.
pub fn from_env<F>(lookup: F) -> RunOptions
where
    F: Fn(&str) -> Option<String>,
{
    let mut opts = RunOptions::default();
    if let Some(n) = lookup(ENV_READ_BUFFER_SIZE).and_then(|s| s.trim().parse::<usize>().ok()) {
        opts.read_buffer_size = n;
    }
    if let Some(n) = lookup(ENV_WINDOW_SIZE).and_then(|s| s.trim().parse::<usize>().ok()) {
        opts.window_size = n;
    }
    opts
}
