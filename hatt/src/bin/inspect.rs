//! hatt-inspect: decode a request dump written by `hatt -d N`.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use hatt_core::engine::pack::{hex_digest, unpack};

#[derive(Debug, Parser)]
#[command(name = "hatt-inspect", version, about = "Decode a hatt request dump")]
struct Cli {
    /// Dump file, e.g. hatt_request_3.dump.
    file: PathBuf,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let bytes =
        std::fs::read(&cli.file).with_context(|| format!("cannot read {}", cli.file.display()))?;
    let request =
        unpack(&bytes).with_context(|| format!("cannot decode {}", cli.file.display()))?;
    println!("{:#?}", request);
    println!("body sha256: {}", hex_digest(&request.body_sha256));
    Ok(())
}
