//! regular — entry point.
//!
//! Tracing logs go to stderr; stdout carries only the CLI's own output
//! (plain text or, with `-j`/`--jsonl`, one JSON object per line).

use clap::Parser;
use tracing_subscriber::EnvFilter;

use regular::cli::Cli;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .init();

    regular::cli::run(cli)
}
