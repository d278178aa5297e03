//! gh-deplink CLI binary.

mod cli;
mod context;
mod output;

use anyhow::Result;
use cli::Cli;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Main entry point for the gh-deplink CLI.
///
/// Uses tokio's current_thread runtime; concurrent requests within one
/// operation are interleaved on a single thread.
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse_args();

    // Logs go to stderr so stdout stays clean for --json.
    // RUST_LOG takes precedence, e.g. RUST_LOG=deplink=trace gh deplink list 1
    let default_filter = if cli.verbose {
        "deplink=debug,gh_deplink=debug"
    } else {
        "deplink=warn,gh_deplink=warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    tracing::debug!("Starting gh-deplink");

    let status = cli.execute().await?;

    tracing::debug!(?status, "gh-deplink finished");
    Ok(status.into())
}
