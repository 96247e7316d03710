//! Dossier CLI: investigate a name across public platforms.
//!
//! Generates candidate usernames and emails from a name, probes them against
//! the platform catalog under a time budget and prints a confidence-scored
//! report.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
