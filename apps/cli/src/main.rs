//! Pressline CLI: scheduled article pipeline.
//!
//! Pulls candidates from a feed, rewrites them, generates covers and
//! publishes them, reporting each run through notifications.

mod commands;
mod schedule;

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
