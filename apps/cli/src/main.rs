//! ModuleMap CLI — extract modules and submodules from documentation websites.
//!
//! Crawls documentation URLs one level deep, recovers page structure, and
//! synthesizes a module/submodule breakdown with a completion model.

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
