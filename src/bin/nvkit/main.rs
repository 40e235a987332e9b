//! nvkit CLI - inspect CUDA toolkit resolution

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;

use cli::{Cli, Commands};

fn main() {
    if let Err(e) = run() {
        eprintln!("error: {:#}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    let filter = if cli.verbose {
        EnvFilter::new("nvkit=debug")
    } else {
        EnvFilter::new("nvkit=info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Status(args) => commands::status::execute(args, cli.verbose),
        Commands::Paths => commands::paths::execute(),
        Commands::Compat => commands::compat::execute(),
        Commands::Bundles(args) => commands::bundles::execute(args),
    }
}
