//! CLI definitions using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// nvkit - locate and validate a CUDA toolkit
#[derive(Parser)]
#[command(name = "nvkit")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Resolve the toolkit and report whether it is functional
    Status(StatusArgs),

    /// Show the located toolkit files
    Paths,

    /// Show supported device capabilities and PTX ISA versions
    Compat,

    /// List packaged bundles from the bundle manifest
    Bundles(BundlesArgs),
}

#[derive(Args)]
pub struct StatusArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args)]
pub struct BundlesArgs {
    /// Bundle manifest to read instead of the configured one
    #[arg(long, value_name = "PATH")]
    pub manifest: Option<PathBuf>,
}
