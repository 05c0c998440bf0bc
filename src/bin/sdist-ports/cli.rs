//! CLI definitions using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// sdist-ports - turn upstream releases into normalized source distributions
#[derive(Parser)]
#[command(name = "sdist-ports")]
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
    /// List every package version that can be prepared
    List(ListArgs),

    /// Fetch and prepare source distributions
    Prepare(PrepareArgs),
}

#[derive(Args)]
pub struct ListArgs {
    /// Only list packages whose name contains this string
    #[arg(long)]
    pub name: Option<String>,
}

#[derive(Args)]
pub struct PrepareArgs {
    /// Directory to write prepared sdists into
    #[arg(long, short)]
    pub out: PathBuf,

    /// Only prepare packages whose name contains this string
    #[arg(long)]
    pub name: Option<String>,

    /// Only prepare this exact version
    #[arg(long)]
    pub version: Option<String>,

    /// Maximum number of concurrent filesystem operations
    #[arg(short, long, env = "SDIST_PORTS_JOBS")]
    pub jobs: Option<usize>,
}
