// src/cli/mod.rs — CLI definition (clap derive)

pub mod run;
pub mod sessions;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "reelscout", about = "Autonomous content-discovery agent", version)]
pub struct Cli {
    /// Keyword to discover (default command when no subcommand given)
    #[arg(trailing_var_arg = true)]
    pub keyword: Vec<String>,

    /// Model to use
    #[arg(short, long)]
    pub model: Option<String>,

    /// Max model round-trips for this run
    #[arg(long)]
    pub max_iterations: Option<u32>,

    /// Suppress progress output (only emit final results)
    #[arg(long)]
    pub quiet: bool,

    /// Config file path
    #[arg(long)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List persisted sessions and their outcomes
    Sessions,
    /// Show master dataset statistics
    Master,
}
