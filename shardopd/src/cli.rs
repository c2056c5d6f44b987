use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "shardopd", version, about = "ShardSet operator daemon CLI")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the operator with config file
    Start {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Apply a ShardCluster manifest into the registry
    Apply {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        file: PathBuf,
    },
}
