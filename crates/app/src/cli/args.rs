use clap::Parser;

use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "escrow")]
#[command(about = "Threshold key escrow across a pool of agents")]
pub struct Args {
    /// Path to the escrow config directory (defaults to ~/.escrow)
    #[arg(long, global = true)]
    pub config_path: Option<PathBuf>,

    #[command(subcommand)]
    pub command: crate::Command,
}
