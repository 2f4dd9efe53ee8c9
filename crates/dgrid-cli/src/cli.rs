use clap::{ArgGroup, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "dgrid", author, version, about = "Distribution grid topology tooling", long_about = None)]
pub struct Cli {
    /// Enable debug logging
    #[arg(long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print topology and per-grid statistics
    Stats {
        /// Directory of grid CSV tables
        grid_dir: PathBuf,
    },
    /// Run integrity diagnostics over a grid directory
    Check {
        /// Directory of grid CSV tables
        grid_dir: PathBuf,
        /// Emit diagnostics as JSON
        #[arg(long)]
        json: bool,
    },
    /// Toggle a switch disconnector and write the topology back
    #[command(group(ArgGroup::new("action").required(true).args(["open", "close"])))]
    Switch {
        /// Directory of grid CSV tables
        grid_dir: PathBuf,
        /// Switch identifier
        #[arg(long)]
        id: String,
        /// Open the switch
        #[arg(long)]
        open: bool,
        /// Close the switch
        #[arg(long)]
        close: bool,
        /// Output directory (defaults to the input directory)
        #[arg(long)]
        out: Option<PathBuf>,
    },
}
