mod commands;
mod summary;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "tilestitch", about = "Tile stitching for multi-view microscopy")]
#[command(version)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the views and attributes of a dataset manifest
    Info(commands::info::InfoArgs),
    /// List the pairs a stitching run would register
    Pairs(commands::pairs::PairsArgs),
    /// Register overlapping views and write the optimized translations
    Stitch(commands::stitch::StitchArgs),
    /// Print a default stitching config
    Config(commands::config::ConfigArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match &cli.command {
        Commands::Info(args) => commands::info::run(args),
        Commands::Pairs(args) => commands::pairs::run(args),
        Commands::Stitch(args) => commands::stitch::run(args),
        Commands::Config(args) => commands::config::run(args),
    }
}
