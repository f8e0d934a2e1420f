//! MapSampler CLI - Command-line interface
//!
//! Collects labeled imagery samples, inspects tile ranges and manages the
//! config file.

mod commands;
mod error;
mod runner;

use clap::{Parser, Subcommand};

use commands::collect::CollectArgs;
use commands::config::ConfigCommands;
use commands::tiles::TilesArgs;

#[derive(Parser)]
#[command(name = "mapsampler")]
#[command(version = mapsampler::VERSION)]
#[command(about = "Collect labeled map-imagery samples for machine learning", long_about = None)]
struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch imagery for every entity in the input and write a CSV manifest
    Collect(CollectArgs),

    /// Print the tile range covering a bounding box
    Tiles(TilesArgs),

    /// Show or initialize the configuration file
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Collect(args) => commands::collect::run(args, cli.verbose),
        Commands::Tiles(args) => commands::tiles::run(args),
        Commands::Config { command } => {
            commands::config::run(command.unwrap_or(ConfigCommands::Show))
        }
    };

    if let Err(e) = result {
        e.exit();
    }
}
