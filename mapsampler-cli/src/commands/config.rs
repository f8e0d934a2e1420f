//! Configuration CLI commands.
//!
//! `config show` prints the effective settings as config.ini text,
//! `config path` the file location and `config init` writes the defaults.

use clap::Subcommand;
use mapsampler::config::{config_file_path, ConfigFile};

use crate::error::CliError;

/// Config subcommands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Print the effective configuration (file values over defaults)
    Show,

    /// Show the configuration file path
    Path,

    /// Write a config file with default values
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

/// Run a config subcommand.
pub fn run(command: ConfigCommands) -> Result<(), CliError> {
    match command {
        ConfigCommands::Show => run_show(),
        ConfigCommands::Path => run_path(),
        ConfigCommands::Init { force } => run_init(force),
    }
}

fn run_show() -> Result<(), CliError> {
    let path = config_file_path();
    let config = ConfigFile::load()?;

    if path.exists() {
        println!("; Loaded from {}", path.display());
    } else {
        println!("; {} not found, showing defaults", path.display());
    }
    println!();
    print!("{}", config.to_ini_string());
    Ok(())
}

fn run_path() -> Result<(), CliError> {
    println!("{}", config_file_path().display());
    Ok(())
}

fn run_init(force: bool) -> Result<(), CliError> {
    let path = config_file_path();

    if force {
        ConfigFile::default().save_to(&path)?;
        println!("Wrote default configuration to {}", path.display());
    } else if path.exists() {
        println!("Configuration already exists at {}", path.display());
        println!("Use --force to overwrite it with defaults.");
    } else {
        let path = ConfigFile::ensure_exists()?;
        println!("Created {}", path.display());
    }
    Ok(())
}
