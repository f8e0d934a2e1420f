//! CLI error handling with user-friendly messages.
//!
//! Centralizes error handling for the CLI, providing consistent formatting
//! and exit codes.

use std::fmt;
use std::process;

use mapsampler::collector::CollectorError;
use mapsampler::config::ConfigFileError;

/// CLI-specific errors with user-friendly messages.
#[derive(Debug)]
pub enum CliError {
    /// Failed to initialize logging
    LoggingInit(String),
    /// Invalid configuration or arguments
    Config(String),
    /// Failed to load or save config.ini
    ConfigFile(ConfigFileError),
    /// Failed to start the async runtime
    Runtime(std::io::Error),
    /// The collection run failed
    Collect(CollectorError),
}

impl CliError {
    /// Exit the process with an error message and code.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);

        match self {
            CliError::ConfigFile(ConfigFileError::InvalidValue { .. }) => {
                eprintln!();
                eprintln!("Fix the value in the config file or run 'mapsampler config init --force'");
                eprintln!("to write a fresh file with defaults.");
            }
            CliError::Collect(CollectorError::InvalidInput(_)) => {
                eprintln!();
                eprintln!("--input expects a .json entity file or a directory of them.");
            }
            CliError::Collect(CollectorError::NoSources) => {
                eprintln!();
                eprintln!("Add 'source = kind:url' lines to the [imagery] section of config.ini");
                eprintln!("or pass --source, e.g. --source 'tms:https://tile.example.com/{{z}}/{{x}}/{{y}}.png'");
            }
            _ => {}
        }

        process::exit(1)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::LoggingInit(msg) => write!(f, "Failed to initialize logging: {}", msg),
            CliError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CliError::ConfigFile(e) => write!(f, "{}", e),
            CliError::Runtime(e) => write!(f, "Failed to start runtime: {}", e),
            CliError::Collect(e) => write!(f, "Collection failed: {}", e),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::ConfigFile(e) => Some(e),
            CliError::Runtime(e) => Some(e),
            CliError::Collect(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConfigFileError> for CliError {
    fn from(e: ConfigFileError) -> Self {
        CliError::ConfigFile(e)
    }
}

impl From<CollectorError> for CliError {
    fn from(e: CollectorError) -> Self {
        CliError::Collect(e)
    }
}
