//! CLI runner for common setup.
//!
//! Loads the config file and initializes logging once per command.

use tracing::info;

use mapsampler::config::ConfigFile;
use mapsampler::logging::{default_log_dir, default_log_file, init_logging, LoggingGuard};

use crate::error::CliError;

/// Runner that manages the CLI lifecycle.
pub struct CliRunner {
    /// Keeps logging active while the runner exists
    _logging_guard: LoggingGuard,
    config: ConfigFile,
}

impl CliRunner {
    /// Loads ~/.mapsampler/config.ini and starts logging.
    pub fn new(verbose: bool) -> Result<Self, CliError> {
        let config = ConfigFile::load()?;

        let logging_guard = init_logging(&default_log_dir(), default_log_file(), verbose)
            .map_err(|e| CliError::LoggingInit(e.to_string()))?;

        Ok(Self {
            _logging_guard: logging_guard,
            config,
        })
    }

    pub fn config(&self) -> &ConfigFile {
        &self.config
    }

    /// Log startup information for a command.
    pub fn log_startup(&self, command: &str) {
        info!("MapSampler v{}", mapsampler::VERSION);
        info!("MapSampler CLI: {} command", command);
    }
}
