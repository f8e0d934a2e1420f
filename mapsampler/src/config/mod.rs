//! Configuration for MapSampler.
//!
//! - [`ConfigFile`]: the user's `~/.mapsampler/config.ini`
//! - [`CollectorConfig`]: the settings one collection run uses, built from the
//!   file and overridden by command line flags
//!
//! ```
//! use mapsampler::config::{CollectorConfig, ConfigFile};
//!
//! let file = ConfigFile::default();
//! let config = CollectorConfig::from_config_file(&file)
//!     .with_zoom(17)
//!     .with_clear_output(false);
//! assert_eq!(config.zoom, 17);
//! ```

mod collector;
mod defaults;
mod file;
mod parser;
mod settings;
mod writer;

pub use collector::CollectorConfig;
pub use defaults::*;
pub use file::{config_directory, config_file_path, ConfigFileError};
pub use settings::{CacheSettings, CollectorSettings, ConfigFile, DownloadSettings, ImagerySettings};
