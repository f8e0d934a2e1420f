//! Settings structs for each `[section]` of config.ini.

use std::path::PathBuf;

use tracing::warn;

use super::defaults::*;
use crate::provider::TileSource;

/// Complete configuration loaded from config.ini.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigFile {
    pub collector: CollectorSettings,
    pub download: DownloadSettings,
    pub cache: CacheSettings,
    pub imagery: ImagerySettings,
}

/// Sample geometry and output settings.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectorSettings {
    pub grow_factor: f64,
    pub min_bbox_meters: f64,
    pub zoom: u8,
    pub max_output_dimension: u32,
    /// Wipe the output folder before each run
    pub clear_output: bool,
    pub entity_parallelism: usize,
    /// Crop stitched tiles to the sample box
    pub clip_and_center: bool,
}

impl Default for CollectorSettings {
    fn default() -> Self {
        Self {
            grow_factor: DEFAULT_GROW_FACTOR,
            min_bbox_meters: DEFAULT_MIN_BBOX_METERS,
            zoom: DEFAULT_ZOOM,
            max_output_dimension: DEFAULT_MAX_OUTPUT_DIMENSION,
            clear_output: true,
            entity_parallelism: DEFAULT_ENTITY_PARALLELISM,
            clip_and_center: true,
        }
    }
}

/// Tile download settings.
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadSettings {
    /// HTTP timeout in seconds
    pub timeout: u64,
    pub max_retries: u32,
    /// Concurrent fetch attempts
    pub workers: usize,
}

impl Default for DownloadSettings {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_HTTP_TIMEOUT_SECS,
            max_retries: DEFAULT_MAX_RETRIES,
            workers: DEFAULT_WORKER_POOL_SIZE,
        }
    }
}

/// Tile cache settings.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheSettings {
    /// In-memory entries
    pub capacity: usize,
    pub disk_enabled: bool,
    pub directory: PathBuf,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CACHE_CAPACITY,
            disk_enabled: false,
            directory: default_disk_cache_dir(),
        }
    }
}

/// Imagery layers, in sampling order.
#[derive(Debug, Clone, PartialEq)]
pub struct ImagerySettings {
    pub sources: Vec<TileSource>,
}

impl Default for ImagerySettings {
    fn default() -> Self {
        let sources = match DEFAULT_IMAGERY_SOURCE.parse::<TileSource>() {
            Ok(source) => vec![source],
            Err(e) => {
                warn!(error = %e, "Built-in imagery source is invalid");
                Vec::new()
            }
        };
        Self { sources }
    }
}
