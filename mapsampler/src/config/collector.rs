//! Runtime configuration for one sample collection run.

use std::path::PathBuf;

use super::defaults::*;
use super::settings::ConfigFile;

/// Settings the sample collector runs with.
///
/// Built from [`ConfigFile`] and then adjusted with the `with_*` methods,
/// which is how command line flags override file values.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectorConfig {
    pub grow_factor: f64,
    pub min_bbox_meters: f64,
    pub zoom: u8,
    pub max_output_dimension: u32,
    pub clear_output_before_run: bool,
    /// Retries after the first failed attempt of a tile fetch
    pub max_retries: u32,
    pub worker_pool_size: usize,
    pub cache_capacity: usize,
    pub entity_parallelism: usize,
    pub clip_and_center: bool,
    pub http_timeout_secs: u64,
    /// Raw tile bytes are kept here between runs when set
    pub disk_cache_dir: Option<PathBuf>,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            grow_factor: DEFAULT_GROW_FACTOR,
            min_bbox_meters: DEFAULT_MIN_BBOX_METERS,
            zoom: DEFAULT_ZOOM,
            max_output_dimension: DEFAULT_MAX_OUTPUT_DIMENSION,
            clear_output_before_run: true,
            max_retries: DEFAULT_MAX_RETRIES,
            worker_pool_size: DEFAULT_WORKER_POOL_SIZE,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            entity_parallelism: DEFAULT_ENTITY_PARALLELISM,
            clip_and_center: true,
            http_timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
            disk_cache_dir: None,
        }
    }
}

impl CollectorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes every collector setting from a loaded config file.
    pub fn from_config_file(config: &ConfigFile) -> Self {
        Self {
            grow_factor: config.collector.grow_factor,
            min_bbox_meters: config.collector.min_bbox_meters,
            zoom: config.collector.zoom,
            max_output_dimension: config.collector.max_output_dimension,
            clear_output_before_run: config.collector.clear_output,
            max_retries: config.download.max_retries,
            worker_pool_size: config.download.workers,
            cache_capacity: config.cache.capacity,
            entity_parallelism: config.collector.entity_parallelism,
            clip_and_center: config.collector.clip_and_center,
            http_timeout_secs: config.download.timeout,
            disk_cache_dir: config
                .cache
                .disk_enabled
                .then(|| config.cache.directory.clone()),
        }
    }

    pub fn with_grow_factor(mut self, grow_factor: f64) -> Self {
        self.grow_factor = grow_factor;
        self
    }

    pub fn with_min_bbox_meters(mut self, meters: f64) -> Self {
        self.min_bbox_meters = meters;
        self
    }

    pub fn with_zoom(mut self, zoom: u8) -> Self {
        self.zoom = zoom;
        self
    }

    pub fn with_max_output_dimension(mut self, pixels: u32) -> Self {
        self.max_output_dimension = pixels;
        self
    }

    /// When false, images already in the output folder are reused.
    pub fn with_clear_output(mut self, clear: bool) -> Self {
        self.clear_output_before_run = clear;
        self
    }

    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    pub fn with_worker_pool_size(mut self, workers: usize) -> Self {
        self.worker_pool_size = workers;
        self
    }

    pub fn with_cache_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = capacity;
        self
    }

    pub fn with_entity_parallelism(mut self, parallelism: usize) -> Self {
        self.entity_parallelism = parallelism;
        self
    }

    pub fn with_clip_and_center(mut self, clip: bool) -> Self {
        self.clip_and_center = clip;
        self
    }

    pub fn with_http_timeout_secs(mut self, secs: u64) -> Self {
        self.http_timeout_secs = secs;
        self
    }

    pub fn with_disk_cache_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.disk_cache_dir = dir;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CollectorConfig::default();
        assert_eq!(config.grow_factor, 0.4);
        assert_eq!(config.min_bbox_meters, 20.0);
        assert_eq!(config.zoom, 18);
        assert_eq!(config.max_output_dimension, 768);
        assert!(config.clear_output_before_run);
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.worker_pool_size, 10);
        assert!(config.disk_cache_dir.is_none());
    }

    #[test]
    fn test_from_config_file() {
        let mut file = ConfigFile::default();
        file.collector.zoom = 15;
        file.collector.clear_output = false;
        file.download.workers = 4;
        file.cache.disk_enabled = true;
        file.cache.directory = PathBuf::from("/var/tiles");

        let config = CollectorConfig::from_config_file(&file);
        assert_eq!(config.zoom, 15);
        assert!(!config.clear_output_before_run);
        assert_eq!(config.worker_pool_size, 4);
        assert_eq!(config.disk_cache_dir, Some(PathBuf::from("/var/tiles")));
    }

    #[test]
    fn test_disk_cache_off_by_default() {
        let config = CollectorConfig::from_config_file(&ConfigFile::default());
        assert!(config.disk_cache_dir.is_none());
    }

    #[test]
    fn test_builder_overrides() {
        let config = CollectorConfig::new()
            .with_grow_factor(0.0)
            .with_min_bbox_meters(200.0)
            .with_zoom(19)
            .with_max_output_dimension(512)
            .with_clear_output(false)
            .with_max_retries(1)
            .with_worker_pool_size(2)
            .with_cache_capacity(32)
            .with_entity_parallelism(1)
            .with_clip_and_center(false);

        assert_eq!(config.grow_factor, 0.0);
        assert_eq!(config.min_bbox_meters, 200.0);
        assert_eq!(config.zoom, 19);
        assert_eq!(config.max_output_dimension, 512);
        assert!(!config.clear_output_before_run);
        assert_eq!(config.max_retries, 1);
        assert_eq!(config.worker_pool_size, 2);
        assert_eq!(config.cache_capacity, 32);
        assert_eq!(config.entity_parallelism, 1);
        assert!(!config.clip_and_center);
    }
}
