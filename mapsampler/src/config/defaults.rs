//! Default values for every configuration setting.

use std::path::PathBuf;

pub use crate::cache::DEFAULT_CACHE_CAPACITY;
pub use crate::executor::{DEFAULT_MAX_RETRIES, DEFAULT_WORKER_POOL_SIZE};
pub use crate::provider::DEFAULT_HTTP_TIMEOUT_SECS;

/// Fraction by which a sample box is enlarged after the minimum size is met.
///
/// 0.4 means the final box is 1.4 times the size of the entity's box.
pub const DEFAULT_GROW_FACTOR: f64 = 0.4;

/// Minimum physical width and height of a sample box in meters.
pub const DEFAULT_MIN_BBOX_METERS: f64 = 20.0;

/// Zoom level imagery is sampled at.
pub const DEFAULT_ZOOM: u8 = 18;

/// Largest side of a written sample image in pixels.
pub const DEFAULT_MAX_OUTPUT_DIMENSION: u32 = 768;

/// Number of entities sampled concurrently.
pub const DEFAULT_ENTITY_PARALLELISM: usize = 4;

/// Imagery layer used when the config names none.
pub const DEFAULT_IMAGERY_SOURCE: &str =
    "esri=tms:https://server.arcgisonline.com/ArcGIS/rest/services/World_Imagery/MapServer/tile/{z}/{y}/{x}";

/// Directory for the on-disk tile cache (`~/.cache/mapsampler` on Linux).
pub fn default_disk_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from(".cache"))
        .join("mapsampler")
}
