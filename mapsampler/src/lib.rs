//! MapSampler - labeled map-imagery samples for machine learning
//!
//! Fetches map tiles covering the bounding box of each input entity,
//! stitches and crops them into one image per entity and writes a CSV
//! manifest pairing every image with its labels.
//!
//! Modules, leaves first:
//!
//! - [`coord`]: bounding boxes and slippy-map tile math
//! - [`provider`]: imagery sources and tile byte fetchers
//! - [`cache`]: in-memory tile cache and on-disk byte cache
//! - [`executor`]: worker pool and bounded-retry tile fetcher
//! - [`tileset`]: the tiles covering one box, loaded together
//! - [`assembly`]: stitching, cropping and downscaling
//! - [`collector`]: the per-entity sample loop and manifest

pub mod assembly;
pub mod cache;
pub mod collector;
pub mod config;
pub mod coord;
pub mod executor;
pub mod logging;
pub mod provider;
pub mod tileset;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
