//! Tile caching.
//!
//! - [`TileCache`]: in-memory map from tile identity to decoded tile entries,
//!   with LRU eviction that never drops an in-flight tile.
//! - [`DiskCachedFetcher`]: optional on-disk store of the raw bytes, layered
//!   in front of any byte fetcher.

mod disk;
mod memory;
mod types;

pub use disk::DiskCachedFetcher;
pub use memory::{CacheStats, TileCache, DEFAULT_CACHE_CAPACITY};
pub use types::{TileEntry, TileFetchError, TileKey, TileState};
