//! Rectangular sets of tiles and their bulk loading.
//!
//! A [`TileSet`] covers a bounding box at one zoom level of one source. It
//! resolves its tiles through the shared [`TileCache`], loads them through a
//! [`TileFetcher`] and reports aggregate readiness.
//!
//! ```ignore
//! let set = TileSet::new(cache, source, &bbox, 18)?;
//! set.load_all_blocking(&fetcher, false).await;
//! if set.status().has_all_loaded_tiles {
//!     let image = assembler.assemble(&set, &bbox)?;
//! }
//! ```

use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::cache::{TileCache, TileEntry, TileKey, TileState};
use crate::coord::{self, CoordError, GeoBox, TileCoord, TileRange, MAX_ZOOM};
use crate::executor::{FetchOutcome, TileFetcher};
use crate::provider::TileSource;

/// Largest number of tiles a single set may span.
pub const MAX_TILES_PER_SET: u64 = 1024;

/// Aggregate readiness of a tile set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TileSetStatus {
    /// At least one tile is loaded.
    pub has_visible_tiles: bool,
    /// At least one tile failed because the source has no imagery there or
    /// does not serve its zoom.
    pub has_overzoomed_tiles: bool,
    /// At least one tile has not reached a terminal state.
    pub has_loading_tiles: bool,
    /// Every tile is loaded.
    pub has_all_loaded_tiles: bool,
}

/// Counts after a bulk load.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadSummary {
    pub loaded: usize,
    pub failed: usize,
}

/// A rectangle of tiles from one source at one zoom.
pub struct TileSet {
    cache: Arc<TileCache>,
    source: Arc<TileSource>,
    range: Option<TileRange>,
    /// Entries pinned by this set once they have been resolved.
    entries: Mutex<Vec<Arc<TileEntry>>>,
    status: OnceLock<TileSetStatus>,
}

impl TileSet {
    /// Builds the set covering `bbox` at `zoom`, clamped to the source grid.
    ///
    /// Zoom 0 yields an empty set. A malformed box, an unsupported zoom or a
    /// range larger than [`MAX_TILES_PER_SET`] is an error.
    pub fn new(
        cache: Arc<TileCache>,
        source: Arc<TileSource>,
        bbox: &GeoBox,
        zoom: u8,
    ) -> Result<Self, CoordError> {
        if zoom > MAX_ZOOM {
            return Err(CoordError::InvalidZoom(zoom));
        }
        bbox.validate()?;

        if zoom == 0 {
            return Ok(Self::with_range(cache, source, None));
        }

        let range = coord::tile_range(bbox, zoom)?;
        Self::from_range(cache, source, range)
    }

    /// Builds the set for an explicit tile range, clamped to the source grid.
    pub fn from_range(
        cache: Arc<TileCache>,
        source: Arc<TileSource>,
        range: TileRange,
    ) -> Result<Self, CoordError> {
        if range.zoom != 0 && !source.supports_zoom(range.zoom) {
            return Err(CoordError::InvalidZoom(range.zoom));
        }
        if range.size() > MAX_TILES_PER_SET {
            return Err(CoordError::InvalidRange(format!(
                "{} spans {} tiles (limit {})",
                range,
                range.size(),
                MAX_TILES_PER_SET
            )));
        }

        let clamped = if range.zoom == 0 {
            None
        } else {
            range.clamp(source.tile_min(range.zoom), source.tile_max(range.zoom))
        };
        if clamped.is_none() {
            debug!(range = %range, source = source.name(), "Tile range outside source grid");
        }

        Ok(Self::with_range(cache, source, clamped))
    }

    fn with_range(cache: Arc<TileCache>, source: Arc<TileSource>, range: Option<TileRange>) -> Self {
        Self {
            cache,
            source,
            range,
            entries: Mutex::new(Vec::new()),
            status: OnceLock::new(),
        }
    }

    pub fn source(&self) -> &Arc<TileSource> {
        &self.source
    }

    /// The clamped range, `None` for an empty set.
    pub fn range(&self) -> Option<TileRange> {
        self.range
    }

    pub fn is_empty(&self) -> bool {
        self.range.is_none()
    }

    pub fn len(&self) -> usize {
        self.range.map_or(0, |r| r.size() as usize)
    }

    /// Tile coordinates in row-major order.
    pub fn tile_positions(&self) -> Vec<TileCoord> {
        self.range
            .map(|r| r.coords().collect())
            .unwrap_or_default()
    }

    fn key(&self, coord: TileCoord) -> TileKey {
        TileKey::new(self.source.name_arc(), coord)
    }

    /// Resolves every tile through the cache, creating missing entries.
    fn resolve_entries(&self) -> Vec<Arc<TileEntry>> {
        let mut entries = self.entries.lock();
        if entries.is_empty() {
            *entries = self
                .tile_positions()
                .into_iter()
                .map(|coord| self.cache.get_or_create(&self.key(coord)))
                .collect();
        }
        entries.clone()
    }

    /// Entry for one tile: the pinned one if the set was loaded, otherwise
    /// whatever the cache currently holds.
    pub fn entry(&self, coord: TileCoord) -> Option<Arc<TileEntry>> {
        let range = self.range?;
        if !range.contains(&coord) {
            return None;
        }
        let entries = self.entries.lock();
        if !entries.is_empty() {
            let index = (coord.y - range.min_y) as usize * range.width() as usize
                + (coord.x - range.min_x) as usize;
            return entries.get(index).cloned();
        }
        drop(entries);
        self.cache.peek(&self.key(coord))
    }

    /// Loads every tile and waits until all of them are terminal.
    ///
    /// Tiles already loaded are skipped unless `force` is set. Tiles another
    /// set is fetching right now are awaited rather than fetched twice.
    pub async fn load_all_blocking(&self, fetcher: &Arc<TileFetcher>, force: bool) -> LoadSummary {
        let entries = self.resolve_entries();
        if entries.is_empty() {
            return LoadSummary::default();
        }

        let mut jobs = JoinSet::new();
        for entry in entries.iter().cloned() {
            let fetcher = Arc::clone(fetcher);
            let source = Arc::clone(&self.source);
            jobs.spawn(async move {
                if fetcher.fetch(&source, &entry, force).await == FetchOutcome::InFlightElsewhere {
                    entry.wait_settled().await;
                }
            });
        }

        while let Some(result) = jobs.join_next().await {
            if let Err(e) = result {
                warn!(error = %e, "Tile load job aborted");
            }
        }

        let loaded = entries
            .iter()
            .filter(|e| e.state() == TileState::Loaded)
            .count();
        let summary = LoadSummary {
            loaded,
            failed: entries.len() - loaded,
        };
        debug!(
            source = self.source.name(),
            range = ?self.range,
            loaded = summary.loaded,
            failed = summary.failed,
            "Tile set loaded"
        );
        summary
    }

    /// Coordinates whose tile is not loaded.
    pub fn missed_tiles(&self) -> Vec<TileCoord> {
        self.tile_positions()
            .into_iter()
            .filter(|coord| {
                self.entry(*coord)
                    .map_or(true, |entry| entry.state() != TileState::Loaded)
            })
            .collect()
    }

    /// Aggregate status, computed on first call and then kept.
    pub fn status(&self) -> TileSetStatus {
        *self.status.get_or_init(|| self.compute_status())
    }

    fn compute_status(&self) -> TileSetStatus {
        let positions = self.tile_positions();
        if positions.is_empty() {
            return TileSetStatus::default();
        }

        let mut status = TileSetStatus {
            has_all_loaded_tiles: true,
            ..TileSetStatus::default()
        };

        for coord in positions {
            let Some(entry) = self.entry(coord) else {
                status.has_all_loaded_tiles = false;
                continue;
            };
            match entry.state() {
                TileState::Loaded => status.has_visible_tiles = true,
                TileState::Error => {
                    status.has_all_loaded_tiles = false;
                    if entry.error().is_some_and(|e| e.is_overzoomed()) {
                        status.has_overzoomed_tiles = true;
                    }
                }
                TileState::Pending | TileState::Loading => {
                    status.has_all_loaded_tiles = false;
                    status.has_loading_tiles = true;
                }
            }
            if entry.is_busy() {
                status.has_loading_tiles = true;
            }
        }

        status
    }
}
