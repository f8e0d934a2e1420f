//! Tile cache entries and their load state machine.

use std::fmt;
use std::sync::Arc;

use image::RgbaImage;
use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::watch;

use crate::coord::TileCoord;
use crate::provider::ProviderError;

/// Identity of a cached tile: the source it came from and its grid position.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TileKey {
    pub source: Arc<str>,
    pub coord: TileCoord,
}

impl TileKey {
    pub fn new(source: Arc<str>, coord: TileCoord) -> Self {
        Self { source, coord }
    }
}

impl fmt::Display for TileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.source, self.coord)
    }
}

/// Load state of a cached tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileState {
    Pending,
    Loading,
    Loaded,
    Error,
}

impl TileState {
    /// `Loaded` and `Error` are terminal unless a fetch is started again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TileState::Loaded | TileState::Error)
    }
}

/// Why a tile could not be loaded.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TileFetchError {
    #[error("{0}")]
    Provider(#[from] ProviderError),

    #[error("Failed to decode tile image: {0}")]
    Decode(String),

    #[error("Fetch cancelled")]
    Cancelled,
}

impl TileFetchError {
    /// True when the server reported that no imagery exists for the tile.
    pub fn is_no_imagery(&self) -> bool {
        matches!(self, TileFetchError::Provider(e) if e.is_no_imagery())
    }

    /// No imagery, or the source does not serve this zoom at all.
    pub fn is_overzoomed(&self) -> bool {
        self.is_no_imagery()
            || matches!(self, TileFetchError::Provider(ProviderError::UnsupportedZoom(_)))
    }
}

#[derive(Debug)]
struct EntryState {
    state: TileState,
    image: Option<Arc<RgbaImage>>,
    error: Option<TileFetchError>,
    attempts: u32,
    busy: bool,
}

/// One tile in the cache.
///
/// The entry is shared (`Arc`) between the cache, tile sets and fetch jobs.
/// Only the tile fetcher moves it through its states. While a fetch job owns
/// the entry it is *busy*: other loaders wait for it instead of starting a
/// second fetch, and the cache will not evict it.
pub struct TileEntry {
    key: TileKey,
    inner: Mutex<EntryState>,
    settled: watch::Sender<u64>,
}

impl TileEntry {
    pub(crate) fn new(key: TileKey) -> Self {
        let (settled, _) = watch::channel(0);
        Self {
            key,
            inner: Mutex::new(EntryState {
                state: TileState::Pending,
                image: None,
                error: None,
                attempts: 0,
                busy: false,
            }),
            settled,
        }
    }

    pub fn key(&self) -> &TileKey {
        &self.key
    }

    pub fn coord(&self) -> TileCoord {
        self.key.coord
    }

    pub fn state(&self) -> TileState {
        self.inner.lock().state
    }

    /// Decoded image, present only while `Loaded`.
    pub fn image(&self) -> Option<Arc<RgbaImage>> {
        self.inner.lock().image.clone()
    }

    /// Last failure, present only while `Error`.
    pub fn error(&self) -> Option<TileFetchError> {
        self.inner.lock().error.clone()
    }

    /// Number of fetch attempts made by the current (or last) fetch job.
    pub fn attempts(&self) -> u32 {
        self.inner.lock().attempts
    }

    /// True while a fetch job owns the entry.
    pub fn is_busy(&self) -> bool {
        self.inner.lock().busy
    }

    /// True when the last failure was the server reporting no imagery.
    pub fn is_no_imagery(&self) -> bool {
        let inner = self.inner.lock();
        inner.state == TileState::Error
            && inner.error.as_ref().is_some_and(TileFetchError::is_no_imagery)
    }

    /// Takes ownership of the entry for a fetch job.
    ///
    /// Fails when another job is already running, or when the tile is loaded
    /// and `force` is not set.
    pub(crate) fn try_claim(&self, force: bool) -> bool {
        let mut inner = self.inner.lock();
        if inner.busy || (inner.state == TileState::Loaded && !force) {
            return false;
        }
        inner.busy = true;
        inner.attempts = 0;
        true
    }

    pub(crate) fn begin_attempt(&self) -> u32 {
        let mut inner = self.inner.lock();
        inner.state = TileState::Loading;
        inner.attempts += 1;
        inner.attempts
    }

    pub(crate) fn record_failure(&self, error: TileFetchError) {
        let mut inner = self.inner.lock();
        inner.state = TileState::Error;
        inner.image = None;
        inner.error = Some(error);
    }

    pub(crate) fn finish_loaded(&self, image: RgbaImage) {
        {
            let mut inner = self.inner.lock();
            inner.state = TileState::Loaded;
            inner.image = Some(Arc::new(image));
            inner.error = None;
            inner.busy = false;
        }
        self.notify_settled();
    }

    /// Releases the entry after the last failed attempt. It stays `Error`.
    pub(crate) fn finish_failed(&self) {
        {
            let mut inner = self.inner.lock();
            if inner.state != TileState::Error {
                inner.state = TileState::Error;
                inner.image = None;
                inner.error.get_or_insert(TileFetchError::Cancelled);
            }
            inner.busy = false;
        }
        self.notify_settled();
    }

    fn notify_settled(&self) {
        self.settled.send_modify(|generation| *generation += 1);
    }

    /// Waits until no fetch job owns the entry.
    pub async fn wait_settled(&self) {
        let mut rx = self.settled.subscribe();
        while self.is_busy() {
            if rx.changed().await.is_err() {
                return;
            }
        }
    }
}

impl fmt::Debug for TileEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("TileEntry")
            .field("key", &self.key)
            .field("state", &inner.state)
            .field("attempts", &inner.attempts)
            .field("busy", &inner.busy)
            .field("error", &inner.error)
            .finish()
    }
}
