//! Tile fetch jobs.
//!
//! A job owns one [`TileEntry`] from claim to release. Each attempt takes a
//! worker slot, downloads the bytes, decodes them and either finishes the
//! entry as `Loaded` or records the failure. Failed attempts are retried in
//! place according to the [`RetryPolicy`]; the slot is given back while the
//! job sleeps between attempts.

use std::sync::Arc;

use image::RgbaImage;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use super::policy::RetryPolicy;
use super::pool::WorkerPool;
use crate::cache::{TileEntry, TileFetchError};
use crate::coord::TileCoord;
use crate::provider::{ProviderError, TileBytesFetcher, TileSource};

/// Outcome of asking the fetcher to load an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// This call ran the fetch job to completion.
    Fetched,
    /// Another job owns the entry; wait for it to settle.
    InFlightElsewhere,
    /// The entry was already loaded and no reload was requested.
    AlreadyLoaded,
}

/// Runs tile fetch jobs on a shared worker pool.
pub struct TileFetcher {
    bytes: Arc<dyn TileBytesFetcher>,
    pool: Arc<WorkerPool>,
    retry: RetryPolicy,
    cancel: CancellationToken,
}

impl TileFetcher {
    pub fn new(bytes: Arc<dyn TileBytesFetcher>, pool: Arc<WorkerPool>, retry: RetryPolicy) -> Self {
        Self {
            bytes,
            pool,
            retry,
            cancel: CancellationToken::new(),
        }
    }

    /// Stops retries and pending attempts once `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn pool(&self) -> &Arc<WorkerPool> {
        &self.pool
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Loads `entry` unless it is loaded already (see `force`) or another job
    /// owns it.
    pub async fn fetch(&self, source: &TileSource, entry: &TileEntry, force: bool) -> FetchOutcome {
        if !entry.try_claim(force) {
            return if entry.is_busy() {
                FetchOutcome::InFlightElsewhere
            } else {
                FetchOutcome::AlreadyLoaded
            };
        }
        self.run_claimed(source, entry).await;
        FetchOutcome::Fetched
    }

    async fn run_claimed(&self, source: &TileSource, entry: &TileEntry) {
        let coord = entry.coord();

        loop {
            let attempt = match self.attempt(source, entry).await {
                Ok(()) => return,
                Err((attempt, error)) => {
                    let permanent = is_permanent(&error);
                    entry.record_failure(error.clone());
                    if permanent {
                        debug!(
                            source = source.name(),
                            tile = %coord,
                            error = %error,
                            "Tile fetch failed permanently"
                        );
                        break;
                    }
                    attempt
                }
            };

            let Some(delay) = self.retry.delay_for_attempt(attempt) else {
                warn!(
                    source = source.name(),
                    tile = %coord,
                    attempts = attempt,
                    error = ?entry.error(),
                    "Tile fetch retries exhausted"
                );
                break;
            };

            debug!(
                source = source.name(),
                tile = %coord,
                attempt,
                delay_ms = delay.as_millis() as u64,
                "Retrying tile fetch"
            );

            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    entry.record_failure(TileFetchError::Cancelled);
                    break;
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }

        entry.finish_failed();
    }

    /// One attempt. On success the entry is finished and released.
    async fn attempt(&self, source: &TileSource, entry: &TileEntry) -> Result<(), (u32, TileFetchError)> {
        let permit = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            permit = self.pool.acquire() => permit.ok(),
        };
        let Some(_permit) = permit else {
            return Err((entry.attempts(), TileFetchError::Cancelled));
        };

        let attempt = entry.begin_attempt();
        let coord = entry.coord();

        let result = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(TileFetchError::Cancelled),
            result = self.download(source, coord) => result,
        };

        match result {
            Ok(image) => {
                trace!(source = source.name(), tile = %coord, attempt, "Tile loaded");
                entry.finish_loaded(image);
                Ok(())
            }
            Err(e) => Err((attempt, e)),
        }
    }

    async fn download(&self, source: &TileSource, coord: TileCoord) -> Result<RgbaImage, TileFetchError> {
        let bytes = self.bytes.fetch_tile_bytes(source, coord).await?;
        let image = image::load_from_memory(&bytes)
            .map_err(|e| TileFetchError::Decode(e.to_string()))?
            .to_rgba8();
        Ok(image)
    }
}

/// Failures that cannot change on a second try.
fn is_permanent(error: &TileFetchError) -> bool {
    matches!(
        error,
        TileFetchError::Cancelled
            | TileFetchError::Provider(ProviderError::UnsupportedZoom(_))
            | TileFetchError::Provider(ProviderError::InvalidSource(_))
    )
}
