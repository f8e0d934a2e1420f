//! Tile fetch execution.
//!
//! - [`WorkerPool`]: bounds how many fetch attempts run at once
//! - [`RetryPolicy`]: how many attempts a job makes and how long it backs off
//! - [`TileFetcher`]: drives one tile entry from claim to `Loaded` or `Error`

mod fetcher;
mod policy;
mod pool;

pub use fetcher::{FetchOutcome, TileFetcher};
pub use policy::{
    RetryPolicy, DEFAULT_BACKOFF_MULTIPLIER, DEFAULT_INITIAL_DELAY_MS, DEFAULT_MAX_DELAY_SECS,
    DEFAULT_MAX_RETRIES,
};
pub use pool::{WorkerPermit, WorkerPool, DEFAULT_WORKER_POOL_SIZE};

#[cfg(test)]
pub(crate) use fetcher::tests::{png_tile, test_source, FlakyFetcher};
