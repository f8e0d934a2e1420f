//! Fixed-size worker pool for tile fetch attempts.
//!
//! The pool is a semaphore: a fetch attempt runs only while it holds a
//! permit, so at most `size` attempts are in flight at once. Jobs waiting for
//! a retry do not hold a permit.
//!
//! ```ignore
//! let pool = Arc::new(WorkerPool::new(10));
//!
//! let permit = pool.acquire().await?;
//! // download and decode one tile...
//! drop(permit);
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::{AcquireError, OwnedSemaphorePermit, Semaphore};

/// Default number of concurrent fetch attempts.
pub const DEFAULT_WORKER_POOL_SIZE: usize = 10;

/// Bounded concurrency for fetch attempts.
#[derive(Debug)]
pub struct WorkerPool {
    semaphore: Arc<Semaphore>,

    size: usize,

    /// Current number of running attempts (for metrics)
    in_flight: AtomicUsize,

    /// Peak concurrent attempts observed (for tuning)
    peak_in_flight: AtomicUsize,
}

impl WorkerPool {
    /// Creates a pool allowing `size` concurrent attempts.
    ///
    /// A size of zero is treated as one.
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(size)),
            size,
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
        }
    }

    /// Waits for a free worker slot.
    ///
    /// Fails only after [`WorkerPool::close`].
    pub async fn acquire(&self) -> Result<WorkerPermit<'_>, AcquireError> {
        let permit = self.semaphore.clone().acquire_owned().await?;

        let current = self.in_flight.fetch_add(1, Ordering::Relaxed) + 1;
        self.peak_in_flight.fetch_max(current, Ordering::Relaxed);

        Ok(WorkerPermit {
            _permit: permit,
            in_flight: &self.in_flight,
        })
    }

    /// Refuses all further attempts; waiters are woken with an error.
    pub fn close(&self) {
        self.semaphore.close();
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Returns the current number of running attempts.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Relaxed)
    }

    /// Returns the peak number of concurrent attempts observed.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::Relaxed)
    }

    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self::new(DEFAULT_WORKER_POOL_SIZE)
    }
}

/// A running attempt's slot in the pool, released on drop.
pub struct WorkerPermit<'a> {
    _permit: OwnedSemaphorePermit,
    in_flight: &'a AtomicUsize,
}

impl Drop for WorkerPermit<'_> {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::Relaxed);
    }
}
