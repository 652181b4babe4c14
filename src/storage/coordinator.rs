//! Lock and debounce-timer machinery a [`Collection`](crate::storage::collection::Collection)
//! uses to serialize writes, bound concurrent reads, and schedule flushes.
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::{Mutex, MutexGuard, Semaphore, SemaphorePermit};

/// Maximum number of readers admitted to a collection at once.
pub const READER_PERMITS: usize = 10;

/// How long a collection waits after its last write before flushing
/// pending pages to disk. Re-arming resets the wait rather than
/// queuing a second flush.
pub const FLUSH_DEBOUNCE: Duration = Duration::from_secs(30);

/// Mutual exclusion for writers, bounded admission for readers, and a
/// separate lock flushing holds so a flush and a write never run
/// concurrently against the same page.
#[derive(Debug)]
pub struct WriteCoordinator {
    writer: Mutex<()>,
    readers: Semaphore,
    flusher: Mutex<()>,
}

impl WriteCoordinator {
    pub fn new() -> Self {
        Self {
            writer: Mutex::new(()),
            readers: Semaphore::new(READER_PERMITS),
            flusher: Mutex::new(()),
        }
    }

    pub async fn acquire_writer(&self) -> MutexGuard<'_, ()> {
        self.writer.lock().await
    }

    pub async fn acquire_reader(&self) -> SemaphorePermit<'_> {
        self.readers
            .acquire()
            .await
            .expect("semaphore is never closed")
    }

    pub async fn acquire_flusher(&self) -> MutexGuard<'_, ()> {
        self.flusher.lock().await
    }

    /// Waits for any in-progress flush to finish without itself
    /// holding the flusher lock afterward. A reader uses this so it
    /// never observes a half-written page, without serializing
    /// against other readers the way holding the guard would.
    pub async fn await_flusher_unlocked(&self) {
        drop(self.flusher.lock().await);
    }
}

impl Default for WriteCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

/// Debounced trigger: arming bumps a generation counter, and only the
/// task holding the generation current when its sleep finishes goes on
/// to run the flush. Earlier, superseded arms see their generation has
/// moved on and become no-ops instead of firing a stale flush.
#[derive(Debug, Default)]
pub struct DebounceTimer {
    generation: AtomicU64,
}

impl DebounceTimer {
    pub fn new() -> Self {
        Self {
            generation: AtomicU64::new(0),
        }
    }

    /// Claims the next generation. The caller's spawned task should
    /// sleep for the debounce window and then only proceed with the
    /// flush if [`DebounceTimer::is_current`] still agrees afterward.
    pub fn arm(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Invalidates any timer armed before this call, without arming a
    /// new one. Used when a collection is dropped or explicitly
    /// flushed before the debounce window elapses.
    pub fn cancel(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    pub fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }
}
