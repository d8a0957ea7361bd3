//! Load simulator: deterministic worker-thread starvation and CPU saturation.
//!
//! Owns a single exclusive lock plus bookkeeping maps of which callers are
//! currently waiting for vs. holding it. `block_for` contends for the lock and
//! holds it for a duration, `hang_for` stalls a worker without touching the
//! lock, and `burn_cpu` runs literal floating-point work until a deadline.
//! `snapshot` reports the contention state without ever acquiring the lock.
//!
//! Cleanup is guaranteed on every exit path: cancellation of an in-flight
//! operation (future drop) runs RAII guards that remove the caller from both
//! maps and release the lock.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tokio::sync::{OwnedSemaphorePermit, Semaphore, SemaphorePermit};

use crate::config::{CPU_BURN_LOG_EVERY, HANG_POLL_INTERVAL};

/// Exclusive lock with non-owning state queries.
///
/// Built on a one-permit semaphore so that `is_held` and `queue_length` can be
/// answered without taking the lock. The waiter counter is maintained with a
/// drop guard, so a caller cancelled mid-acquire still leaves the queue count
/// accurate.
pub struct ContentionLock {
    sem: Semaphore,
    queued: AtomicUsize,
}

impl ContentionLock {
    fn new() -> Self {
        Self {
            sem: Semaphore::new(1),
            queued: AtomicUsize::new(0),
        }
    }

    /// Acquire the lock, waiting behind any queued callers.
    async fn acquire(&self) -> LockGuard<'_> {
        self.queued.fetch_add(1, Ordering::SeqCst);
        let queue_token = QueueToken { queued: &self.queued };
        let permit = self
            .sem
            .acquire()
            .await
            .expect("contention lock semaphore is never closed");
        drop(queue_token);
        LockGuard { _permit: permit }
    }

    /// Whether any caller currently owns the lock.
    pub fn is_held(&self) -> bool {
        self.sem.available_permits() == 0
    }

    /// Number of callers currently waiting to acquire the lock (excludes the
    /// holder).
    pub fn queue_length(&self) -> usize {
        self.queued.load(Ordering::SeqCst)
    }

    pub fn has_queued(&self) -> bool {
        self.queue_length() > 0
    }
}

/// Decrements the waiter counter on drop, whether the acquire completed or was
/// cancelled mid-wait.
struct QueueToken<'a> {
    queued: &'a AtomicUsize,
}

impl Drop for QueueToken<'_> {
    fn drop(&mut self) {
        self.queued.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Releases the lock on drop.
struct LockGuard<'a> {
    _permit: SemaphorePermit<'a>,
}

/// Bounded pool of request-handling workers, the analog of the hosting
/// server's fixed-size request thread pool. Scenario operations check out a
/// permit for their full duration; saturating the pool makes further scenario
/// requests queue, which is the behavior under test.
#[derive(Clone)]
pub struct WorkerPool {
    permits: Arc<Semaphore>,
    size: usize,
}

impl WorkerPool {
    pub fn new(size: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(size)),
            size,
        }
    }

    /// Occupy one worker slot until the returned permit is dropped.
    pub async fn checkout(&self) -> OwnedSemaphorePermit {
        self.permits
            .clone()
            .acquire_owned()
            .await
            .expect("worker pool semaphore is never closed")
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }
}

/// Entry recorded for a caller while it waits for or holds the lock.
struct CallerEntry {
    since: Instant,
}

impl CallerEntry {
    fn new() -> Self {
        Self {
            since: Instant::now(),
        }
    }
}

/// Result of a completed `block_for` call.
pub struct BlockOutcome {
    pub requested: Duration,
    pub held: Duration,
}

/// Result of a completed `hang_for` call.
pub struct HangOutcome {
    pub requested: Duration,
    pub elapsed: Duration,
    pub completed_at: DateTime<Utc>,
}

/// Result of a completed `burn_cpu` call.
pub struct BurnOutcome {
    pub iterations: u64,
    pub checksum: u64,
    pub elapsed: Duration,
}

/// Point-in-time view of the contention state.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentionSnapshot {
    pub total_threads: usize,
    pub waiting_threads: usize,
    pub waiting_thread_names: Vec<String>,
    pub locked_threads: usize,
    pub locked_thread_names: Vec<String>,
    pub lock_held: bool,
    pub has_queued_threads: bool,
    pub queue_length: usize,
    pub timestamp: DateTime<Utc>,
}

/// The simulator instance. Explicitly constructed so tests can run isolated
/// copies; the server shares one via `Arc` in application state.
pub struct LoadSimulator {
    lock: ContentionLock,
    waiting: DashMap<String, CallerEntry>,
    holding: DashMap<String, CallerEntry>,
    next_caller: AtomicU64,
}

impl Default for LoadSimulator {
    fn default() -> Self {
        Self::new()
    }
}

impl LoadSimulator {
    pub fn new() -> Self {
        Self {
            lock: ContentionLock::new(),
            waiting: DashMap::new(),
            holding: DashMap::new(),
            next_caller: AtomicU64::new(0),
        }
    }

    /// Issue a fresh worker label for a request, the analog of a servlet
    /// container's pool thread name.
    pub fn next_caller_id(&self) -> String {
        let seq = self.next_caller.fetch_add(1, Ordering::Relaxed) + 1;
        format!("worker-{}", seq)
    }

    /// Contend for the exclusive lock and hold it for `duration`.
    ///
    /// The caller is registered as waiting, awaits the lock (the suspension
    /// point that occupies a pool worker), is moved to holding on acquisition,
    /// sleeps out the duration, then releases. An id is removed from both maps
    /// on every exit path, including cancellation at either await point.
    pub async fn block_for(&self, duration: Duration, caller: &str) -> BlockOutcome {
        self.waiting.insert(caller.to_owned(), CallerEntry::new());
        tracing::debug!(caller, "queued for contention lock");

        let mut cleanup = CancelCleanup {
            simulator: self,
            caller,
            lock: None,
            armed: true,
        };

        let guard = self.lock.acquire().await;
        // Hand the permit to the cleanup guard: on cancellation the caller
        // must leave the holding map before the lock is released, so a racing
        // waiter can never observe two holders.
        cleanup.lock = Some(guard);

        // Move waiting -> holding. Remove before insert so the id is never
        // present in both maps at once.
        self.waiting.remove(caller);
        self.holding.insert(caller.to_owned(), CallerEntry::new());
        tracing::info!(
            caller,
            seconds = duration.as_secs(),
            "acquired contention lock, holding"
        );

        let started = Instant::now();
        tokio::time::sleep(duration).await;

        self.holding.remove(caller);
        cleanup.armed = false;
        drop(cleanup);

        let held = started.elapsed();
        tracing::info!(caller, held_ms = held.as_millis() as u64, "released contention lock");

        BlockOutcome {
            requested: duration,
            held,
        }
    }

    /// Stall the calling worker for `duration` without touching the lock.
    ///
    /// Coarse-grained sleep loop that re-checks the deadline each tick, so a
    /// cancellation is observed promptly. Models a scheduler-starvation hang,
    /// independently triggerable and observable from lock contention.
    pub async fn hang_for(&self, duration: Duration, caller: &str) -> HangOutcome {
        let started = Instant::now();
        let deadline = started + duration;
        tracing::info!(caller, seconds = duration.as_secs(), "worker hang started");

        loop {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            let step = (deadline - now).min(HANG_POLL_INTERVAL);
            tokio::time::sleep(step).await;
            tracing::debug!(
                caller,
                elapsed_secs = started.elapsed().as_secs(),
                "worker still hanging"
            );
        }

        tracing::info!(caller, "worker hang finished");
        HangOutcome {
            requested: duration,
            elapsed: started.elapsed(),
            completed_at: Utc::now(),
        }
    }

    /// Burn CPU with literal floating-point work until the deadline elapses.
    ///
    /// No sleeps. The accumulator feeds the returned checksum and every term
    /// passes through `black_box`, so the loop cannot be optimized away. Run
    /// this on the blocking pool; it saturates a core for the full duration.
    pub fn burn_cpu(duration: Duration) -> BurnOutcome {
        let started = Instant::now();
        let mut rng = SmallRng::from_entropy();
        let mut iterations: u64 = 0;
        let mut accumulator: f64 = 0.0;

        while started.elapsed() < duration {
            accumulator += std::hint::black_box((rng.gen::<f64>() * 1_000_000.0).sqrt());
            iterations += 1;

            if iterations % CPU_BURN_LOG_EVERY == 0 {
                tracing::debug!(
                    iterations,
                    elapsed_secs = started.elapsed().as_secs(),
                    "cpu burn progress"
                );
            }
        }

        BurnOutcome {
            iterations,
            checksum: accumulator as u64,
            elapsed: started.elapsed(),
        }
    }

    /// Snapshot the contention state without acquiring the lock.
    pub fn snapshot(&self) -> ContentionSnapshot {
        let total_threads = tokio::runtime::Handle::try_current()
            .map(|handle| handle.metrics().num_workers())
            .unwrap_or(0);

        let waiting_thread_names: Vec<String> =
            self.waiting.iter().map(|entry| entry.key().clone()).collect();
        let locked_thread_names: Vec<String> =
            self.holding.iter().map(|entry| entry.key().clone()).collect();

        ContentionSnapshot {
            total_threads,
            waiting_threads: waiting_thread_names.len(),
            waiting_thread_names,
            locked_threads: locked_thread_names.len(),
            locked_thread_names,
            lock_held: self.lock.is_held(),
            has_queued_threads: self.lock.has_queued(),
            queue_length: self.lock.queue_length(),
            timestamp: Utc::now(),
        }
    }

    /// Number of callers currently waiting for or holding the lock, for
    /// status logging.
    pub fn active_callers(&self) -> (usize, usize) {
        (self.waiting.len(), self.holding.len())
    }
}

/// Removes a cancelled caller from both bookkeeping maps and then releases
/// the lock.
///
/// Armed for the whole lifetime of a `block_for` call and disarmed just before
/// the normal return, so a future dropped at any await point still restores
/// the invariant that a finished caller appears in neither map. The permit is
/// stored here so that `Drop` runs the map removal first and the field drop
/// releases the lock second; a waiter woken by the release can never observe
/// the cancelled caller still in `holding`.
struct CancelCleanup<'a> {
    simulator: &'a LoadSimulator,
    caller: &'a str,
    lock: Option<LockGuard<'a>>,
    armed: bool,
}

impl Drop for CancelCleanup<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let waited = self.simulator.waiting.remove(self.caller);
        let held = self.simulator.holding.remove(self.caller);
        if let Some((_, entry)) = waited.or(held) {
            tracing::warn!(
                caller = self.caller,
                active_ms = entry.since.elapsed().as_millis() as u64,
                "caller cancelled mid-simulation, contention bookkeeping cleaned up"
            );
        }
        // Release the lock only after the maps are clean.
        drop(self.lock.take());
    }
}
