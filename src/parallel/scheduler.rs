use anyhow::{Context, Result};
use std::collections::VecDeque;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

type Unit = Box<dyn FnOnce() + Send + 'static>;

struct SchedulerState {
    queue: VecDeque<Unit>,
    running: usize,
}

struct Inner {
    name: String,
    max_parallel: usize,
    max_queue: usize,
    admission_poll: Duration,
    state: Mutex<SchedulerState>,
    completed: AtomicU64,
    pool: rayon::ThreadPool,
}

/// Admission-controlled executor with a fixed parallelism limit
///
/// Units are queued FIFO and started on the scheduler's own thread pool while
/// fewer than `max_parallel` are running. Every completion (including a
/// panicking unit) releases its slot and immediately dispatches the next
/// queued unit. Handles are cheap to clone and may be moved into units so
/// that a unit can submit follow-up work to its own scheduler.
#[derive(Clone)]
pub struct BoundedScheduler {
    inner: Arc<Inner>,
}

/// Point-in-time counters of a scheduler
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerStats {
    pub name: String,
    pub completed: u64,
    pub queued: usize,
    pub running: usize,
}

impl fmt::Display for SchedulerStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} tasks: C:{}, Q:{}, R:{}",
            self.name, self.completed, self.queued, self.running
        )
    }
}

impl Inner {
    fn lock_state(&self) -> MutexGuard<'_, SchedulerState> {
        // Units never run under this lock, so a poisoned guard still holds consistent counters
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn dispatch(inner: &Arc<Inner>) {
        let mut state = inner.lock_state();
        while state.running < inner.max_parallel {
            let Some(unit) = state.queue.pop_front() else {
                break;
            };
            state.running += 1;

            let owner = Arc::clone(inner);
            inner.pool.spawn(move || {
                if panic::catch_unwind(AssertUnwindSafe(unit)).is_err() {
                    tracing::error!("A unit of work panicked in the {} scheduler", owner.name);
                }
                Inner::complete(&owner);
            });
        }
    }

    fn complete(inner: &Arc<Inner>) {
        {
            let mut state = inner.lock_state();
            inner.completed.fetch_add(1, Ordering::SeqCst);
            state.running -= 1;
        }
        Inner::dispatch(inner);
    }
}

impl BoundedScheduler {
    /// Create a scheduler backed by a dedicated pool of `max_parallel` threads
    ///
    /// # Parameters
    /// - `name`: label used for thread names and statistics
    /// - `max_parallel`: maximum number of units running at once (minimum 1)
    /// - `max_queue`: queue depth at which `submit` blocks (0 = unbounded)
    /// - `admission_poll`: sleep between admission checks while blocked
    pub fn new(
        name: impl Into<String>,
        max_parallel: usize,
        max_queue: usize,
        admission_poll: Duration,
    ) -> Result<Self> {
        let name = name.into();
        let max_parallel = max_parallel.max(1);

        let thread_prefix = name.clone();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(max_parallel)
            .thread_name(move |index| format!("{thread_prefix}-{index}"))
            .build()
            .with_context(|| format!("Failed to build thread pool for the {name} scheduler"))?;

        Ok(Self {
            inner: Arc::new(Inner {
                name,
                max_parallel,
                max_queue,
                admission_poll,
                state: Mutex::new(SchedulerState {
                    queue: VecDeque::new(),
                    running: 0,
                }),
                completed: AtomicU64::new(0),
                pool,
            }),
        })
    }

    /// Queue a unit of work, blocking while the queue is at its depth limit
    pub fn submit<F>(&self, unit: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let unit: Unit = Box::new(unit);
        loop {
            // The depth check and the push share one guard so that concurrent
            // submitters cannot overfill the queue
            let mut state = self.inner.lock_state();
            if self.inner.max_queue == 0 || state.queue.len() < self.inner.max_queue {
                state.queue.push_back(unit);
                break;
            }
            drop(state);
            std::thread::sleep(self.inner.admission_poll);
        }
        Inner::dispatch(&self.inner);
    }

    /// True while any unit is queued or running
    pub fn is_outstanding(&self) -> bool {
        let state = self.inner.lock_state();
        !state.queue.is_empty() || state.running > 0
    }

    /// Block the caller until no unit is queued or running
    pub fn wait_idle(&self, poll: Duration) {
        while self.is_outstanding() {
            std::thread::sleep(poll);
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn max_parallel(&self) -> usize {
        self.inner.max_parallel
    }

    pub fn queued(&self) -> usize {
        self.inner.lock_state().queue.len()
    }

    pub fn running(&self) -> usize {
        self.inner.lock_state().running
    }

    pub fn completed(&self) -> u64 {
        self.inner.completed.load(Ordering::SeqCst)
    }

    pub fn stats(&self) -> SchedulerStats {
        let state = self.inner.lock_state();
        SchedulerStats {
            name: self.inner.name.clone(),
            completed: self.inner.completed.load(Ordering::SeqCst),
            queued: state.queue.len(),
            running: state.running,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam::channel::bounded;
    use std::sync::atomic::{AtomicBool, AtomicUsize};
    use std::time::Instant;

    const POLL: Duration = Duration::from_millis(5);

    fn wait_for(condition: impl Fn() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(10);
        while !condition() {
            assert!(Instant::now() < deadline, "condition not reached in time");
            std::thread::sleep(POLL);
        }
    }

    #[test]
    fn test_running_count_never_exceeds_parallelism() {
        let scheduler = BoundedScheduler::new("admission", 4, 0, POLL).unwrap();
        let current = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        for _ in 0..40 {
            let current = current.clone();
            let peak = peak.clone();
            scheduler.submit(move || {
                let now = current.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                std::thread::sleep(Duration::from_millis(5));
                current.fetch_sub(1, Ordering::SeqCst);
            });
            assert!(scheduler.running() <= 4);
        }

        scheduler.wait_idle(POLL);
        assert!(peak.load(Ordering::SeqCst) <= 4);
        assert_eq!(scheduler.completed(), 40);
        assert!(!scheduler.is_outstanding());
    }

    #[test]
    fn test_submit_blocks_when_queue_is_full() {
        let scheduler = BoundedScheduler::new("backpressure", 1, 1, POLL).unwrap();
        let (release_tx, release_rx) = bounded::<()>(0);

        // First unit occupies the only running slot until released
        scheduler.submit(move || {
            let _ = release_rx.recv();
        });
        wait_for(|| scheduler.running() == 1);

        // Second unit fills the queue
        scheduler.submit(|| {});
        assert_eq!(scheduler.queued(), 1);

        let submitted = Arc::new(AtomicBool::new(false));
        let blocked_submitter = {
            let scheduler = scheduler.clone();
            let submitted = submitted.clone();
            std::thread::spawn(move || {
                scheduler.submit(|| {});
                submitted.store(true, Ordering::SeqCst);
            })
        };

        std::thread::sleep(Duration::from_millis(100));
        assert!(
            !submitted.load(Ordering::SeqCst),
            "third submit should wait for queue space"
        );

        release_tx.send(()).unwrap();
        blocked_submitter.join().unwrap();
        assert!(submitted.load(Ordering::SeqCst));

        scheduler.wait_idle(POLL);
        assert_eq!(scheduler.completed(), 3);
    }

    #[test]
    fn test_concurrent_submitters_never_overfill_the_queue() {
        let scheduler = BoundedScheduler::new("contended", 1, 2, Duration::from_millis(1)).unwrap();
        let (release_tx, release_rx) = bounded::<()>(0);

        scheduler.submit(move || {
            let _ = release_rx.recv();
        });
        wait_for(|| scheduler.running() == 1);

        let submitters: Vec<_> = (0..6)
            .map(|_| {
                let scheduler = scheduler.clone();
                std::thread::spawn(move || scheduler.submit(|| {}))
            })
            .collect();

        let deadline = Instant::now() + Duration::from_millis(150);
        while Instant::now() < deadline {
            assert!(scheduler.queued() <= 2, "queue overfilled: {}", scheduler.queued());
            std::thread::sleep(Duration::from_millis(1));
        }
        assert_eq!(scheduler.queued(), 2);

        release_tx.send(()).unwrap();
        for submitter in submitters {
            submitter.join().unwrap();
        }
        scheduler.wait_idle(POLL);
        assert_eq!(scheduler.completed(), 7);
    }

    #[test]
    fn test_panicking_unit_releases_its_slot() {
        let scheduler = BoundedScheduler::new("panics", 1, 0, POLL).unwrap();
        let ran_after = Arc::new(AtomicBool::new(false));

        scheduler.submit(|| panic!("unit failure"));
        let flag = ran_after.clone();
        scheduler.submit(move || flag.store(true, Ordering::SeqCst));

        scheduler.wait_idle(POLL);
        assert_eq!(scheduler.completed(), 2);
        assert!(ran_after.load(Ordering::SeqCst));
    }

    #[test]
    fn test_recursive_fan_out_is_tracked() {
        fn spawn_level(scheduler: BoundedScheduler, depth: usize, visited: Arc<AtomicUsize>) {
            visited.fetch_add(1, Ordering::SeqCst);
            if depth == 0 {
                return;
            }
            for _ in 0..2 {
                let child_scheduler = scheduler.clone();
                let visited = visited.clone();
                scheduler.submit(move || spawn_level(child_scheduler, depth - 1, visited));
            }
        }

        let scheduler = BoundedScheduler::new("tree", 2, 0, POLL).unwrap();
        let visited = Arc::new(AtomicUsize::new(0));
        {
            let child_scheduler = scheduler.clone();
            let visited = visited.clone();
            scheduler.submit(move || spawn_level(child_scheduler, 4, visited));
        }

        scheduler.wait_idle(POLL);
        // 1 + 2 + 4 + 8 + 16 nodes in a binary tree of depth 4
        assert_eq!(visited.load(Ordering::SeqCst), 31);
        assert_eq!(scheduler.completed(), 31);
    }

    #[test]
    fn test_stats_display() {
        let stats = SchedulerStats {
            name: "FileScanner".to_string(),
            completed: 3,
            queued: 2,
            running: 1,
        };
        assert_eq!(stats.to_string(), "FileScanner tasks: C:3, Q:2, R:1");
    }
}
