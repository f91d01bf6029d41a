//! Bounded parallel execution for the crawl phases
//!
//! This module provides the admission-controlled executor that every crawl
//! phase runs on. Each phase (share discovery, tree walking, file scanning)
//! owns one [`BoundedScheduler`] with its own parallelism and queue-depth
//! limits.
//!
//! # Architecture Responsibilities
//!
//! ## What This Module Does:
//! - **Admission control**: blocks submitters while the queue is at its configured depth
//! - **Bounded width**: never runs more units at once than the configured parallelism
//! - **Liveness tracking**: queued + running counters are the only completion signal
//! - **Cancellation**: a shared [`CancelToken`] that recursive units poll
//!
//! ## What This Module Does NOT Do:
//! - **Domain Logic**: it does not know about shares, directories or files
//! - **Error Reporting**: units report their own failures; the scheduler only
//!   guarantees that a failing unit still releases its slot
//!
//! ```text
//!  submit ──▶ ┌──────────┐  dispatch   ┌──────────────┐  completion
//!             │  queue   │ ──────────▶ │ running (≤P) │ ───────────┐
//!             └──────────┘             └──────────────┘            │
//!                   ▲                                              │
//!                   └──────────────── re-dispatch ◀────────────────┘
//! ```
//!
//! # Example Usage
//!
//! ```rust
//! use sharecrawl::parallel::BoundedScheduler;
//! use std::time::Duration;
//!
//! let scheduler = BoundedScheduler::new("example", 4, 0, Duration::from_millis(10)).unwrap();
//! for i in 0..8 {
//!     scheduler.submit(move || {
//!         let _ = i * 2;
//!     });
//! }
//! scheduler.wait_idle(Duration::from_millis(5));
//! assert_eq!(scheduler.completed(), 8);
//! ```

pub mod cancel;
pub mod scheduler;

pub use cancel::CancelToken;
pub use scheduler::{BoundedScheduler, SchedulerStats};

/// Resolve a configured thread count, where 0 means "one per available core"
pub fn resolve_threads(configured: usize) -> usize {
    if configured > 0 {
        configured
    } else {
        std::cmp::max(1, num_cpus::get())
    }
}
