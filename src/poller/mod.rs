//! The polling engine.
//!
//! A [`Scheduler`] wakes on a fixed tick, asks the [`SubscriptionStore`] for
//! every subscription whose refresh interval has elapsed, and hands that set
//! to a bounded [`WorkerPool`]. Each job runs the [`PollPipeline`]:
//!
//! 1. fetch the feed (bounded by the fetch timeout)
//! 2. compare against the stored cursor ([`detect_new_items`])
//! 3. deliver new items oldest first, paced by a [`Pacer`]
//! 4. write back the poll time and the new cursor
//!
//! Failures are contained per job; a cycle always runs to completion.

mod dedup;
mod pacer;
mod pipeline;
mod pool;
mod scheduler;
mod store;

use std::time::Duration;

pub use dedup::{detect_new_items, NewItems};
pub use pacer::Pacer;
pub use pipeline::{JobReport, PollOutcome, PollPipeline};
pub use pool::{CycleReport, WorkerPool};
pub use scheduler::{Scheduler, SchedulerHandle};
pub use store::{StoreError, SubscriptionStore};

/// Runtime knobs for the poller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollSettings {
    /// How often the due set is checked.
    pub tick_interval: Duration,
    /// Maximum feeds processed at once.
    pub worker_pool_size: usize,
    /// Upper bound on one feed fetch, including the body download.
    pub fetch_timeout: Duration,
    /// Gap between consecutive messages of one job.
    pub inter_message_delay: Duration,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(60),
            worker_pool_size: 5,
            fetch_timeout: Duration::from_secs(30),
            inter_message_delay: Duration::from_millis(100),
        }
    }
}
