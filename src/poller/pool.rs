use std::collections::HashSet;

use futures::stream::{self, StreamExt};

use crate::poller::pipeline::{JobReport, PollOutcome, PollPipeline};
use crate::storage::Subscription;

/// Totals for one cycle, logged when the cycle ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Subscriptions handed to the pool.
    pub due: usize,
    pub delivered: usize,
    pub delivery_failures: usize,
    pub fetch_failures: usize,
    pub no_new_items: usize,
    /// Jobs whose poll state could not be written back.
    pub unsaved: usize,
}

impl CycleReport {
    fn record(&mut self, job: &JobReport) {
        match job.outcome {
            PollOutcome::FetchFailed => self.fetch_failures += 1,
            PollOutcome::NoNewItems => self.no_new_items += 1,
            PollOutcome::Delivered { sent, failed } => {
                self.delivered += sent;
                self.delivery_failures += failed;
            }
        }
        if !job.state_saved {
            self.unsaved += 1;
        }
    }
}

/// Bounded set of workers draining one cycle's due subscriptions.
///
/// At most `size` jobs run at once. Any worker takes the next job as soon
/// as it finishes its current one, and [`WorkerPool::run`] only returns once
/// every job has completed.
#[derive(Debug, Clone, Copy)]
pub struct WorkerPool {
    size: usize,
}

impl WorkerPool {
    pub fn new(size: usize) -> Self {
        Self { size: size.max(1) }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Workers actually started for `jobs` jobs: never more than there is work for.
    pub fn workers_for(&self, jobs: usize) -> usize {
        self.size.min(jobs)
    }

    pub async fn run(&self, pipeline: &PollPipeline, due: Vec<Subscription>) -> CycleReport {
        // A subscription is polled at most once per cycle
        let mut seen = HashSet::with_capacity(due.len());
        let jobs: Vec<Subscription> = due.into_iter().filter(|s| seen.insert(s.id)).collect();

        let mut report = CycleReport {
            due: jobs.len(),
            ..Default::default()
        };
        if jobs.is_empty() {
            return report;
        }

        let workers = self.workers_for(jobs.len());
        tracing::debug!(jobs = jobs.len(), workers, "Starting workers");

        let results: Vec<JobReport> = stream::iter(jobs)
            .map(|sub| async move { pipeline.poll(&sub).await })
            .buffer_unordered(workers)
            .collect()
            .await;

        for job in &results {
            report.record(job);
        }
        report
    }
}
