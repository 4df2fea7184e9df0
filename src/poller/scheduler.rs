use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::feed::FeedClient;
use crate::notify::Notifier;
use crate::poller::pacer::Pacer;
use crate::poller::pipeline::PollPipeline;
use crate::poller::pool::{CycleReport, WorkerPool};
use crate::poller::store::{StoreError, SubscriptionStore};
use crate::poller::PollSettings;

/// Drives poll cycles on a fixed tick.
///
/// Each tick queries the due set and hands it to the worker pool. The next
/// tick is not awaited until the cycle has finished, and ticks missed while
/// a long cycle ran are skipped, so cycles never overlap.
pub struct Scheduler {
    store: Arc<dyn SubscriptionStore>,
    pipeline: PollPipeline,
    pool: WorkerPool,
    tick_interval: Duration,
}

impl Scheduler {
    pub fn new(
        store: Arc<dyn SubscriptionStore>,
        client: Arc<dyn FeedClient>,
        notifier: Arc<dyn Notifier>,
        settings: &PollSettings,
    ) -> Self {
        let pipeline = PollPipeline::new(
            store.clone(),
            client,
            notifier,
            Pacer::fixed(settings.inter_message_delay),
            settings.fetch_timeout,
        );
        Self {
            store,
            pipeline,
            pool: WorkerPool::new(settings.worker_pool_size),
            tick_interval: settings.tick_interval,
        }
    }

    /// Run one cycle: query due subscriptions and poll them all.
    ///
    /// Returns only after every job of the cycle has completed. A failed
    /// due query is returned as-is; nothing is polled in that case.
    pub async fn run_cycle(&self) -> Result<CycleReport, StoreError> {
        let due = self.store.query_due().await?;
        if due.is_empty() {
            debug!("No subscriptions due");
            return Ok(CycleReport::default());
        }

        info!(due = due.len(), "Polling due subscriptions");
        let report = self.pool.run(&self.pipeline, due).await;
        info!(
            due = report.due,
            delivered = report.delivered,
            delivery_failures = report.delivery_failures,
            fetch_failures = report.fetch_failures,
            no_new_items = report.no_new_items,
            unsaved = report.unsaved,
            "Poll cycle complete"
        );
        Ok(report)
    }

    /// Tick until `shutdown` fires. The first cycle starts immediately.
    ///
    /// A shutdown request during a cycle takes effect once that cycle is done.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        let mut ticker = tokio::time::interval(self.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    info!("Scheduler shutdown requested");
                    break;
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.run_cycle().await {
                        warn!(error = %e, "Failed to query due subscriptions, skipping cycle");
                    }
                }
            }
        }
    }

    /// Run the tick loop on its own task.
    pub fn spawn(self) -> SchedulerHandle {
        let (cancel_tx, cancel_rx) = broadcast::channel(1);
        let join = tokio::spawn(self.run(cancel_rx));
        SchedulerHandle { cancel_tx, join }
    }
}

/// Handle to a spawned [`Scheduler`].
pub struct SchedulerHandle {
    cancel_tx: broadcast::Sender<()>,
    join: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Ask the scheduler to stop and wait for any in-flight cycle to finish.
    pub async fn stop(self) -> Result<(), tokio::task::JoinError> {
        let _ = self.cancel_tx.send(());
        self.join.await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::{FeedItem, FetchError, ParsedFeed};
    use crate::notify::LogNotifier;
    use crate::storage::{Database, DatabaseError, NewSubscription, Subscription};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct OneItem;

    #[async_trait]
    impl FeedClient for OneItem {
        async fn fetch(&self, _url: &str, _timeout: Duration) -> Result<ParsedFeed, FetchError> {
            Ok(ParsedFeed {
                title: None,
                items: vec![FeedItem {
                    item_id: "item-1".to_string(),
                    title: "Hello".to_string(),
                    link: None,
                }],
            })
        }
    }

    /// Fails every due query, counting attempts.
    #[derive(Default)]
    struct BrokenStore {
        queries: AtomicUsize,
    }

    #[async_trait]
    impl SubscriptionStore for BrokenStore {
        async fn query_due(&self) -> Result<Vec<Subscription>, StoreError> {
            self.queries.fetch_add(1, Ordering::SeqCst);
            Err(StoreError::Database(DatabaseError::Invalid(
                "connection lost".to_string(),
            )))
        }

        async fn mark_polled(&self, id: i64, _cursor: Option<&str>) -> Result<(), StoreError> {
            Err(StoreError::NotFound(id))
        }
    }

    fn settings(tick: Duration) -> PollSettings {
        PollSettings {
            tick_interval: tick,
            inter_message_delay: Duration::ZERO,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_run_cycle_polls_due_then_nothing() {
        let db = Arc::new(Database::open(":memory:").await.unwrap());
        for n in 0..3 {
            db.subscribe(&NewSubscription {
                subscriber_id: n,
                source_url: format!("https://example.com/{n}.xml"),
                display_title: None,
                refresh_interval_secs: 3_600,
            })
            .await
            .unwrap();
        }

        let scheduler = Scheduler::new(
            db.clone(),
            Arc::new(OneItem),
            Arc::new(LogNotifier),
            &settings(Duration::from_secs(60)),
        );

        let first = scheduler.run_cycle().await.unwrap();
        assert_eq!(first.due, 3);
        assert_eq!(first.delivered, 3);

        // Everything was just polled with an hour-long interval
        let second = scheduler.run_cycle().await.unwrap();
        assert_eq!(second, CycleReport::default());
    }

    #[tokio::test]
    async fn test_store_failure_does_not_stop_ticking() {
        let store = Arc::new(BrokenStore::default());
        let scheduler = Scheduler::new(
            store.clone(),
            Arc::new(OneItem),
            Arc::new(LogNotifier),
            &settings(Duration::from_millis(10)),
        );

        let handle = scheduler.spawn();
        tokio::time::sleep(Duration::from_millis(100)).await;
        handle.stop().await.unwrap();

        assert!(store.queries.load(Ordering::SeqCst) >= 2);
    }

    #[tokio::test]
    async fn test_stop_ends_idle_scheduler() {
        let db = Arc::new(Database::open(":memory:").await.unwrap());
        let scheduler = Scheduler::new(
            db,
            Arc::new(OneItem),
            Arc::new(LogNotifier),
            &settings(Duration::from_secs(3_600)),
        );

        let handle = scheduler.spawn();
        tokio::time::timeout(Duration::from_secs(5), handle.stop())
            .await
            .expect("scheduler did not stop")
            .unwrap();
    }
}
