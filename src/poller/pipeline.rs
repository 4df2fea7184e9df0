use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::feed::{FeedClient, FetchError};
use crate::notify::{feed_display_name, render_message, DeliveryError, Notifier};
use crate::poller::dedup::detect_new_items;
use crate::poller::pacer::Pacer;
use crate::poller::store::{StoreError, SubscriptionStore};
use crate::storage::Subscription;

/// What happened to one subscription's feed in one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// The fetch failed or timed out. The cursor was left alone.
    FetchFailed,
    /// The feed was fetched but held nothing past the cursor.
    NoNewItems,
    /// New items were found and a send was attempted for each.
    Delivered { sent: usize, failed: usize },
}

/// Result of one poll job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobReport {
    pub subscription_id: i64,
    pub outcome: PollOutcome,
    /// Whether the poll time (and cursor) were written back.
    pub state_saved: bool,
}

/// Fetch, detect and deliver for a single subscription.
///
/// Shared by every worker of a cycle. Nothing in here returns an error:
/// each failure is logged and folded into the [`JobReport`], so one bad
/// feed can never stop the others.
pub struct PollPipeline {
    store: Arc<dyn SubscriptionStore>,
    client: Arc<dyn FeedClient>,
    notifier: Arc<dyn Notifier>,
    pacer: Pacer,
    fetch_timeout: Duration,
}

impl PollPipeline {
    pub fn new(
        store: Arc<dyn SubscriptionStore>,
        client: Arc<dyn FeedClient>,
        notifier: Arc<dyn Notifier>,
        pacer: Pacer,
        fetch_timeout: Duration,
    ) -> Self {
        Self {
            store,
            client,
            notifier,
            pacer,
            fetch_timeout,
        }
    }

    pub async fn poll(&self, subscription: &Subscription) -> JobReport {
        let id = subscription.id;
        let url = subscription.source_url.as_str();

        // Enforced here too, so a client that ignores its timeout can't stall the cycle
        let fetched = tokio::time::timeout(
            self.fetch_timeout,
            self.client.fetch(url, self.fetch_timeout),
        )
        .await
        .unwrap_or(Err(FetchError::Timeout));

        let feed = match fetched {
            Ok(feed) => feed,
            Err(e) => {
                warn!(subscription_id = id, url = %url, error = %e, "Feed fetch failed");
                // Record the attempt so a broken feed waits a full interval
                let state_saved = self.save(id, None).await;
                return JobReport {
                    subscription_id: id,
                    outcome: PollOutcome::FetchFailed,
                    state_saved,
                };
            }
        };

        let new_items = detect_new_items(&feed.items, subscription.cursor());

        let outcome = if new_items.is_empty() {
            debug!(subscription_id = id, url = %url, "No new items");
            PollOutcome::NoNewItems
        } else {
            let feed_name = feed_display_name(subscription, &feed);
            let mut sent = 0;
            let mut failed = 0;

            for (n, item) in new_items.oldest_first().enumerate() {
                if n > 0 {
                    self.pacer.pause().await;
                }
                let message = render_message(feed_name, item);
                match self.notifier.send(subscription.subscriber_id, &message).await {
                    Ok(()) => sent += 1,
                    Err(e) => {
                        failed += 1;
                        log_delivery_failure(subscription, &item.item_id, &e);
                    }
                }
            }

            info!(
                subscription_id = id,
                subscriber_id = subscription.subscriber_id,
                sent,
                failed,
                "Delivered new items"
            );
            PollOutcome::Delivered { sent, failed }
        };

        // Cursor advances past every detected item even if some sends failed
        let state_saved = self.save(id, new_items.next_cursor).await;
        JobReport {
            subscription_id: id,
            outcome,
            state_saved,
        }
    }

    async fn save(&self, id: i64, cursor: Option<&str>) -> bool {
        match self.store.mark_polled(id, cursor).await {
            Ok(()) => true,
            Err(StoreError::NotFound(_)) => {
                debug!(subscription_id = id, "Subscription removed during poll");
                false
            }
            Err(e) => {
                warn!(subscription_id = id, error = %e, "Failed to save poll state");
                false
            }
        }
    }
}

fn log_delivery_failure(subscription: &Subscription, item_id: &str, error: &DeliveryError) {
    match error {
        DeliveryError::Unreachable(_) => warn!(
            subscription_id = subscription.id,
            subscriber_id = subscription.subscriber_id,
            item_id = %item_id,
            error = %error,
            "Subscriber unreachable"
        ),
        _ => warn!(
            subscription_id = subscription.id,
            subscriber_id = subscription.subscriber_id,
            item_id = %item_id,
            error = %error,
            "Delivery failed"
        ),
    }
}
