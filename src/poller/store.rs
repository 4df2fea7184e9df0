use async_trait::async_trait;
use thiserror::Error;

use crate::storage::{Database, DatabaseError, Subscription};

/// Failure reading the due set or writing poll state.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The subscription was removed while its job was running
    #[error("Subscription {0} no longer exists")]
    NotFound(i64),
    #[error(transparent)]
    Database(#[from] DatabaseError),
}

/// The poller's view of subscription storage.
///
/// Only the due query and the poll-state write are needed; creating,
/// editing and removing subscriptions happens elsewhere.
#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    /// Every non-paused subscription whose refresh interval has elapsed.
    async fn query_due(&self) -> Result<Vec<Subscription>, StoreError>;

    /// Set `last_polled_at` to now and, when given, replace the cursor.
    async fn mark_polled(&self, id: i64, cursor: Option<&str>) -> Result<(), StoreError>;
}

#[async_trait]
impl SubscriptionStore for Database {
    async fn query_due(&self) -> Result<Vec<Subscription>, StoreError> {
        let now = chrono::Utc::now().timestamp();
        Ok(self.query_due_subscriptions(now).await?)
    }

    async fn mark_polled(&self, id: i64, cursor: Option<&str>) -> Result<(), StoreError> {
        let now = chrono::Utc::now().timestamp();
        if Database::mark_polled(self, id, now, cursor).await? {
            Ok(())
        } else {
            Err(StoreError::NotFound(id))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::NewSubscription;

    #[tokio::test]
    async fn test_database_store_round_trip() {
        let db = Database::open(":memory:").await.unwrap();
        let id = db
            .subscribe(&NewSubscription {
                subscriber_id: 1,
                source_url: "https://example.com/rss".to_string(),
                display_title: None,
                refresh_interval_secs: 3_600,
            })
            .await
            .unwrap();

        let store: &dyn SubscriptionStore = &db;
        let due = store.query_due().await.unwrap();
        assert_eq!(due.len(), 1);

        store.mark_polled(id, Some("item-1")).await.unwrap();

        // Polled just now with an hour-long interval
        assert!(store.query_due().await.unwrap().is_empty());
        let sub = db.get_subscription(id).await.unwrap().unwrap();
        assert_eq!(sub.last_seen_item_id.as_deref(), Some("item-1"));
        assert!(sub.last_polled_at.is_some());
    }

    #[tokio::test]
    async fn test_mark_polled_unknown_id() {
        let db = Database::open(":memory:").await.unwrap();
        let store: &dyn SubscriptionStore = &db;
        assert!(matches!(
            store.mark_polled(404, None).await,
            Err(StoreError::NotFound(404))
        ));
    }
}
