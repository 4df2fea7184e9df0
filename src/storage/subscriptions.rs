use super::schema::Database;
use super::types::{DatabaseError, NewSubscription, Subscription};

const SUBSCRIPTION_COLUMNS: &str = "id, subscriber_id, source_url, display_title, \
     refresh_interval_secs, last_polled_at, last_seen_item_id, paused";

impl Database {
    // ========================================================================
    // Subscription Management
    // ========================================================================

    /// Create a subscription, or update the display title of an existing one.
    ///
    /// The (subscriber, source URL) pair is unique: subscribing twice returns
    /// the same id and leaves cadence, pause state and poll cursor untouched.
    pub async fn subscribe(&self, new: &NewSubscription) -> Result<i64, DatabaseError> {
        if new.refresh_interval_secs <= 0 {
            return Err(DatabaseError::Invalid(format!(
                "refresh interval must be positive, got {}",
                new.refresh_interval_secs
            )));
        }

        let now = chrono::Utc::now().timestamp();
        let id: (i64,) = sqlx::query_as(
            r#"
            INSERT INTO subscriptions
                (subscriber_id, source_url, display_title, refresh_interval_secs, created_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(subscriber_id, source_url) DO UPDATE SET
                display_title = excluded.display_title
            RETURNING id
        "#,
        )
        .bind(new.subscriber_id)
        .bind(&new.source_url)
        .bind(&new.display_title)
        .bind(new.refresh_interval_secs)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(id.0)
    }

    /// Get a single subscription by id
    pub async fn get_subscription(&self, id: i64) -> Result<Option<Subscription>, DatabaseError> {
        let sql = format!("SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions WHERE id = ?");
        let subscription = sqlx::query_as::<_, Subscription>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(subscription)
    }

    /// List a subscriber's subscriptions in creation order
    pub async fn list_subscriptions(
        &self,
        subscriber_id: i64,
    ) -> Result<Vec<Subscription>, DatabaseError> {
        let sql = format!(
            "SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions \
             WHERE subscriber_id = ? ORDER BY created_at, id"
        );
        let subscriptions = sqlx::query_as::<_, Subscription>(&sql)
            .bind(subscriber_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(subscriptions)
    }

    /// Pause or resume polling for a subscription.
    ///
    /// Returns `false` if no subscription has that id.
    pub async fn set_paused(&self, id: i64, paused: bool) -> Result<bool, DatabaseError> {
        let result = sqlx::query("UPDATE subscriptions SET paused = ? WHERE id = ?")
            .bind(paused)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Pause or resume every subscription of one subscriber.
    ///
    /// Returns the number of subscriptions whose state changed.
    pub async fn set_paused_for_subscriber(
        &self,
        subscriber_id: i64,
        paused: bool,
    ) -> Result<u64, DatabaseError> {
        let result =
            sqlx::query("UPDATE subscriptions SET paused = ? WHERE subscriber_id = ? AND paused != ?")
                .bind(paused)
                .bind(subscriber_id)
                .bind(paused)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected())
    }

        /// Change how often a subscription is polled.
    ///
    /// Returns `false` if no subscription has that id.
    pub async fn set_refresh_interval(&self, id: i64, secs: i64) -> Result<bool, DatabaseError> {
        if secs <= 0 {
            return Err(DatabaseError::Invalid(format!(
                "refresh interval must be positive, got {}",
                secs
            )));
        }
        let result = sqlx::query("UPDATE subscriptions SET refresh_interval_secs = ? WHERE id = ?")
            .bind(secs)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete a subscription. Returns `false` if it did not exist.
    pub async fn remove_subscription(&self, id: i64) -> Result<bool, DatabaseError> {
        let result = sqlx::query("DELETE FROM subscriptions WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // ========================================================================
    // Poll State
    // ========================================================================

    /// All non-paused subscriptions whose refresh interval has elapsed at `now`.
    ///
    /// Same predicate as [`Subscription::is_due`]; rows never polled come first.
    pub async fn query_due_subscriptions(
        &self,
        now: i64,
    ) -> Result<Vec<Subscription>, DatabaseError> {
        let sql = format!(
            r#"
            SELECT {SUBSCRIPTION_COLUMNS}
            FROM subscriptions
            WHERE paused = 0
              AND (last_polled_at IS NULL
                   OR last_polled_at + refresh_interval_secs <= ?)
            ORDER BY last_polled_at IS NOT NULL, last_polled_at, id
        "#
        );
        let subscriptions = sqlx::query_as::<_, Subscription>(&sql)
            .bind(now)
            .fetch_all(&self.pool)
            .await?;
        Ok(subscriptions)
    }

    /// Record a poll attempt and optionally advance the cursor.
    ///
    /// A single UPDATE, so the poll time and cursor change together or not at
    /// all. `cursor = None` keeps the stored cursor. Returns `false` if the
    /// subscription was removed in the meantime.
    pub async fn mark_polled(
        &self,
        id: i64,
        polled_at: i64,
        cursor: Option<&str>,
    ) -> Result<bool, DatabaseError> {
        let result = sqlx::query(
            r#"
            UPDATE subscriptions
            SET last_polled_at = ?,
                last_seen_item_id = COALESCE(?, last_seen_item_id)
            WHERE id = ?
        "#,
        )
        .bind(polled_at)
        .bind(cursor)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use crate::storage::{Database, DatabaseError, NewSubscription};
    use pretty_assertions::assert_eq;

    async fn test_db() -> Database {
        Database::open(":memory:").await.unwrap()
    }

    fn new_sub(subscriber_id: i64, url: &str) -> NewSubscription {
        NewSubscription {
            subscriber_id,
            source_url: url.to_string(),
            display_title: None,
            refresh_interval_secs: 300,
        }
    }

    #[tokio::test]
    async fn test_subscribe_then_get() {
        let db = test_db().await;
        let id = db
            .subscribe(&new_sub(7, "https://example.com/feed.xml"))
            .await
            .unwrap();

        let sub = db.get_subscription(id).await.unwrap().unwrap();
        assert_eq!(sub.subscriber_id, 7);
        assert_eq!(sub.source_url, "https://example.com/feed.xml");
        assert_eq!(sub.refresh_interval_secs, 300);
        assert_eq!(sub.last_polled_at, None);
        assert_eq!(sub.last_seen_item_id, None);
        assert!(!sub.paused);
    }

    #[tokio::test]
    async fn test_resubscribe_updates_title_only() {
        let db = test_db().await;
        let id1 = db
            .subscribe(&new_sub(7, "https://example.com/feed.xml"))
            .await
            .unwrap();
        db.mark_polled(id1, 1_000, Some("item-1")).await.unwrap();

        let mut again = new_sub(7, "https://example.com/feed.xml");
        again.display_title = Some("Renamed".to_string());
        again.refresh_interval_secs = 60;
        let id2 = db.subscribe(&again).await.unwrap();

        assert_eq!(id1, id2);
        let sub = db.get_subscription(id1).await.unwrap().unwrap();
        assert_eq!(sub.display_title.as_deref(), Some("Renamed"));
        assert_eq!(sub.refresh_interval_secs, 300);
        assert_eq!(sub.last_seen_item_id.as_deref(), Some("item-1"));
    }

    #[tokio::test]
    async fn test_same_url_different_subscribers_are_distinct() {
        let db = test_db().await;
        let a = db.subscribe(&new_sub(1, "https://example.com/feed.xml")).await.unwrap();
        let b = db.subscribe(&new_sub(2, "https://example.com/feed.xml")).await.unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_zero_interval_rejected() {
        let db = test_db().await;
        let mut sub = new_sub(1, "https://example.com/feed.xml");
        sub.refresh_interval_secs = 0;
        assert!(matches!(
            db.subscribe(&sub).await,
            Err(DatabaseError::Invalid(_))
        ));

        let id = db.subscribe(&new_sub(1, "https://example.com/feed.xml")).await.unwrap();
        assert!(matches!(
            db.set_refresh_interval(id, -5).await,
            Err(DatabaseError::Invalid(_))
        ));
    }

    #[tokio::test]
    async fn test_query_due_respects_interval_and_pause() {
        let db = test_db().await;
        let never = db.subscribe(&new_sub(1, "https://a.example.com/rss")).await.unwrap();
        let recent = db.subscribe(&new_sub(1, "https://b.example.com/rss")).await.unwrap();
        let stale = db.subscribe(&new_sub(1, "https://c.example.com/rss")).await.unwrap();
        let paused = db.subscribe(&new_sub(1, "https://d.example.com/rss")).await.unwrap();

        db.mark_polled(recent, 10_000, None).await.unwrap();
        db.mark_polled(stale, 10_000 - 300, None).await.unwrap();
        db.set_paused(paused, true).await.unwrap();

        let due: Vec<i64> = db
            .query_due_subscriptions(10_000)
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(due, vec![never, stale]);
    }

    #[tokio::test]
    async fn test_query_due_agrees_with_is_due() {
        let db = test_db().await;
        let now = 50_000;
        for (i, last) in [None, Some(now), Some(now - 299), Some(now - 300), Some(now - 301)]
            .into_iter()
            .enumerate()
        {
            let id = db
                .subscribe(&new_sub(1, &format!("https://feed{}.example.com/rss", i)))
                .await
                .unwrap();
            if let Some(last) = last {
                db.mark_polled(id, last, None).await.unwrap();
            }
        }

        let due = db.query_due_subscriptions(now).await.unwrap();
        let all = db.list_subscriptions(1).await.unwrap();
        let expected: Vec<i64> = all.iter().filter(|s| s.is_due(now)).map(|s| s.id).collect();
        let mut actual: Vec<i64> = due.iter().map(|s| s.id).collect();
        actual.sort_unstable();
        assert_eq!(actual, expected);
        assert_eq!(actual.len(), 3);
    }

    #[tokio::test]
    async fn test_mark_polled_without_cursor_keeps_cursor() {
        let db = test_db().await;
        let id = db.subscribe(&new_sub(1, "https://example.com/rss")).await.unwrap();

        assert!(db.mark_polled(id, 100, Some("item-7")).await.unwrap());
        assert!(db.mark_polled(id, 200, None).await.unwrap());

        let sub = db.get_subscription(id).await.unwrap().unwrap();
        assert_eq!(sub.last_polled_at, Some(200));
        assert_eq!(sub.last_seen_item_id.as_deref(), Some("item-7"));
    }

    #[tokio::test]
    async fn test_mark_polled_missing_subscription() {
        let db = test_db().await;
        assert!(!db.mark_polled(999, 100, None).await.unwrap());
    }

    #[tokio::test]
    async fn test_remove_subscription() {
        let db = test_db().await;
        let id = db.subscribe(&new_sub(1, "https://example.com/rss")).await.unwrap();
        assert!(db.remove_subscription(id).await.unwrap());
        assert!(!db.remove_subscription(id).await.unwrap());
        assert!(db.get_subscription(id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_subscriptions_filters_by_subscriber() {
        let db = test_db().await;
        db.subscribe(&new_sub(1, "https://a.example.com/rss")).await.unwrap();
        db.subscribe(&new_sub(2, "https://b.example.com/rss")).await.unwrap();
        db.subscribe(&new_sub(1, "https://c.example.com/rss")).await.unwrap();

        let urls: Vec<String> = db
            .list_subscriptions(1)
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.source_url)
            .collect();
        assert_eq!(urls, vec!["https://a.example.com/rss", "https://c.example.com/rss"]);
    }

    #[tokio::test]
    async fn test_pause_all_for_subscriber() {
        let db = test_db().await;
        let a = db.subscribe(&new_sub(7, "https://example.com/a.xml")).await.unwrap();
        let b = db.subscribe(&new_sub(7, "https://example.com/b.xml")).await.unwrap();
        let other = db.subscribe(&new_sub(8, "https://example.com/a.xml")).await.unwrap();
        db.set_paused(b, true).await.unwrap();

        assert_eq!(db.set_paused_for_subscriber(7, true).await.unwrap(), 1);
        for id in [a, b] {
            assert!(db.get_subscription(id).await.unwrap().unwrap().paused);
        }
        assert!(!db.get_subscription(other).await.unwrap().unwrap().paused);

        let due: Vec<i64> = db
            .query_due_subscriptions(i64::MAX / 2)
            .await
            .unwrap()
            .iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(due, vec![other]);

        assert_eq!(db.set_paused_for_subscriber(7, false).await.unwrap(), 2);
        assert_eq!(db.set_paused_for_subscriber(99, true).await.unwrap(), 0);
    }
}
