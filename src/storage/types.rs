use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Database-specific errors with user-friendly messages
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Another instance of the application has locked the database
    #[error("Another instance of feedwatch appears to be running. Please stop it and try again.")]
    InstanceLocked,

    /// Migration failed
    #[error("Database migration failed: {0}")]
    Migration(String),

    /// A write was rejected because it would break a subscription invariant
    #[error("Invalid subscription data: {0}")]
    Invalid(String),

    /// Generic database error
    #[error("Database error: {0}")]
    Other(#[from] sqlx::Error),
}

impl DatabaseError {
    /// Check if a sqlx error indicates database locking
    pub(crate) fn from_sqlx(err: sqlx::Error) -> Self {
        if is_lock_error(&err.to_string()) {
            return DatabaseError::InstanceLocked;
        }
        DatabaseError::Other(err)
    }
}

/// SQLITE_BUSY (5), SQLITE_LOCKED (6) and SQLITE_CANTOPEN (14) all surface as one of these.
pub(crate) fn is_lock_error(message: &str) -> bool {
    let message = message.to_lowercase();
    message.contains("database is locked")
        || message.contains("database table is locked")
        || message.contains("sqlite_busy")
        || message.contains("sqlite_locked")
        || message.contains("unable to open database file")
}

// ============================================================================
// Data Structures
// ============================================================================

/// One (subscriber, feed source) binding as stored in the `subscriptions` table.
///
/// `last_polled_at` and `last_seen_item_id` belong to the poller; every other
/// mutable field is owned by user-facing actions.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Subscription {
    pub id: i64,
    pub subscriber_id: i64,
    pub source_url: String,
    /// Empty or missing means "use the feed's own title".
    pub display_title: Option<String>,
    /// Always strictly positive (enforced by a CHECK constraint).
    pub refresh_interval_secs: i64,
    /// Unix timestamp (seconds) of the most recent poll attempt.
    pub last_polled_at: Option<i64>,
    /// Identifier of the newest item already delivered.
    pub last_seen_item_id: Option<String>,
    pub paused: bool,
}

impl Subscription {
    /// Whether this subscription should be polled at `now` (unix seconds).
    ///
    /// Mirrors the SQL predicate used by `Database::query_due_subscriptions`.
    pub fn is_due(&self, now: i64) -> bool {
        if self.paused {
            return false;
        }
        match self.last_polled_at {
            None => true,
            Some(last) => now >= last.saturating_add(self.refresh_interval_secs),
        }
    }

    /// Stored cursor, treating an empty string the same as no cursor.
    pub fn cursor(&self) -> Option<&str> {
        self.last_seen_item_id
            .as_deref()
            .filter(|cursor| !cursor.is_empty())
    }

    /// Display title if one was set by the subscriber.
    pub fn custom_title(&self) -> Option<&str> {
        self.display_title
            .as_deref()
            .map(str::trim)
            .filter(|title| !title.is_empty())
    }
}

/// Input for [`Database::subscribe`](super::Database::subscribe).
#[derive(Debug, Clone)]
pub struct NewSubscription {
    pub subscriber_id: i64,
    pub source_url: String,
    pub display_title: Option<String>,
    pub refresh_interval_secs: i64,
}
