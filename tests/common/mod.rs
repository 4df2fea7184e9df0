//! Fakes shared by the poller integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use feedwatch::feed::{FeedClient, FeedItem, FetchError, ParsedFeed};
use feedwatch::notify::{DeliveryError, Notifier};
use feedwatch::storage::{Database, NewSubscription};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

pub async fn test_db() -> Database {
    Database::open(":memory:").await.unwrap()
}

pub fn feed_url(n: usize) -> String {
    format!("https://feeds.example.com/{n}.xml")
}

pub async fn subscribe(db: &Database, subscriber_id: i64, url: &str) -> i64 {
    db.subscribe(&NewSubscription {
        subscriber_id,
        source_url: url.to_string(),
        display_title: None,
        refresh_interval_secs: 300,
    })
    .await
    .unwrap()
}

/// Newest-first feed with the given item ids.
pub fn feed_with(ids: &[&str]) -> ParsedFeed {
    ParsedFeed {
        title: Some("Fake Feed".to_string()),
        items: ids
            .iter()
            .map(|id| FeedItem {
                item_id: id.to_string(),
                title: format!("Post {id}"),
                link: Some(format!("https://example.com/{id}")),
            })
            .collect(),
    }
}

/// In-memory feed source that tracks how many fetches run at once.
///
/// Every fetch sleeps `delay`. URLs marked slow sleep far longer and so run
/// into the caller's timeout. Unknown URLs answer 404.
#[derive(Default)]
pub struct FakeFeeds {
    feeds: HashMap<String, ParsedFeed>,
    slow: HashSet<String>,
    delay: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    fetches: AtomicUsize,
}

impl FakeFeeds {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            ..Default::default()
        }
    }

    pub fn with_feed(mut self, url: &str, feed: ParsedFeed) -> Self {
        self.feeds.insert(url.to_string(), feed);
        self
    }

    pub fn with_slow(mut self, url: &str) -> Self {
        self.slow.insert(url.to_string());
        self
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FeedClient for FakeFeeds {
    async fn fetch(&self, url: &str, timeout: Duration) -> Result<ParsedFeed, FetchError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let delay = if self.slow.contains(url) {
            Duration::from_secs(30)
        } else {
            self.delay
        };
        let result = tokio::time::timeout(timeout, async {
            tokio::time::sleep(delay).await;
            self.feeds.get(url).cloned().ok_or(FetchError::HttpStatus(404))
        })
        .await
        .unwrap_or(Err(FetchError::Timeout));

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.fetches.fetch_add(1, Ordering::SeqCst);
        result
    }
}

/// Notifier that records every message and when it was sent.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(i64, String, Instant)>>,
}

impl RecordingNotifier {
    pub fn messages(&self) -> Vec<(i64, String)> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|(to, msg, _)| (*to, msg.clone()))
            .collect()
    }

    pub fn messages_to(&self, subscriber_id: i64) -> Vec<String> {
        self.messages()
            .into_iter()
            .filter(|(to, _)| *to == subscriber_id)
            .map(|(_, msg)| msg)
            .collect()
    }

    pub fn send_times(&self) -> Vec<Instant> {
        self.sent.lock().unwrap().iter().map(|(_, _, at)| *at).collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, subscriber_id: i64, message: &str) -> Result<(), DeliveryError> {
        self.sent
            .lock()
            .unwrap()
            .push((subscriber_id, message.to_string(), Instant::now()));
        Ok(())
    }
}
