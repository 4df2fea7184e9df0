//! Message delivery to subscribers.
//!
//! The poller only sees the [`Notifier`] trait. Two implementations ship
//! with the crate: [`WebhookNotifier`] posts each message as JSON to an
//! HTTP endpoint (a chat bot bridge, for example) and [`LogNotifier`]
//! writes messages to the log, which is what runs when no webhook is
//! configured.

mod render;
mod webhook;

use async_trait::async_trait;
use thiserror::Error;

pub use render::{feed_display_name, render_message, MAX_TITLE_WIDTH};
pub use webhook::WebhookNotifier;

/// A single failed send. Never retried within a cycle.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// The endpoint answered but refused the message
    #[error("Delivery rejected with status {status}")]
    Rejected { status: u16 },
    /// The request never completed (connect, TLS, timeout)
    #[error("Delivery transport error: {0}")]
    Transport(#[from] reqwest::Error),
    /// The recipient can no longer be reached (blocked, deleted, ...)
    #[error("Recipient {0} is unreachable")]
    Unreachable(i64),
}

/// Sends one rendered message to one subscriber.
///
/// Implementations make exactly one attempt per call.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, subscriber_id: i64, message: &str) -> Result<(), DeliveryError>;
}

/// Writes every message to the log at `info` level.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, subscriber_id: i64, message: &str) -> Result<(), DeliveryError> {
        tracing::info!(subscriber_id, message = %message, "Delivering message");
        Ok(())
    }
}
