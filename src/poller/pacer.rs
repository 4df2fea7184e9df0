use std::time::Duration;

/// Spacing between consecutive messages to the same subscriber.
///
/// A fixed delay keeps a burst of new items under a messaging API's per-chat
/// rate limit. The pause only sits *between* sends; a single message goes out
/// immediately.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pacer {
    delay: Duration,
}

impl Pacer {
    pub fn fixed(delay: Duration) -> Self {
        Self { delay }
    }

    /// No spacing at all. Used by tests and the log notifier.
    pub fn immediate() -> Self {
        Self::fixed(Duration::ZERO)
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Wait out the gap before the next send.
    pub async fn pause(&self) {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
    }
}

impl Default for Pacer {
    fn default() -> Self {
        Self::fixed(Duration::from_millis(100))
    }
}
