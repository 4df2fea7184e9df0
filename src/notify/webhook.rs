use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;

use super::{DeliveryError, Notifier};

/// Per-message request timeout.
const SEND_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Serialize)]
struct WebhookPayload<'a> {
    subscriber_id: i64,
    text: &'a str,
    parse_mode: &'static str,
}

/// Posts each message as JSON to a webhook:
///
/// ```json
/// {"subscriber_id": 42, "text": "<b>Feed</b>...", "parse_mode": "HTML"}
/// ```
///
/// `403 Forbidden` and `410 Gone` mean the recipient is gone and map to
/// [`DeliveryError::Unreachable`]; any other non-2xx is
/// [`DeliveryError::Rejected`].
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
    token: Option<SecretString>,
}

impl WebhookNotifier {
    pub fn new(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
            token: None,
        }
    }

    /// Send `Authorization: Bearer <token>` with every request.
    pub fn with_token(mut self, token: SecretString) -> Self {
        self.token = Some(token);
        self
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn send(&self, subscriber_id: i64, message: &str) -> Result<(), DeliveryError> {
        let payload = WebhookPayload {
            subscriber_id,
            text: message,
            parse_mode: "HTML",
        };

        let mut request = self
            .client
            .post(&self.url)
            .timeout(SEND_TIMEOUT)
            .json(&payload);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token.expose_secret());
        }

        let response = request.send().await?;
        match response.status() {
            status if status.is_success() => Ok(()),
            StatusCode::FORBIDDEN | StatusCode::GONE => {
                Err(DeliveryError::Unreachable(subscriber_id))
            }
            status => Err(DeliveryError::Rejected {
                status: status.as_u16(),
            }),
        }
    }
}
