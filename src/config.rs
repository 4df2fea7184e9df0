//! Configuration file parser for ~/.config/feedwatch/config.toml.
//!
//! The config file is optional and a missing file yields `Config::default()`.
//! Unknown keys are accepted by serde but logged as warnings, since they are
//! usually typos.
use secrecy::SecretString;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::feed::DEFAULT_MAX_FEED_SIZE;
use crate::poller::PollSettings;
use crate::storage::NewSubscription;
use crate::util::validate_url;

/// Environment variable that overrides `[notifier] webhook_token`.
pub const WEBHOOK_TOKEN_ENV: &str = "FEEDWATCH_WEBHOOK_TOKEN";

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// Config file exceeds maximum allowed size.
    #[error("Config file too large: {0}")]
    TooLarge(String),

    /// Parsed fine but a value is out of range.
    #[error("Invalid config value: {0}")]
    Invalid(String),
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Top-level daemon configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
///
/// The Debug impl masks the webhook token.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Seconds between checks for due subscriptions.
    pub poll_tick_interval_secs: u64,

    /// Maximum number of feeds polled at once.
    pub worker_pool_size: usize,

    /// Upper bound on a single feed fetch.
    pub fetch_timeout_secs: u64,

    /// Gap between consecutive messages to one subscriber.
    pub inter_message_delay_ms: u64,

    /// Refresh interval for seeded subscriptions that don't set their own.
    pub default_refresh_interval_secs: u64,

    /// Largest feed body accepted, in bytes.
    pub max_feed_size_bytes: usize,

    /// SQLite database file. Defaults to `feedwatch.db` next to the config file.
    pub database_path: Option<PathBuf>,

    pub notifier: NotifierConfig,

    /// Subscriptions synced into the database at startup.
    pub subscriptions: Vec<SeedSubscription>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            poll_tick_interval_secs: 60,
            worker_pool_size: 5,
            fetch_timeout_secs: 30,
            inter_message_delay_ms: 100,
            default_refresh_interval_secs: 300,
            max_feed_size_bytes: DEFAULT_MAX_FEED_SIZE,
            database_path: None,
            notifier: NotifierConfig::default(),
            subscriptions: Vec::new(),
        }
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("poll_tick_interval_secs", &self.poll_tick_interval_secs)
            .field("worker_pool_size", &self.worker_pool_size)
            .field("fetch_timeout_secs", &self.fetch_timeout_secs)
            .field("inter_message_delay_ms", &self.inter_message_delay_ms)
            .field(
                "default_refresh_interval_secs",
                &self.default_refresh_interval_secs,
            )
            .field("max_feed_size_bytes", &self.max_feed_size_bytes)
            .field("database_path", &self.database_path)
            .field("notifier", &self.notifier)
            .field("subscriptions", &self.subscriptions)
            .finish()
    }
}

/// `[notifier]` table.
#[derive(Clone, Default, Deserialize)]
#[serde(default)]
pub struct NotifierConfig {
    /// Endpoint messages are POSTed to. Without one, messages are only logged.
    pub webhook_url: Option<String>,

    /// Bearer token for the webhook. The env var takes precedence.
    pub webhook_token: Option<String>,
}

impl std::fmt::Debug for NotifierConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotifierConfig")
            .field("webhook_url", &self.webhook_url)
            .field(
                "webhook_token",
                &self.webhook_token.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

/// One `[[subscriptions]]` entry.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct SeedSubscription {
    pub subscriber_id: i64,
    pub url: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub refresh_interval_secs: Option<u64>,
}

const KNOWN_KEYS: &[&str] = &[
    "poll_tick_interval_secs",
    "worker_pool_size",
    "fetch_timeout_secs",
    "inter_message_delay_ms",
    "default_refresh_interval_secs",
    "max_feed_size_bytes",
    "database_path",
    "notifier",
    "subscriptions",
];

const KNOWN_NOTIFIER_KEYS: &[&str] = &["webhook_url", "webhook_token"];

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    /// Load and validate configuration from a TOML file.
    ///
    /// - Missing or empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Out-of-range values → `Err(ConfigError::Invalid)`
    /// - Unknown keys → accepted, logged as warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        // Check size before reading so a huge file can't exhaust memory
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // Deleted between metadata and read
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        let config = Self::parse(&content)?;
        tracing::info!(
            path = %path.display(),
            subscriptions = config.subscriptions.len(),
            "Loaded configuration"
        );
        Ok(config)
    }

    /// Parse and validate TOML text.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        if let Ok(raw) = content.parse::<toml::Table>() {
            warn_unknown_keys(&raw);
        }

        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the poller can't run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let non_zero = [
            ("poll_tick_interval_secs", self.poll_tick_interval_secs),
            ("worker_pool_size", self.worker_pool_size as u64),
            ("fetch_timeout_secs", self.fetch_timeout_secs),
            (
                "default_refresh_interval_secs",
                self.default_refresh_interval_secs,
            ),
            ("max_feed_size_bytes", self.max_feed_size_bytes as u64),
        ];
        for (key, value) in non_zero {
            if value == 0 {
                return Err(ConfigError::Invalid(format!("{key} must be greater than 0")));
            }
        }

        if self.fetch_timeout_secs >= self.poll_tick_interval_secs {
            tracing::warn!(
                fetch_timeout_secs = self.fetch_timeout_secs,
                poll_tick_interval_secs = self.poll_tick_interval_secs,
                "Fetch timeout is not shorter than the tick interval; slow feeds will delay cycles"
            );
        }

        if let Some(url) = &self.notifier.webhook_url {
            url::Url::parse(url)
                .map_err(|e| ConfigError::Invalid(format!("notifier.webhook_url: {e}")))?;
        }

        self.seed_subscriptions().map(|_| ())
    }

    pub fn poll_settings(&self) -> PollSettings {
        PollSettings {
            tick_interval: Duration::from_secs(self.poll_tick_interval_secs),
            worker_pool_size: self.worker_pool_size,
            fetch_timeout: Duration::from_secs(self.fetch_timeout_secs),
            inter_message_delay: Duration::from_millis(self.inter_message_delay_ms),
        }
    }

    /// The `[[subscriptions]]` list as store records, URLs validated.
    pub fn seed_subscriptions(&self) -> Result<Vec<NewSubscription>, ConfigError> {
        self.subscriptions
            .iter()
            .map(|seed| {
                let url = validate_url(&seed.url).map_err(|e| {
                    ConfigError::Invalid(format!("subscription url {:?}: {e}", seed.url))
                })?;
                let interval = seed
                    .refresh_interval_secs
                    .unwrap_or(self.default_refresh_interval_secs);
                if interval == 0 {
                    return Err(ConfigError::Invalid(format!(
                        "subscription {:?}: refresh_interval_secs must be greater than 0",
                        seed.url
                    )));
                }
                let refresh_interval_secs = i64::try_from(interval).map_err(|_| {
                    ConfigError::Invalid(format!(
                        "subscription {:?}: refresh_interval_secs is too large",
                        seed.url
                    ))
                })?;

                Ok(NewSubscription {
                    subscriber_id: seed.subscriber_id,
                    source_url: url.to_string(),
                    display_title: seed
                        .title
                        .as_deref()
                        .map(str::trim)
                        .filter(|t| !t.is_empty())
                        .map(str::to_string),
                    refresh_interval_secs,
                })
            })
            .collect()
    }

    /// Webhook token from `FEEDWATCH_WEBHOOK_TOKEN`, else from the file.
    pub fn webhook_token(&self) -> Option<SecretString> {
        resolve_token(
            std::env::var(WEBHOOK_TOKEN_ENV).ok(),
            self.notifier.webhook_token.as_deref(),
        )
    }
}

fn resolve_token(env: Option<String>, file: Option<&str>) -> Option<SecretString> {
    env.filter(|t| !t.trim().is_empty())
        .or_else(|| file.map(str::to_string).filter(|t| !t.trim().is_empty()))
        .map(SecretString::from)
}

fn warn_unknown_keys(raw: &toml::Table) {
    for key in raw.keys() {
        if !KNOWN_KEYS.contains(&key.as_str()) {
            tracing::warn!(key = %key, "Unknown key in config file, ignoring");
        }
    }
    if let Some(toml::Value::Table(notifier)) = raw.get("notifier") {
        for key in notifier.keys() {
            if !KNOWN_NOTIFIER_KEYS.contains(&key.as_str()) {
                tracing::warn!(key = %format!("notifier.{key}"), "Unknown key in config file, ignoring");
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
