//! feedwatch polls RSS, Atom and JSON feeds on behalf of subscribers and
//! delivers each new item to them once.
//!
//! Subscriptions live in SQLite ([`storage`]). The [`poller`] wakes on a
//! fixed tick, fetches every due feed through a bounded worker pool
//! ([`feed`]), works out which items are new against a per-subscription
//! cursor, and hands rendered messages to a [`notify::Notifier`].

pub mod config;
pub mod feed;
pub mod notify;
pub mod poller;
pub mod storage;
pub mod util;
