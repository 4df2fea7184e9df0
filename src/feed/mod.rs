//! Feed retrieval: HTTP fetching and RSS/Atom parsing.
//!
//! - `parser`: converts a feed document into ordered [`FeedItem`]s using `feed-rs`
//! - `fetcher`: the [`FeedClient`] seam and its reqwest-backed implementation
//!
//! Items are always returned in document order, which feeds publish newest
//! first. The poller's cursor logic depends on that ordering.

mod fetcher;
mod parser;

pub use fetcher::{build_http_client, FeedClient, FetchError, HttpFeedClient, DEFAULT_MAX_FEED_SIZE};
pub use parser::{parse_feed, FeedItem, ParsedFeed};
