use feed_rs::parser::{self, ParseFeedError};
use sha2::{Digest, Sha256};

/// One entry of a fetched feed. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedItem {
    /// Stable identifier: the entry's guid/id, else its link, else a content hash.
    pub item_id: String,
    pub title: String,
    pub link: Option<String>,
}

/// A parsed feed document, items in document order (newest first).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedFeed {
    /// The feed's own title, used when a subscription has none.
    pub title: Option<String>,
    pub items: Vec<FeedItem>,
}

impl ParsedFeed {
    /// Identifier of the newest item, if the feed has any.
    pub fn newest_item_id(&self) -> Option<&str> {
        self.items.first().map(|item| item.item_id.as_str())
    }
}

/// Parse RSS 0.9x/1.0/2.0, Atom or JSON Feed bytes.
///
/// Entry order is preserved exactly as published.
pub fn parse_feed(bytes: &[u8]) -> Result<ParsedFeed, ParseFeedError> {
    // feed-rs would otherwise invent ids for guid-less entries (title hash or
    // random UUID). Leave them as the link, or empty so `item_id` can hash.
    let feed = parser::Builder::new()
        .id_generator(|links, _title, _uri| {
            links
                .first()
                .map(|l| l.href.trim().to_string())
                .unwrap_or_default()
        })
        .build()
        .parse(bytes)?;

    let title = feed
        .title
        .map(|t| t.content.trim().to_string())
        .filter(|t| !t.is_empty());

    let items = feed
        .entries
        .into_iter()
        .map(|entry| {
            let link = entry
                .links
                .first()
                .map(|l| l.href.trim().to_string())
                .filter(|href| !href.is_empty());
            let title = entry
                .title
                .map(|t| t.content.trim().to_string())
                .unwrap_or_default();
            let published = entry.published.or(entry.updated).map(|dt| dt.timestamp());
            let item_id = item_id(&entry.id, link.as_deref(), &title, published);

            FeedItem {
                item_id,
                title,
                link,
            }
        })
        .collect();

    Ok(ParsedFeed { title, items })
}

/// First non-empty of the entry id and its link. Entries with neither get a
/// hash of their title and date so the cursor still has something to match.
fn item_id(existing: &str, link: Option<&str>, title: &str, published: Option<i64>) -> String {
    let trimmed = existing.trim();
    if !trimmed.is_empty() {
        return trimmed.to_string();
    }
    if let Some(link) = link {
        return link.to_string();
    }

    let input = format!(
        "{}|{}",
        title,
        published.map(|p| p.to_string()).unwrap_or_default()
    );
    let hash = Sha256::digest(input.as_bytes());
    format!("{:x}", hash)
}
