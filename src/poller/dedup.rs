//! New-item detection against a subscription's cursor.
//!
//! Feeds list items newest first, so everything newer than the cursor is a
//! prefix of the fetched list. Detection is a pure function over that list.

use crate::feed::FeedItem;

/// Result of comparing a fetched feed against the stored cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NewItems<'a> {
    /// Items to deliver, newest first.
    pub items: &'a [FeedItem],
    /// Cursor to store: the newest fetched item, `None` for an empty feed.
    pub next_cursor: Option<&'a str>,
}

impl<'a> NewItems<'a> {
    /// Items in delivery order (oldest first).
    pub fn oldest_first(&self) -> impl Iterator<Item = &'a FeedItem> {
        self.items.iter().rev()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Work out which fetched items the subscriber has not seen.
///
/// - No cursor (first poll): only the newest item, so a new subscriber is
///   not flooded with the feed's whole backlog.
/// - Cursor found: every item before it.
/// - Cursor not found (the feed has dropped it): every item present. This
///   can repeat items a subscriber already received if the feed both pruned
///   and reordered its history; that trade-off favours never losing items.
pub fn detect_new_items<'a>(fetched: &'a [FeedItem], cursor: Option<&str>) -> NewItems<'a> {
    let count = match cursor.filter(|c| !c.is_empty()) {
        None => fetched.len().min(1),
        Some(cursor) => fetched
            .iter()
            .position(|item| item.item_id == cursor)
            .unwrap_or(fetched.len()),
    };

    NewItems {
        items: &fetched[..count],
        next_cursor: fetched.first().map(|item| item.item_id.as_str()),
    }
}
