use std::borrow::Cow;

use crate::feed::{FeedItem, ParsedFeed};
use crate::storage::Subscription;
use crate::util::{escape_html, strip_control_chars, truncate_to_width};

/// Longest title or feed name, in display columns, that goes into a message.
pub const MAX_TITLE_WIDTH: usize = 256;

const UNTITLED_ITEM: &str = "New post";

/// Name shown above each delivered item: the subscriber's own title,
/// else the feed's title, else the source URL.
pub fn feed_display_name<'a>(subscription: &'a Subscription, feed: &'a ParsedFeed) -> &'a str {
    subscription
        .custom_title()
        .or(feed.title.as_deref())
        .unwrap_or(&subscription.source_url)
}

/// Render one item as an HTML message body.
///
/// ```text
/// <b>Feed name</b>
///
/// Item title
///
/// <a href="https://...">Read more</a>
/// ```
pub fn render_message(feed_name: &str, item: &FeedItem) -> String {
    let title = if item.title.trim().is_empty() {
        UNTITLED_ITEM
    } else {
        item.title.as_str()
    };

    let mut message = format!(
        "<b>{}</b>\n\n{}",
        sanitize(feed_name),
        sanitize(title)
    );
    if let Some(link) = item.link.as_deref().filter(|l| !l.is_empty()) {
        message.push_str(&format!(
            "\n\n<a href=\"{}\">Read more</a>",
            escape_html(&strip_control_chars(link))
        ));
    }
    message
}

fn sanitize(text: &str) -> String {
    let clean = strip_control_chars(text);
    let short: Cow<'_, str> = truncate_to_width(clean.trim(), MAX_TITLE_WIDTH);
    escape_html(&short).into_owned()
}
