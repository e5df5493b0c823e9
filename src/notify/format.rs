use html_escape::{encode_single_quoted_attribute, encode_text};

use crate::ingest::types::{Item, Source};

/// Telegram HTML message for one new item. Empty timestamp or content
/// sections are left out.
pub fn format_item(source: &Source, item: &Item) -> String {
    let mut sections = vec![format!(
        "🔔 <b>New post from @{}</b>",
        encode_text(source.as_str())
    )];
    if !item.timestamp.is_empty() {
        sections.push(format!("📅 {}", encode_text(&item.timestamp)));
    }
    if !item.content.is_empty() {
        sections.push(format!("💬 {}", encode_text(&item.content)));
    }
    if !item.url.is_empty() {
        sections.push(format!(
            "🔗 <a href='{}'>Open post</a>",
            encode_single_quoted_attribute(&item.url)
        ));
    }
    sections.join("\n\n")
}
