
use scraper::{Html, Selector};
use tracing::debug;

/// Elements whose text is never visible content
const NON_CONTENT_TAGS: &str = "script, style, noscript";

/// Reduce an HTML page to its visible text
///
/// Every text node becomes one or more lines. Lines are trimmed, empty lines
/// are dropped and the rest are joined with `\n`.
#[inline]
pub fn clean_html(html: &str) -> String {
    let mut document = Html::parse_document(html);
    remove_non_content(&mut document);

    let text = document
        .root_element()
        .text()
        .collect::<Vec<_>>()
        .join("\n");
    let cleaned = collapse_lines(&text);

    debug!(
        "Cleaned {} bytes of HTML into {} bytes of text",
        html.len(),
        cleaned.len()
    );
    cleaned
}

fn collapse_lines(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn remove_non_content(document: &mut Html) {
    let Ok(selector) = Selector::parse(NON_CONTENT_TAGS) else {
        return;
    };

    // Collect node IDs first to avoid borrowing issues
    let node_ids: Vec<_> = document
        .select(&selector)
        .map(|element| element.id())
        .collect();

    for node_id in node_ids {
        if let Some(mut node) = document.tree.get_mut(node_id) {
            node.detach();
        }
    }
}
