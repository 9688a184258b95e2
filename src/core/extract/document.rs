//! HTML → title/text the way the collector derives them.

use indexmap::IndexMap;
use scraper::{Html, Node, Selector};

/// Title used when a page has none
pub const NO_TITLE: &str = "No Title";

/// Characters kept in a record snippet
pub const SNIPPET_CHARS: usize = 2000;

/// Elements whose text is not page content
const SKIPPED_PARENTS: &[&str] = &["script", "style", "noscript", "template"];

/// Title and stripped text of an HTML document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentText
{
    pub title: String,
    /// Trimmed text nodes joined by single spaces
    pub text: String,
}

impl DocumentText
{
    pub fn from_html(markup: &str) -> Self
    {
        let doc = Html::parse_document(markup);

        let title = Selector::parse("title")
            .ok()
            .and_then(|sel| {
                doc.select(&sel)
                    .next()
            })
            .map(|t| {
                t.text()
                    .collect::<String>()
            })
            .map(|t| {
                t.trim()
                    .to_string()
            })
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| NO_TITLE.to_string());

        let mut parts: Vec<&str> = Vec::new();
        for node in doc
            .root_element()
            .descendants()
        {
            let Node::Text(text) = node.value()
            else
            {
                continue;
            };

            let hidden = node
                .ancestors()
                .filter_map(|a| {
                    a.value()
                        .as_element()
                })
                .any(|el| SKIPPED_PARENTS.contains(&el.name()));
            if hidden
            {
                continue;
            }

            let t = text.trim();
            if !t.is_empty()
            {
                parts.push(t);
            }
        }

        Self { title, text: parts.join(" ") }
    }

    /// Count of `\w+` runs
    pub fn word_count(&self) -> usize
    {
        self.text
            .split(|c: char| !(c.is_alphanumeric() || c == '_'))
            .filter(|w| !w.is_empty())
            .count()
    }
}

/// Leading `SNIPPET_CHARS` characters, cut on a char boundary
pub fn snippet(text: &str) -> &str
{
    match text
        .char_indices()
        .nth(SNIPPET_CHARS)
    {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Most frequent words of four or more characters, ties in first-seen order
pub fn keyword_summary(
    text: &str,
    top_n: usize,
) -> Vec<String>
{
    let lower = text.to_lowercase();
    let mut freq: IndexMap<&str, usize> = IndexMap::new();

    for word in lower
        .split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|w| {
            w.chars()
                .count()
                >= 4
        })
    {
        *freq
            .entry(word)
            .or_default() += 1;
    }

    // Stable sort keeps first-seen order among equal counts
    let mut ranked: Vec<(&str, usize)> = freq
        .into_iter()
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1));

    ranked
        .into_iter()
        .take(top_n)
        .map(|(w, _)| w.to_string())
        .collect()
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn title_and_text_from_markup()
    {
        let html = r#"<html><head><title>  Market Listing </title>
            <style>body { color: red }</style></head>
            <body><h1>Buy</h1>  <p>XTC <b>here</b></p><script>var x = 1;</script></body></html>"#;
        let doc = DocumentText::from_html(html);

        assert_eq!(doc.title, "Market Listing");
        assert_eq!(doc.text, "Market Listing Buy XTC here");
        assert_eq!(doc.word_count(), 5);
    }

    #[test]
    fn missing_title_falls_back()
    {
        let doc = DocumentText::from_html("<p>only text</p>");
        assert_eq!(doc.title, NO_TITLE);
        assert_eq!(doc.text, "only text");
    }

    #[test]
    fn snippet_respects_char_boundaries()
    {
        let long = "é".repeat(SNIPPET_CHARS + 10);
        assert_eq!(
            snippet(&long)
                .chars()
                .count(),
            SNIPPET_CHARS
        );
        assert_eq!(snippet("short"), "short");
    }

    #[test]
    fn keyword_summary_ranks_by_frequency()
    {
        let text = "escrow market vendor market escrow market tiny a an";
        assert_eq!(keyword_summary(text, 2), ["market", "escrow"]);
        assert_eq!(keyword_summary(text, 10), ["market", "escrow", "vendor", "tiny"]);
    }
}
