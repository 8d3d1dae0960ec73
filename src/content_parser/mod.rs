//! HTML content extraction: title, meta description, visible text and
//! outbound links.
//!
//! Parsing is forgiving (tag-soup tolerant) via `scraper`/`html5ever`,
//! matching how browsers and search engine crawlers handle malformed
//! markup rather than rejecting it.

use crate::imurl::ImUrl;
use crate::url_normalizer;
use scraper::{Html, Selector};

/// A parsed page, ready for indexing and link discovery.
#[derive(Debug, Clone)]
pub struct ParsedPage {
    pub title: Option<String>,
    pub meta_description: Option<String>,
    pub text: String,
    pub links: Vec<ImUrl>,
}

/// Stateless HTML parser. Cheap to construct; holds no per-page state.
#[derive(Debug, Default, Clone, Copy)]
pub struct ContentParser;

impl ContentParser {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Parse `html`, resolving relative links against `base`.
    #[must_use]
    pub fn parse(&self, html: &str, base: &ImUrl) -> ParsedPage {
        let document = Html::parse_document(html);

        ParsedPage {
            title: extract_title(&document),
            meta_description: extract_meta_description(&document),
            text: extract_text(&document),
            links: extract_links(&document, base),
        }
    }
}

/// First `<title>` text under the first `<head>`.
fn extract_title(document: &Html) -> Option<String> {
    let head_sel = Selector::parse("head").ok()?;
    let title_sel = Selector::parse("title").ok()?;
    let head = document.select(&head_sel).next()?;
    let title = head.select(&title_sel).next()?;
    let text: String = title.text().collect();
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// First `<meta name="description" content="...">`, encountered in
/// document (pre-)order.
fn extract_meta_description(document: &Html) -> Option<String> {
    let sel = Selector::parse(r#"meta[name="description" i]"#).ok()?;
    document
        .select(&sel)
        .find_map(|el| el.value().attr("content"))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Pre-order concatenation of visible text nodes, skipping the contents
/// of `<script>` and `<style>` subtrees entirely. Excludes by structural
/// position (ancestor check), not by string content, so a visible text
/// node that happens to match a script/style node's text (e.g. two
/// whitespace-only nodes) is never dropped by mistake.
fn extract_text(document: &Html) -> String {
    let mut out = String::new();
    for node in document.root_element().descendants() {
        let Some(text) = node.value().as_text() else { continue };
        let under_script_or_style = node.ancestors().any(|ancestor| {
            ancestor.value().as_element().is_some_and(|el| matches!(el.name(), "script" | "style"))
        });
        if under_script_or_style {
            continue;
        }
        out.push_str(text);
        out.push(' ');
    }
    out.trim().to_string()
}

/// Every `<a href>` in the document, normalized and validated against
/// `base`. Invalid or unresolvable hrefs are silently dropped.
fn extract_links(document: &Html, base: &ImUrl) -> Vec<ImUrl> {
    let Ok(sel) = Selector::parse("a[href]") else {
        return Vec::new();
    };

    document
        .select(&sel)
        .filter_map(|el| el.value().attr("href"))
        .filter_map(|href| url_normalizer::normalize(href, Some(base)).ok())
        .filter(|url| url_normalizer::is_valid(url.as_str()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> ImUrl {
        ImUrl::parse("https://example.com/dir/page").unwrap()
    }

    #[test]
    fn extracts_title_from_head() {
        let html = "<html><head><title>  Hello World  </title></head><body></body></html>";
        let parsed = ContentParser::new().parse(html, &base());
        assert_eq!(parsed.title.as_deref(), Some("Hello World"));
    }

    #[test]
    fn missing_title_is_none() {
        let html = "<html><head></head><body><p>hi</p></body></html>";
        let parsed = ContentParser::new().parse(html, &base());
        assert_eq!(parsed.title, None);
    }

    #[test]
    fn extracts_meta_description() {
        let html = r#"<html><head><meta name="description" content="A test page."></head></html>"#;
        let parsed = ContentParser::new().parse(html, &base());
        assert_eq!(parsed.meta_description.as_deref(), Some("A test page."));
    }

    #[test]
    fn text_excludes_script_and_style() {
        let html = "<html><body><p>Visible</p><script>var x = 1;</script><style>.a{}</style></body></html>";
        let parsed = ContentParser::new().parse(html, &base());
        assert!(parsed.text.contains("Visible"));
        assert!(!parsed.text.contains("var x"));
        assert!(!parsed.text.contains(".a{}"));
    }

    #[test]
    fn text_matching_script_contents_elsewhere_is_kept() {
        // A whitespace-only text node between block tags has the exact
        // same string as the indentation whitespace around the <script>
        // block; a string-membership filter would drop it too.
        let html = "<html><body>\n    <p>Before</p>\n    <script>\n    </script>\n    <p>After</p>\n</body></html>";
        let parsed = ContentParser::new().parse(html, &base());
        assert!(parsed.text.contains("Before"));
        assert!(parsed.text.contains("After"));
    }

    #[test]
    fn extracts_and_resolves_relative_links() {
        let html = r#"<html><body><a href="sub/thing">link</a><a href="/abs">abs</a></body></html>"#;
        let parsed = ContentParser::new().parse(html, &base());
        let urls: Vec<&str> = parsed.links.iter().map(ImUrl::as_str).collect();
        assert!(urls.contains(&"https://example.com/dir/sub/thing"));
        assert!(urls.contains(&"https://example.com/abs"));
    }

    #[test]
    fn drops_javascript_and_mailto_links() {
        let html = r#"<html><body><a href="javascript:void(0)">x</a><a href="mailto:a@b.com">y</a></body></html>"#;
        let parsed = ContentParser::new().parse(html, &base());
        assert!(parsed.links.is_empty());
    }

    #[test]
    fn malformed_html_still_parses() {
        let html = "<html><body><p>unclosed<div>nested";
        let parsed = ContentParser::new().parse(html, &base());
        assert!(parsed.text.contains("unclosed"));
    }
}
