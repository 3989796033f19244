//! Shared HTML helpers for the extractors.
//!
//! Everything here is synchronous: `scraper::Html` is not `Send`, so documents
//! are parsed and dropped inside an extractor call, never held across an
//! `.await`.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Node, Selector};
use serde_json::Value;

static WHITESPACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));
static JSON_LD_SEL: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(r#"script[type="application/ld+json"]"#).expect("valid json-ld selector")
});
static META_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("meta").expect("valid meta selector"));
static ANCHOR_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("valid anchor selector"));

/// Elements whose text is never visible content.
const NON_CONTENT: &[&str] = &["script", "style", "noscript", "template", "svg", "iframe"];

/// Site chrome, dropped when only the main content matters.
const CHROME: &[&str] = &["nav", "header", "footer", "aside", "form"];

const BLOCK_ELEMENTS: &[&str] = &[
    "address", "article", "aside", "blockquote", "br", "dd", "details", "div", "dl", "dt",
    "figcaption", "footer", "form", "h1", "h2", "h3", "h4", "h5", "h6", "header", "hr", "li",
    "main", "nav", "ol", "p", "pre", "section", "summary", "table", "td", "th", "tr", "ul",
];

/// Which subtrees to leave out when collecting text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TextScope {
    /// All human-visible text, including header and footer.
    Visible,
    /// Visible text minus navigation, header, footer and forms.
    Content,
}

/// Collapsed visible text of `element`, with block boundaries turned into spaces.
pub(crate) fn element_text(element: ElementRef<'_>, scope: TextScope) -> String {
    let mut out = String::new();
    collect_text(element, scope, &mut out);
    clean_text(&out)
}

/// Visible text of a whole document.
pub(crate) fn document_text(doc: &Html, scope: TextScope) -> String {
    element_text(doc.root_element(), scope)
}

fn collect_text(element: ElementRef<'_>, scope: TextScope, out: &mut String) {
    for child in element.children() {
        if let Some(child_el) = ElementRef::wrap(child) {
            let name = child_el.value().name();
            if NON_CONTENT.contains(&name) || (scope == TextScope::Content && CHROME.contains(&name))
            {
                continue;
            }
            let block = BLOCK_ELEMENTS.contains(&name);
            if block {
                out.push(' ');
            }
            collect_text(child_el, scope, out);
            if block {
                out.push(' ');
            }
        } else if let Node::Text(text) = child.value() {
            out.push_str(text);
        }
    }
}

/// Collapses whitespace runs to single spaces and trims.
pub(crate) fn clean_text(raw: &str) -> String {
    WHITESPACE_RE.replace_all(raw.trim(), " ").into_owned()
}

/// Parses a CSS selector, returning `None` for an invalid one.
pub(crate) fn selector(css: &str) -> Option<Selector> {
    Selector::parse(css).ok()
}

/// Resolves `candidate` against `base_url`. Rejects non-HTTP targets
/// (`mailto:`, `javascript:`, fragments).
pub(crate) fn absolutize_url(base_url: &str, candidate: &str) -> Option<String> {
    let candidate = candidate.trim().replace("&amp;", "&");
    if candidate.is_empty() || candidate.starts_with('#') {
        return None;
    }
    let base = reqwest::Url::parse(base_url).ok()?;
    let mut joined = base.join(&candidate).ok()?;
    if !matches!(joined.scheme(), "http" | "https") {
        return None;
    }
    joined.set_fragment(None);
    Some(joined.into())
}

/// `true` when both URLs share a host, ignoring a leading `www.`.
pub(crate) fn same_site(url: &str, base_url: &str) -> bool {
    let host = |u: &str| {
        reqwest::Url::parse(u)
            .ok()
            .and_then(|u| u.host_str().map(|h| h.trim_start_matches("www.").to_owned()))
    };
    matches!((host(url), host(base_url)), (Some(a), Some(b)) if a == b)
}

/// Every anchor `href` in the document, absolutized against `base_url`.
pub(crate) fn anchors<'a>(doc: &'a Html, base_url: &str) -> Vec<(ElementRef<'a>, String)> {
    doc.select(&ANCHOR_SEL)
        .filter_map(|a| {
            let href = a.value().attr("href")?;
            absolutize_url(base_url, href).map(|url| (a, url))
        })
        .collect()
}

/// `content` of the first `<meta>` whose `name` or `property` equals `key`.
pub(crate) fn meta_content(doc: &Html, key: &str) -> Option<String> {
    doc.select(&META_SEL).find_map(|m| {
        let el = m.value();
        let matches = el
            .attr("name")
            .or_else(|| el.attr("property"))
            .is_some_and(|k| k.eq_ignore_ascii_case(key));
        if !matches {
            return None;
        }
        let content = clean_text(el.attr("content")?);
        (!content.is_empty()).then_some(content)
    })
}

/// All `(name|property, content)` pairs of `<meta>` tags, in document order.
pub(crate) fn meta_pairs(doc: &Html) -> Vec<(String, String)> {
    doc.select(&META_SEL)
        .filter_map(|m| {
            let el = m.value();
            let key = el.attr("name").or_else(|| el.attr("property"))?.trim();
            let content = el.attr("content")?.trim();
            (!key.is_empty()).then(|| (key.to_owned(), content.to_owned()))
        })
        .collect()
}

/// Parsed JSON-LD blocks. Malformed blocks are skipped.
pub(crate) fn json_ld_blocks(doc: &Html) -> Vec<Value> {
    doc.select(&JSON_LD_SEL)
        .filter_map(|script| {
            let raw: String = script.text().collect();
            serde_json::from_str::<Value>(raw.trim()).ok()
        })
        .collect()
}

/// Flattens JSON-LD containers (`@graph`, top-level arrays) into their nodes.
pub(crate) fn json_ld_nodes(blocks: &[Value]) -> Vec<&Value> {
    fn walk<'a>(value: &'a Value, out: &mut Vec<&'a Value>) {
        match value {
            Value::Array(items) => items.iter().for_each(|item| walk(item, out)),
            Value::Object(map) => {
                if let Some(graph) = map.get("@graph") {
                    walk(graph, out);
                }
                out.push(value);
            }
            _ => {}
        }
    }

    let mut out = Vec::new();
    for block in blocks {
        walk(block, &mut out);
    }
    out
}

/// `true` if the node's `@type` is `ty` (string or array form).
pub(crate) fn json_ld_is_type(node: &Value, ty: &str) -> bool {
    match node.get("@type") {
        Some(Value::String(s)) => s.eq_ignore_ascii_case(ty),
        Some(Value::Array(types)) => types
            .iter()
            .filter_map(Value::as_str)
            .any(|s| s.eq_ignore_ascii_case(ty)),
        _ => false,
    }
}

/// Truncates to at most `max_chars` characters on a char boundary.
pub(crate) fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => text[..idx].trim_end().to_owned(),
        None => text.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_text_skips_chrome_and_scripts() {
        let doc = Html::parse_document(
            r"<html><body>
                <header>Menu Cart</header>
                <main><h1>Privacy</h1><p>We   respect<br>your data.</p><script>var x = 1;</script></main>
                <footer>Copyright</footer>
            </body></html>",
        );
        assert_eq!(document_text(&doc, TextScope::Content), "Privacy We respect your data.");
        let visible = document_text(&doc, TextScope::Visible);
        assert!(visible.contains("Menu Cart"));
        assert!(visible.contains("Copyright"));
        assert!(!visible.contains("var x"));
    }

    #[test]
    fn absolutize_resolves_relative_and_rejects_non_http() {
        assert_eq!(
            absolutize_url("https://shop.example.com", "/pages/faq#top").as_deref(),
            Some("https://shop.example.com/pages/faq")
        );
        assert_eq!(
            absolutize_url("https://shop.example.com", "/search?q=a&amp;b=c").as_deref(),
            Some("https://shop.example.com/search?q=a&b=c")
        );
        assert!(absolutize_url("https://shop.example.com", "mailto:hi@shop.example.com").is_none());
        assert!(absolutize_url("https://shop.example.com", "javascript:void(0)").is_none());
        assert!(absolutize_url("https://shop.example.com", "#").is_none());
    }

    #[test]
    fn same_site_ignores_www() {
        assert!(same_site("https://www.shop.com/a", "https://shop.com"));
        assert!(!same_site("https://instagram.com/shop", "https://shop.com"));
    }

    #[test]
    fn meta_content_matches_name_or_property() {
        let doc = Html::parse_document(
            r#"<head>
                <meta name="description" content="  Handmade   boots ">
                <meta property="og:title" content="Boot Co">
            </head>"#,
        );
        assert_eq!(meta_content(&doc, "description").as_deref(), Some("Handmade boots"));
        assert_eq!(meta_content(&doc, "og:title").as_deref(), Some("Boot Co"));
        assert!(meta_content(&doc, "twitter:site").is_none());
    }

    #[test]
    fn json_ld_nodes_walk_graph_and_skip_malformed() {
        let doc = Html::parse_document(
            r#"<script type="application/ld+json">{"@graph":[{"@type":"Organization","name":"Boot Co"}]}</script>
               <script type="application/ld+json">{not json</script>"#,
        );
        let blocks = json_ld_blocks(&doc);
        assert_eq!(blocks.len(), 1);
        let nodes = json_ld_nodes(&blocks);
        assert!(nodes.iter().any(|n| json_ld_is_type(n, "Organization")));
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo wörld", 5), "héllo");
        assert_eq!(truncate_chars("short", 10), "short");
    }
}
