use std::collections::BTreeMap;

use scraper::Html;
use serde_json::Value;

use super::Extractor;
use crate::client::RawPage;
use crate::html::{
    anchors, clean_text, element_text, json_ld_blocks, meta_content, meta_pairs, selector,
    truncate_chars, TextScope,
};
use crate::record::PartialResult;

const BRAND_SELECTORS: &str = "[class*='about'], [class*='brand'], [class*='story'], \
    [class*='mission'], [id*='about'], [id*='brand'], [id*='story']";

/// Sections longer than this are page wrappers that merely carry a brand class.
const MAX_SECTION_CHARS: usize = 2_000;

const MAX_CONTEXT_CHARS: usize = 1_000;

/// Short "who we are" text from the homepage.
#[derive(Debug)]
pub struct BrandContextExtractor {
    min_chars: usize,
}

impl BrandContextExtractor {
    #[must_use]
    pub fn new(min_chars: usize) -> Self {
        Self { min_chars }
    }
}

impl Extractor for BrandContextExtractor {
    type Output = String;

    fn name(&self) -> &'static str {
        "brand_markup"
    }

    fn extract(&self, page: &RawPage) -> PartialResult<String> {
        let doc = Html::parse_document(&page.body);

        let section = selector(BRAND_SELECTORS).and_then(|sel| {
            doc.select(&sel)
                .filter(|el| !matches!(el.value().name(), "html" | "body"))
                .map(|el| element_text(el, TextScope::Visible))
                .find(|text| {
                    let len = text.chars().count();
                    len >= self.min_chars && len <= MAX_SECTION_CHARS
                })
        });
        if let Some(text) = section {
            return PartialResult::found(truncate_chars(&text, MAX_CONTEXT_CHARS), &page.url, self.name())
                .with_technique("about_section");
        }

        let description =
            meta_content(&doc, "description").or_else(|| meta_content(&doc, "og:description"));
        match description {
            Some(text) => PartialResult::found(text, &page.url, self.name())
                .with_technique("meta_description"),
            None => PartialResult::not_found(format!("no brand description on {}", page.url)),
        }
    }
}

/// Link categories with the keywords that identify them, in priority order.
const LINK_CATEGORIES: &[(&str, &[&str])] = &[
    ("order_tracking", &["track", "order", "tracking"]),
    ("contact_us", &["contact"]),
    ("blog", &["blog", "news", "articles"]),
    ("about", &["about"]),
    ("shipping", &["shipping", "delivery"]),
    ("size_guide", &["size", "size-guide", "sizing"]),
];

/// First link per well-known category.
#[derive(Debug, Default)]
pub struct ImportantLinksExtractor;

impl Extractor for ImportantLinksExtractor {
    type Output = BTreeMap<String, String>;

    fn name(&self) -> &'static str {
        "link_keywords"
    }

    fn extract(&self, page: &RawPage) -> PartialResult<BTreeMap<String, String>> {
        let doc = Html::parse_document(&page.body);
        let mut links = BTreeMap::new();

        for (anchor, url) in anchors(&doc, &page.url) {
            let href = anchor.value().attr("href").unwrap_or_default().to_lowercase();
            let text = clean_text(&anchor.text().collect::<String>()).to_lowercase();
            for (category, keywords) in LINK_CATEGORIES {
                if links.contains_key(*category) {
                    continue;
                }
                if keywords.iter().any(|k| href.contains(k) || text.contains(k)) {
                    links.insert((*category).to_owned(), url.clone());
                    break;
                }
            }
        }

        if links.is_empty() {
            return PartialResult::not_found(format!("no recognizable links on {}", page.url));
        }
        PartialResult::found(links, &page.url, self.name())
    }
}

/// Page title, meta tags and the first JSON-LD block.
#[derive(Debug, Default)]
pub struct MetadataExtractor;

impl Extractor for MetadataExtractor {
    type Output = BTreeMap<String, Value>;

    fn name(&self) -> &'static str {
        "head_tags"
    }

    fn extract(&self, page: &RawPage) -> PartialResult<BTreeMap<String, Value>> {
        let doc = Html::parse_document(&page.body);
        let mut metadata = BTreeMap::new();

        if let Some(title) = selector("title")
            .and_then(|sel| doc.select(&sel).next())
            .map(|t| clean_text(&t.text().collect::<String>()))
            .filter(|t| !t.is_empty())
        {
            metadata.insert("title".to_owned(), Value::String(title));
        }

        for (key, content) in meta_pairs(&doc) {
            metadata.entry(key).or_insert(Value::String(content));
        }

        if let Some(first) = json_ld_blocks(&doc).into_iter().next() {
            metadata.insert("structured_data".to_owned(), first);
        }

        if metadata.is_empty() {
            return PartialResult::not_found(format!("no metadata on {}", page.url));
        }
        PartialResult::found(metadata, &page.url, self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOME: &str = r#"
    <html>
    <head>
      <title> Boot Co | Handmade Boots </title>
      <meta name="description" content="Handmade leather boots from Portland since 1962.">
      <meta property="og:type" content="website">
      <script type="application/ld+json">{"@type":"Organization","name":"Boot Co"}</script>
    </head>
    <body>
      <nav>
        <a href="/pages/track-order">Track your order</a>
        <a href="/pages/contact">Contact</a>
        <a href="/blogs/news">Journal</a>
        <a href="/pages/about-us">Our story</a>
        <a href="/policies/shipping-policy">Shipping</a>
        <a href="/pages/size-guide">Fit guide</a>
      </nav>
      <section class="brand-story">
        <h2>Our story</h2>
        <p>Three generations of bootmakers, one workbench, and a lifetime resole promise.</p>
      </section>
    </body>
    </html>
    "#;

    fn home() -> RawPage {
        RawPage::new("https://boots.example.com/", HOME)
    }

    #[test]
    fn brand_context_from_story_section() {
        let PartialResult::Found { value, provenance } = BrandContextExtractor::new(50).extract(&home())
        else {
            panic!("expected brand context");
        };
        assert!(value.starts_with("Our story Three generations of bootmakers"));
        assert_eq!(provenance.technique, Some("about_section"));
    }

    #[test]
    fn brand_context_falls_back_to_meta_description() {
        let page = RawPage::new(
            "https://boots.example.com/",
            r#"<head><meta name="description" content="Handmade leather boots."></head>"#,
        );
        let PartialResult::Found { value, provenance } = BrandContextExtractor::new(50).extract(&page)
        else {
            panic!("expected meta fallback");
        };
        assert_eq!(value, "Handmade leather boots.");
        assert_eq!(provenance.technique, Some("meta_description"));
    }

    #[test]
    fn important_links_by_category() {
        let links = ImportantLinksExtractor.extract(&home()).into_value().unwrap();
        assert_eq!(links["order_tracking"], "https://boots.example.com/pages/track-order");
        assert_eq!(links["contact_us"], "https://boots.example.com/pages/contact");
        assert_eq!(links["blog"], "https://boots.example.com/blogs/news");
        assert_eq!(links["about"], "https://boots.example.com/pages/about-us");
        assert_eq!(links["shipping"], "https://boots.example.com/policies/shipping-policy");
        assert_eq!(links["size_guide"], "https://boots.example.com/pages/size-guide");
    }

    #[test]
    fn metadata_collects_title_meta_and_json_ld() {
        let metadata = MetadataExtractor.extract(&home()).into_value().unwrap();
        assert_eq!(metadata["title"], "Boot Co | Handmade Boots");
        assert_eq!(metadata["og:type"], "website");
        assert_eq!(metadata["structured_data"]["name"], "Boot Co");
    }

    #[test]
    fn empty_page_has_no_metadata() {
        let page = RawPage::new("https://boots.example.com/", "<html><body></body></html>");
        assert!(!MetadataExtractor.extract(&page).is_found());
    }
}
