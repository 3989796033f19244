use reqwest::Url;
use scraper::Html;

use crate::client::RawPage;
use crate::html::{anchors, same_site};

/// Validated store origin plus the internal links found on its homepage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreTarget {
    /// Scheme, host and port, without a trailing slash.
    pub base: String,
    /// Same-site links from the homepage in document order, deduplicated.
    pub discovered_links: Vec<String>,
}

impl StoreTarget {
    #[must_use]
    pub fn new(base: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            discovered_links: Vec::new(),
        }
    }

    /// Builds a target, collecting internal links from `homepage` if it was
    /// fetched.
    #[must_use]
    pub fn discover(base: impl Into<String>, homepage: Option<&RawPage>) -> Self {
        let mut target = Self::new(base);
        if let Some(page) = homepage {
            let doc = Html::parse_document(&page.body);
            for (_, url) in anchors(&doc, &page.url) {
                if same_site(&url, &target.base) && !target.discovered_links.contains(&url) {
                    target.discovered_links.push(url);
                }
            }
        }
        target
    }

    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base)
    }

    /// Absolute URLs for `paths`, in order.
    #[must_use]
    pub fn urls(&self, paths: &[&str]) -> Vec<String> {
        paths.iter().map(|path| self.url(path)).collect()
    }

    /// Up to `limit` discovered links whose path mentions one of `keywords`,
    /// skipping anything in `exclude`.
    #[must_use]
    pub fn links_matching(&self, keywords: &[&str], exclude: &[String], limit: usize) -> Vec<String> {
        self.discovered_links
            .iter()
            .filter(|link| {
                Url::parse(link).is_ok_and(|url| {
                    let path = url.path().to_lowercase();
                    keywords.iter().any(|k| path.contains(k))
                })
            })
            .filter(|link| !exclude.contains(link))
            .take(limit)
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOME: &str = r#"
    <footer>
      <a href="/policies/privacy-policy">Privacy</a>
      <a href="/pages/shipping-and-returns">Shipping &amp; returns</a>
      <a href="https://www.shop.example.com/pages/help-center#faq">Help</a>
      <a href="/policies/privacy-policy">Privacy (again)</a>
      <a href="https://instagram.com/shop">Instagram</a>
      <a href="mailto:hi@shop.example.com">Email</a>
    </footer>
    "#;

    fn target() -> StoreTarget {
        StoreTarget::discover(
            "https://shop.example.com",
            Some(&RawPage::new("https://shop.example.com/", HOME)),
        )
    }

    #[test]
    fn discovers_same_site_links_once() {
        assert_eq!(
            target().discovered_links,
            vec![
                "https://shop.example.com/policies/privacy-policy",
                "https://shop.example.com/pages/shipping-and-returns",
                "https://www.shop.example.com/pages/help-center",
            ]
        );
    }

    #[test]
    fn matching_links_skip_excluded_candidates() {
        let target = target();
        let candidates = target.urls(&["/policies/privacy-policy"]);
        assert!(target
            .links_matching(&["privacy"], &candidates, 3)
            .is_empty());
        assert_eq!(
            target.links_matching(&["refund", "return"], &[], 3),
            vec!["https://shop.example.com/pages/shipping-and-returns"]
        );
    }

    #[test]
    fn no_homepage_means_no_links() {
        let target = StoreTarget::discover("https://shop.example.com", None);
        assert!(target.discovered_links.is_empty());
        assert_eq!(target.url("/pages/faq"), "https://shop.example.com/pages/faq");
    }
}
