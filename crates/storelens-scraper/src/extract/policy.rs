use scraper::Html;

use super::Extractor;
use crate::client::RawPage;
use crate::html::{document_text, element_text, selector, TextScope};
use crate::record::PartialResult;

/// Containers that usually hold the policy body, tried in order.
const CONTENT_SELECTORS: &[&str] = &[
    "main",
    "[role='main']",
    ".main-content",
    ".content",
    ".page-content",
    ".policy-content",
    ".legal-content",
    "article",
];

/// Minimum text inside a content container before it is preferred over the
/// whole page body.
const MIN_CONTAINER_CHARS: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyKind {
    Privacy,
    ReturnRefund,
}

impl PolicyKind {
    /// Candidate paths, highest priority first.
    #[must_use]
    pub fn candidate_paths(self) -> &'static [&'static str] {
        match self {
            PolicyKind::Privacy => &[
                "/pages/privacy-policy",
                "/pages/privacy",
                "/privacy-policy",
                "/privacy",
                "/legal/privacy-policy",
                "/policies/privacy-policy",
            ],
            PolicyKind::ReturnRefund => &[
                "/pages/return-policy",
                "/pages/refund-policy",
                "/pages/return-refund-policy",
                "/return-policy",
                "/refund-policy",
                "/return-refund-policy",
                "/legal/return-policy",
                "/legal/refund-policy",
                "/policies/refund-policy",
                "/policies/return-policy",
            ],
        }
    }

    /// Words one of which must appear in both a discovered link and the
    /// policy text.
    #[must_use]
    pub fn keywords(self) -> &'static [&'static str] {
        match self {
            PolicyKind::Privacy => &["privacy"],
            PolicyKind::ReturnRefund => &["refund", "return"],
        }
    }

    fn label(self) -> &'static str {
        match self {
            PolicyKind::Privacy => "privacy policy",
            PolicyKind::ReturnRefund => "return/refund policy",
        }
    }
}

/// Extracts the body text of a policy page.
///
/// The page counts only if its main text is at least `min_chars` long and
/// mentions one of the policy's keywords, which filters out soft-404 pages
/// and unrelated pages served at a candidate path.
#[derive(Debug)]
pub struct PolicyExtractor {
    kind: PolicyKind,
    min_chars: usize,
}

impl PolicyExtractor {
    #[must_use]
    pub fn new(kind: PolicyKind, min_chars: usize) -> Self {
        Self { kind, min_chars }
    }
}

impl Extractor for PolicyExtractor {
    type Output = String;

    fn name(&self) -> &'static str {
        match self.kind {
            PolicyKind::Privacy => "privacy_page",
            PolicyKind::ReturnRefund => "return_refund_page",
        }
    }

    fn extract(&self, page: &RawPage) -> PartialResult<String> {
        let doc = Html::parse_document(&page.body);

        let container = CONTENT_SELECTORS.iter().find_map(|css| {
            let sel = selector(css)?;
            doc.select(&sel)
                .map(|el| element_text(el, TextScope::Content))
                .find(|text| text.chars().count() > MIN_CONTAINER_CHARS)
        });
        let (text, technique) = match container {
            Some(text) => (text, "content_container"),
            None => (document_text(&doc, TextScope::Content), "page_body"),
        };

        let length = text.chars().count();
        if length < self.min_chars {
            return PartialResult::not_found(format!(
                "{} text on {} is {length} chars, below {}",
                self.kind.label(),
                page.url,
                self.min_chars
            ));
        }

        let lowered = text.to_lowercase();
        if !self.kind.keywords().iter().any(|k| lowered.contains(k)) {
            return PartialResult::not_found(format!(
                "{} does not mention the {}",
                page.url,
                self.kind.label()
            ));
        }

        PartialResult::found(text, &page.url, self.name()).with_technique(technique)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::AbsenceReason;

    fn long_policy(topic: &str) -> String {
        format!(
            "<html><body><header>Shop Menu</header><main><h1>{topic}</h1><p>{}</p></main>\
             <footer>Footer links</footer></body></html>",
            "We take your data seriously and only share it with carriers. ".repeat(6)
        )
    }

    #[test]
    fn privacy_policy_text_comes_from_main_container() {
        let extractor = PolicyExtractor::new(PolicyKind::Privacy, 200);
        let page = RawPage::new(
            "https://shop.example.com/policies/privacy-policy",
            long_policy("Privacy Policy"),
        );
        let PartialResult::Found { value, provenance } = extractor.extract(&page) else {
            panic!("expected a privacy policy");
        };
        assert!(value.starts_with("Privacy Policy We take your data"));
        assert!(!value.contains("Shop Menu"));
        assert!(!value.contains("Footer links"));
        assert_eq!(provenance.technique, Some("content_container"));
    }

    #[test]
    fn short_page_is_not_found() {
        let extractor = PolicyExtractor::new(PolicyKind::Privacy, 200);
        let page = RawPage::new(
            "https://shop.example.com/pages/privacy",
            "<main>Privacy policy coming soon.</main>",
        );
        let result = extractor.extract(&page);
        assert!(matches!(result, PartialResult::Absent(ref a) if a.reason == AbsenceReason::NotFound));
    }

    #[test]
    fn threshold_is_tunable() {
        let page = RawPage::new(
            "https://shop.example.com/pages/privacy",
            "<main>Our privacy promise: we never sell your data.</main>",
        );
        assert!(!PolicyExtractor::new(PolicyKind::Privacy, 200).extract(&page).is_found());
        assert!(PolicyExtractor::new(PolicyKind::Privacy, 20).extract(&page).is_found());
    }

    #[test]
    fn return_policy_requires_return_or_refund_wording() {
        let extractor = PolicyExtractor::new(PolicyKind::ReturnRefund, 200);
        let unrelated = RawPage::new("https://shop.example.com/pages/return-policy", long_policy("About us"));
        assert!(!extractor.extract(&unrelated).is_found());

        let refund = RawPage::new(
            "https://shop.example.com/policies/refund-policy",
            long_policy("Refund Policy"),
        );
        assert!(extractor.extract(&refund).is_found());
    }
}
