//! Field extractors.
//!
//! Each extractor turns one already-fetched [`RawPage`] into a
//! [`PartialResult`]. Extractors never touch the network and never fail:
//! anything short of a confident value is reported as an absence with a
//! reason, so they can be unit-tested against fixed HTML.

mod brand;
mod contact;
mod faq;
mod policy;
mod product;
mod social;

pub use brand::{BrandContextExtractor, ImportantLinksExtractor, MetadataExtractor};
pub use contact::ContactExtractor;
pub use faq::FaqExtractor;
pub use policy::{PolicyExtractor, PolicyKind};
pub use product::{CatalogExtractor, HeroProductExtractor, ProductCardExtractor};
pub use social::SocialExtractor;

use crate::client::RawPage;
use crate::record::PartialResult;

/// Capability shared by every field extractor.
pub trait Extractor: Send + Sync {
    type Output;

    /// Stable name, recorded as the strategy in a value's provenance.
    fn name(&self) -> &'static str;

    fn extract(&self, page: &RawPage) -> PartialResult<Self::Output>;
}

/// Returns `true` if `text` reads like a question.
pub(crate) fn is_question(text: &str) -> bool {
    const QUESTION_WORDS: &[&str] = &[
        "what", "when", "where", "who", "why", "how", "can", "could", "would", "should", "will",
        "do", "does", "did", "is", "are", "was", "were",
    ];

    let trimmed = text.trim();
    if trimmed.contains('?') {
        return true;
    }
    let first_word = trimmed
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase();
    QUESTION_WORDS.contains(&first_word.as_str())
}
