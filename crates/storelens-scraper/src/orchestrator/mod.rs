//! Extraction orchestrator.
//!
//! One request validates the target, fetches the homepage once, then runs
//! every field pipeline concurrently under a shared deadline. Each pipeline
//! is a [`FallbackChain`] writing into its own slot of the
//! [`AggregateRecord`], so pipelines never contend on shared state and the
//! record does not depend on completion order.

mod target;

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use storelens_core::AppConfig;
use tokio::time::{timeout, timeout_at, Instant};

use crate::client::{normalize_target, PageFetcher, RawPage};
use crate::enhance::Enhancer;
use crate::error::InsightsError;
use crate::extract::{
    BrandContextExtractor, CatalogExtractor, ContactExtractor, FaqExtractor,
    HeroProductExtractor, ImportantLinksExtractor, MetadataExtractor, PolicyExtractor,
    PolicyKind, ProductCardExtractor, SocialExtractor,
};
use crate::fallback::{union, FallbackChain, FetchContext, Source};
use crate::record::{
    Absence, AbsenceReason, AggregateRecord, ContactDetails, Faq, Field, HeroProduct,
    PartialResult, Product, SocialPlatform,
};

pub use target::StoreTarget;

const FAQ_PATHS: &[&str] = &[
    "/pages/faq",
    "/pages/frequently-asked-questions",
    "/pages/help",
    "/pages/support",
    "/faq",
    "/frequently-asked-questions",
    "/help",
    "/support",
    "/pages/faqs",
    "/faqs",
];
const FAQ_LINK_KEYWORDS: &[&str] = &["faq", "frequently-asked"];

const CONTACT_PATHS: &[&str] = &[
    "/pages/contact",
    "/pages/contact-us",
    "/contact",
    "/contact-us",
    "/pages/contact-form",
    "/contact-form",
];
const CONTACT_LINK_KEYWORDS: &[&str] = &["contact"];

const ALL_PRODUCTS_PATH: &str = "/collections/all";

/// Discovered links tried per field after the fixed candidate paths.
const MAX_DISCOVERED_LINKS: usize = 3;

/// Minimum-confidence thresholds used by the extractors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionThresholds {
    pub policy_min_chars: usize,
    pub faq_min_answer_chars: usize,
    pub faq_max_entries: usize,
    pub hero_max_products: usize,
    pub brand_context_min_chars: usize,
}

impl Default for ExtractionThresholds {
    fn default() -> Self {
        Self {
            policy_min_chars: 200,
            faq_min_answer_chars: 10,
            faq_max_entries: 50,
            hero_max_products: 20,
            brand_context_min_chars: 50,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrchestratorConfig {
    /// Bound on a single page fetch, retries included.
    pub fetch_timeout: Duration,
    /// Bound on the whole extraction; late pipelines report `fetch_error`.
    pub request_deadline: Duration,
    /// Bound on the enhancement pass, applied after extraction.
    pub enhance_timeout: Duration,
    pub catalog_page_limit: u32,
    pub catalog_max_pages: usize,
    pub thresholds: ExtractionThresholds,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            fetch_timeout: Duration::from_secs(15),
            request_deadline: Duration::from_secs(45),
            enhance_timeout: Duration::from_secs(20),
            catalog_page_limit: 250,
            catalog_max_pages: 4,
            thresholds: ExtractionThresholds::default(),
        }
    }
}

impl OrchestratorConfig {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            fetch_timeout: Duration::from_secs(config.fetch_timeout_secs),
            request_deadline: Duration::from_secs(config.request_deadline_secs),
            enhance_timeout: config
                .llm
                .as_ref()
                .map_or(Duration::from_secs(20), |llm| Duration::from_secs(llm.timeout_secs)),
            catalog_page_limit: config.catalog_page_limit,
            catalog_max_pages: config.catalog_max_pages,
            thresholds: ExtractionThresholds {
                policy_min_chars: config.policy_min_chars,
                faq_min_answer_chars: config.faq_min_answer_chars,
                faq_max_entries: config.faq_max_entries,
                hero_max_products: config.hero_max_products,
                brand_context_min_chars: config.brand_context_min_chars,
            },
        }
    }
}

/// The extractor set for one request, built from the thresholds.
struct Extractors {
    catalog: CatalogExtractor,
    cards: ProductCardExtractor,
    hero: HeroProductExtractor,
    privacy: PolicyExtractor,
    return_refund: PolicyExtractor,
    faq: FaqExtractor,
    contact: ContactExtractor,
    social: SocialExtractor,
    brand: BrandContextExtractor,
    links: ImportantLinksExtractor,
    metadata: MetadataExtractor,
}

impl Extractors {
    fn new(thresholds: &ExtractionThresholds) -> Self {
        Self {
            catalog: CatalogExtractor,
            cards: ProductCardExtractor,
            hero: HeroProductExtractor::new(thresholds.hero_max_products),
            privacy: PolicyExtractor::new(PolicyKind::Privacy, thresholds.policy_min_chars),
            return_refund: PolicyExtractor::new(
                PolicyKind::ReturnRefund,
                thresholds.policy_min_chars,
            ),
            faq: FaqExtractor::new(thresholds.faq_min_answer_chars, thresholds.faq_max_entries),
            contact: ContactExtractor,
            social: SocialExtractor,
            brand: BrandContextExtractor::new(thresholds.brand_context_min_chars),
            links: ImportantLinksExtractor,
            metadata: MetadataExtractor,
        }
    }
}

/// Runs all field pipelines for a store and assembles the record.
pub struct Orchestrator {
    fetcher: Arc<dyn PageFetcher>,
    enhancer: Option<Arc<dyn Enhancer>>,
    config: OrchestratorConfig,
}

impl Orchestrator {
    #[must_use]
    pub fn new(fetcher: Arc<dyn PageFetcher>, config: OrchestratorConfig) -> Self {
        Self {
            fetcher,
            enhancer: None,
            config,
        }
    }

    #[must_use]
    pub fn with_enhancer(mut self, enhancer: Arc<dyn Enhancer>) -> Self {
        self.enhancer = Some(enhancer);
        self
    }

    /// Extracts everything available about the store at `url`.
    ///
    /// # Errors
    ///
    /// - [`InsightsError::InvalidTarget`] if `url` is not an absolute
    ///   HTTP(S) URL; no request is made.
    /// - [`InsightsError::TargetUnreachable`] if the store root fails with a
    ///   DNS or connection error.
    ///
    /// Every other failure degrades into an absence on the affected field.
    pub async fn fetch_insights(&self, url: &str) -> Result<AggregateRecord, InsightsError> {
        let base = normalize_target(url)?;
        let deadline = Instant::now() + self.config.request_deadline;

        let homepage = self.fetch_homepage(&base, deadline).await?;
        let target = StoreTarget::discover(base, homepage.as_ref().ok());
        tracing::info!(
            store = %target.base,
            homepage = homepage.is_ok(),
            discovered_links = target.discovered_links.len(),
            "extracting store insights"
        );

        let mut record = self.extract_fields(&target, &homepage, deadline).await;

        if let Some(enhancer) = &self.enhancer {
            let outcome = timeout(self.config.enhance_timeout, enhancer.enhance(&record)).await;
            match outcome {
                Ok(Ok(fields)) => record.apply_enhancement(fields),
                Ok(Err(e)) => tracing::warn!(store = %record.store_url, error = %e, "enhancement skipped"),
                Err(_) => tracing::warn!(store = %record.store_url, "enhancement timed out"),
            }
        }

        Ok(record)
    }

    /// Fetches the store root. Only a DNS or connection failure is fatal.
    async fn fetch_homepage(
        &self,
        base: &str,
        deadline: Instant,
    ) -> Result<Result<RawPage, Absence>, InsightsError> {
        let url = format!("{base}/");
        match timeout_at(deadline, self.fetcher.fetch(&url, self.config.fetch_timeout)).await {
            Ok(Ok(page)) => Ok(Ok(page)),
            Ok(Err(e)) if e.is_host_unreachable() => {
                tracing::warn!(store = base, error = %e, "store root unreachable");
                Err(InsightsError::TargetUnreachable {
                    url: base.to_owned(),
                    source: e,
                })
            }
            Ok(Err(e)) => {
                tracing::warn!(store = base, error = %e, "homepage unavailable, continuing without it");
                Ok(Err(Absence::from(&e)))
            }
            Err(_) => {
                tracing::warn!(store = base, "homepage fetch hit the request deadline");
                Ok(Err(Absence::new(
                    AbsenceReason::FetchError,
                    format!("homepage {url} did not answer before the request deadline"),
                )))
            }
        }
    }

    async fn extract_fields(
        &self,
        target: &StoreTarget,
        homepage: &Result<RawPage, Absence>,
        deadline: Instant,
    ) -> AggregateRecord {
        let ex = Extractors::new(&self.config.thresholds);
        let ctx = FetchContext {
            fetcher: self.fetcher.as_ref(),
            fetch_timeout: self.config.fetch_timeout,
            homepage,
        };

        let products = FallbackChain::<Vec<Product>>::new(Field::Products)
            .attempt(
                "catalog_feed",
                Source::Paged {
                    origin: target.base.clone(),
                    limit: self.config.catalog_page_limit,
                    max_pages: self.config.catalog_max_pages,
                },
                &ex.catalog,
            )
            .attempt("homepage_cards", Source::Homepage, &ex.cards)
            .attempt("collection_cards", Source::Page(target.url(ALL_PRODUCTS_PATH)), &ex.cards);

        let hero = FallbackChain::<Vec<HeroProduct>>::new(Field::HeroProducts)
            .attempt("homepage", Source::Homepage, &ex.hero);

        let privacy = policy_chain(Field::PrivacyPolicy, PolicyKind::Privacy, target, &ex.privacy);
        let return_refund = policy_chain(
            Field::ReturnRefundPolicy,
            PolicyKind::ReturnRefund,
            target,
            &ex.return_refund,
        );

        let faq_pages = target.urls(FAQ_PATHS);
        let faq_links = target.links_matching(FAQ_LINK_KEYWORDS, &faq_pages, MAX_DISCOVERED_LINKS);
        let faqs = FallbackChain::<Vec<Faq>>::new(Field::Faqs)
            .pages("faq_page", faq_pages, &ex.faq)
            .pages("faq_link", faq_links, &ex.faq)
            .attempt("homepage", Source::Homepage, &ex.faq);

        // Contact evidence from a contact page and the homepage is unioned.
        let contact_pages = target.urls(CONTACT_PATHS);
        let contact_links =
            target.links_matching(CONTACT_LINK_KEYWORDS, &contact_pages, MAX_DISCOVERED_LINKS);
        let contact_page = FallbackChain::<ContactDetails>::new(Field::ContactDetails)
            .pages("contact_page", contact_pages, &ex.contact)
            .pages("contact_link", contact_links, &ex.contact);
        let contact_home = FallbackChain::<ContactDetails>::new(Field::ContactDetails)
            .attempt("homepage", Source::Homepage, &ex.contact);
        let contact = async {
            let (page, home) = tokio::join!(contact_page.run(&ctx), contact_home.run(&ctx));
            union(page, home)
        };

        let social = FallbackChain::<BTreeMap<SocialPlatform, String>>::new(Field::SocialHandles)
            .attempt("homepage", Source::Homepage, &ex.social);
        let brand = FallbackChain::<String>::new(Field::BrandContext)
            .attempt("homepage", Source::Homepage, &ex.brand);
        let links = FallbackChain::<BTreeMap<String, String>>::new(Field::ImportantLinks)
            .attempt("homepage", Source::Homepage, &ex.links);
        let metadata = FallbackChain::<BTreeMap<String, Value>>::new(Field::Metadata)
            .attempt("homepage", Source::Homepage, &ex.metadata);

        let (
            products,
            hero,
            privacy,
            return_refund,
            faqs,
            contact,
            social,
            brand,
            links,
            metadata,
        ) = tokio::join!(
            bounded(Field::Products, deadline, products.run(&ctx)),
            bounded(Field::HeroProducts, deadline, hero.run(&ctx)),
            bounded(Field::PrivacyPolicy, deadline, privacy.run(&ctx)),
            bounded(Field::ReturnRefundPolicy, deadline, return_refund.run(&ctx)),
            bounded(Field::Faqs, deadline, faqs.run(&ctx)),
            bounded(Field::ContactDetails, deadline, contact),
            bounded(Field::SocialHandles, deadline, social.run(&ctx)),
            bounded(Field::BrandContext, deadline, brand.run(&ctx)),
            bounded(Field::ImportantLinks, deadline, links.run(&ctx)),
            bounded(Field::Metadata, deadline, metadata.run(&ctx)),
        );

        let mut record = AggregateRecord::empty(target.base.clone());
        record.settle(Field::Products, products, |r, v| r.products = v);
        record.settle(Field::HeroProducts, hero, |r, v| r.hero_products = v);
        record.settle(Field::PrivacyPolicy, privacy, |r, v| r.privacy_policy = Some(v));
        record.settle(Field::ReturnRefundPolicy, return_refund, |r, v| {
            r.return_refund_policy = Some(v);
        });
        record.settle(Field::Faqs, faqs, |r, v| r.faqs = v);
        record.settle(Field::ContactDetails, contact, |r, v| r.contact_details = v);
        record.settle(Field::SocialHandles, social, |r, v| r.social_handles = v);
        record.settle(Field::BrandContext, brand, |r, v| r.brand_context = Some(v));
        record.settle(Field::ImportantLinks, links, |r, v| r.important_links = v);
        record.settle(Field::Metadata, metadata, |r, v| r.metadata = v);
        record
    }
}

/// Fixed candidate pages, then policy-looking links from the homepage.
fn policy_chain<'a>(
    field: Field,
    kind: PolicyKind,
    target: &StoreTarget,
    extractor: &'a PolicyExtractor,
) -> FallbackChain<'a, String> {
    let pages = target.urls(kind.candidate_paths());
    let links = target.links_matching(kind.keywords(), &pages, MAX_DISCOVERED_LINKS);
    FallbackChain::<String>::new(field)
        .pages("policy_page", pages, extractor)
        .pages("policy_link", links, extractor)
}

/// Runs one pipeline under the request deadline and logs its absence.
async fn bounded<T>(
    field: Field,
    deadline: Instant,
    pipeline: impl Future<Output = PartialResult<T>>,
) -> PartialResult<T> {
    let result = timeout_at(deadline, pipeline).await.unwrap_or_else(|_| {
        PartialResult::fetch_error(format!("{field} did not finish before the request deadline"))
    });

    if let PartialResult::Absent(absence) = &result {
        match absence.reason {
            AbsenceReason::NotFound => {
                tracing::debug!(field = %field, detail = %absence.detail, "field not found");
            }
            AbsenceReason::FetchError | AbsenceReason::ParseError => {
                tracing::warn!(
                    field = %field,
                    reason = ?absence.reason,
                    detail = %absence.detail,
                    "field unavailable"
                );
            }
        }
    }
    result
}
