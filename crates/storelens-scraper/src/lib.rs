pub mod client;
pub mod enhance;
pub mod error;
pub mod extract;
pub mod fallback;
pub mod orchestrator;
pub mod pagination;
pub mod record;
pub mod types;

mod html;
mod rate_limit;

pub use client::{normalize_target, FetchClient, PageFetcher, RawPage};
pub use enhance::{EnhancementFields, EnhancementUnavailable, Enhancer, LlmEnhancer};
pub use error::{FetchError, FetchErrorKind, InsightsError};
pub use orchestrator::{ExtractionThresholds, Orchestrator, OrchestratorConfig, StoreTarget};
pub use record::{
    AggregateRecord, ContactDetails, Faq, Field, FieldReport, FieldStatus, HeroProduct,
    PartialResult, Product, SocialPlatform,
};
