//! The aggregate record and the per-attempt partial result it is built from.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use serde_json::Value;

use crate::enhance::EnhancementFields;
use crate::error::FetchError;

/// The fields of an [`AggregateRecord`], each filled by its own pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Products,
    HeroProducts,
    PrivacyPolicy,
    ReturnRefundPolicy,
    Faqs,
    ContactDetails,
    SocialHandles,
    BrandContext,
    ImportantLinks,
    Metadata,
}

impl Field {
    pub const ALL: [Field; 10] = [
        Field::Products,
        Field::HeroProducts,
        Field::PrivacyPolicy,
        Field::ReturnRefundPolicy,
        Field::Faqs,
        Field::ContactDetails,
        Field::SocialHandles,
        Field::BrandContext,
        Field::ImportantLinks,
        Field::Metadata,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Field::Products => "products",
            Field::HeroProducts => "hero_products",
            Field::PrivacyPolicy => "privacy_policy",
            Field::ReturnRefundPolicy => "return_refund_policy",
            Field::Faqs => "faqs",
            Field::ContactDetails => "contact_details",
            Field::SocialHandles => "social_handles",
            Field::BrandContext => "brand_context",
            Field::ImportantLinks => "important_links",
            Field::Metadata => "metadata",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a field has no value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AbsenceReason {
    /// Sources were reachable but did not contain the data.
    NotFound,
    /// A request failed (timeout, connection, non-404 HTTP error).
    FetchError,
    /// A source answered with content that could not be interpreted.
    ParseError,
}

impl AbsenceReason {
    /// Rank used when several attempts failed for different reasons.
    ///
    /// A conclusive "not there" outranks an unreadable page, which outranks a
    /// request that never completed.
    fn rank(self) -> u8 {
        match self {
            AbsenceReason::NotFound => 2,
            AbsenceReason::ParseError => 1,
            AbsenceReason::FetchError => 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Absence {
    pub reason: AbsenceReason,
    pub detail: String,
}

impl Absence {
    #[must_use]
    pub fn new(reason: AbsenceReason, detail: impl Into<String>) -> Self {
        Self {
            reason,
            detail: detail.into(),
        }
    }

    /// Keeps whichever of `self` and `other` has the stronger reason; on a tie
    /// the earlier absence wins.
    #[must_use]
    pub fn merge(self, other: Absence) -> Absence {
        if other.reason.rank() > self.reason.rank() {
            other
        } else {
            self
        }
    }
}

impl From<&FetchError> for Absence {
    fn from(err: &FetchError) -> Self {
        let reason = match err {
            FetchError::NotFound { .. } => AbsenceReason::NotFound,
            _ => AbsenceReason::FetchError,
        };
        Absence::new(reason, err.to_string())
    }
}

/// Where a found value came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Provenance {
    pub source_url: String,
    pub strategy: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub technique: Option<&'static str>,
}

/// Outcome of one extraction attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum PartialResult<T> {
    Found { value: T, provenance: Provenance },
    Absent(Absence),
}

impl<T> PartialResult<T> {
    pub fn found(value: T, source_url: impl Into<String>, strategy: &'static str) -> Self {
        PartialResult::Found {
            value,
            provenance: Provenance {
                source_url: source_url.into(),
                strategy,
                technique: None,
            },
        }
    }

    pub fn not_found(detail: impl Into<String>) -> Self {
        PartialResult::Absent(Absence::new(AbsenceReason::NotFound, detail))
    }

    pub fn fetch_error(detail: impl Into<String>) -> Self {
        PartialResult::Absent(Absence::new(AbsenceReason::FetchError, detail))
    }

    pub fn parse_error(detail: impl Into<String>) -> Self {
        PartialResult::Absent(Absence::new(AbsenceReason::ParseError, detail))
    }

    /// Records the technique inside the extractor that produced the value.
    #[must_use]
    pub fn with_technique(mut self, name: &'static str) -> Self {
        if let PartialResult::Found { provenance, .. } = &mut self {
            provenance.technique = Some(name);
        }
        self
    }

    /// Overrides the strategy name with the fallback step that ran the extractor.
    #[must_use]
    pub fn with_strategy(mut self, name: &'static str) -> Self {
        if let PartialResult::Found { provenance, .. } = &mut self {
            provenance.strategy = name;
        }
        self
    }

    pub fn is_found(&self) -> bool {
        matches!(self, PartialResult::Found { .. })
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            PartialResult::Found { value, .. } => Some(value),
            PartialResult::Absent(_) => None,
        }
    }

    pub fn into_value(self) -> Option<T> {
        match self {
            PartialResult::Found { value, .. } => Some(value),
            PartialResult::Absent(_) => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> PartialResult<U> {
        match self {
            PartialResult::Found { value, provenance } => PartialResult::Found {
                value: f(value),
                provenance,
            },
            PartialResult::Absent(absence) => PartialResult::Absent(absence),
        }
    }
}

/// Observable status of one field in the response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldStatus {
    Found,
    NotFound,
    FetchError,
    ParseError,
}

impl From<AbsenceReason> for FieldStatus {
    fn from(reason: AbsenceReason) -> Self {
        match reason {
            AbsenceReason::NotFound => FieldStatus::NotFound,
            AbsenceReason::FetchError => FieldStatus::FetchError,
            AbsenceReason::ParseError => FieldStatus::ParseError,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldReport {
    pub status: FieldStatus,
    #[serde(flatten)]
    pub provenance: Option<Provenance>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// A catalog entry, either from the JSON feed or scraped from a product card.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Product {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub handle: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vendor: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compare_at_price: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub available: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<ProductOption>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub variants: Vec<ProductVariant>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductVariant {
    pub id: i64,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sku: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compare_at_price: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub available: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductOption {
    pub name: String,
    pub values: Vec<String>,
}

/// A product surfaced on the homepage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HeroProduct {
    pub title: String,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Faq {
    pub question: String,
    pub answer: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ContactDetails {
    pub emails: Vec<String>,
    pub phone_numbers: Vec<String>,
    pub address: Option<String>,
}

impl ContactDetails {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.emails.is_empty() && self.phone_numbers.is_empty() && self.address.is_none()
    }

    /// Unions `other` into `self`, keeping first-seen order and dropping
    /// duplicates. Phone numbers compare by digits only.
    pub fn merge(&mut self, other: ContactDetails) {
        for email in other.emails {
            if !self.emails.iter().any(|e| e.eq_ignore_ascii_case(&email)) {
                self.emails.push(email);
            }
        }
        for phone in other.phone_numbers {
            let digits = phone_digits(&phone);
            if !self.phone_numbers.iter().any(|p| phone_digits(p) == digits) {
                self.phone_numbers.push(phone);
            }
        }
        if self.address.is_none() {
            self.address = other.address;
        }
    }
}

pub(crate) fn phone_digits(phone: &str) -> String {
    phone.chars().filter(char::is_ascii_digit).collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SocialPlatform {
    Instagram,
    Facebook,
    Twitter,
    Youtube,
    Tiktok,
    Linkedin,
    Pinterest,
    Snapchat,
    Whatsapp,
}

/// Everything learned about one store in one request.
///
/// Every field is independently empty; [`AggregateRecord::field_status`]
/// says why an empty field is empty.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateRecord {
    pub store_url: String,
    pub products: Vec<Product>,
    pub hero_products: Vec<HeroProduct>,
    pub privacy_policy: Option<String>,
    pub return_refund_policy: Option<String>,
    pub faqs: Vec<Faq>,
    pub social_handles: BTreeMap<SocialPlatform, String>,
    pub contact_details: ContactDetails,
    pub brand_context: Option<String>,
    pub important_links: BTreeMap<String, String>,
    pub metadata: BTreeMap<String, Value>,
    pub field_status: BTreeMap<Field, FieldReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub insights_summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_analysis: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub social_analysis: Option<Value>,
}

impl AggregateRecord {
    #[must_use]
    pub fn empty(store_url: impl Into<String>) -> Self {
        Self {
            store_url: store_url.into(),
            products: Vec::new(),
            hero_products: Vec::new(),
            privacy_policy: None,
            return_refund_policy: None,
            faqs: Vec::new(),
            social_handles: BTreeMap::new(),
            contact_details: ContactDetails::default(),
            brand_context: None,
            important_links: BTreeMap::new(),
            metadata: BTreeMap::new(),
            field_status: BTreeMap::new(),
            insights_summary: None,
            product_analysis: None,
            social_analysis: None,
        }
    }

    /// Stores a pipeline's outcome in its own slot and records its status.
    pub(crate) fn settle<T>(
        &mut self,
        field: Field,
        result: PartialResult<T>,
        slot: impl FnOnce(&mut Self, T),
    ) {
        let report = match result {
            PartialResult::Found { value, provenance } => {
                slot(self, value);
                FieldReport {
                    status: FieldStatus::Found,
                    provenance: Some(provenance),
                    detail: None,
                }
            }
            PartialResult::Absent(absence) => FieldReport {
                status: absence.reason.into(),
                provenance: None,
                detail: Some(absence.detail),
            },
        };
        self.field_status.insert(field, report);
    }

    #[must_use]
    pub fn status_of(&self, field: Field) -> Option<FieldStatus> {
        self.field_status.get(&field).map(|r| r.status)
    }

    /// Adds enhancement output without touching extracted fields.
    pub fn apply_enhancement(&mut self, fields: EnhancementFields) {
        self.insights_summary = fields.insights_summary;
        self.product_analysis = fields.product_analysis;
        self.social_analysis = fields.social_analysis;
    }
}
