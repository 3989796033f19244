//! Wire types for the public `/products.json` catalog feed.
//!
//! ## Observed shape
//!
//! ### Tags
//! Current storefronts return tags as a JSON array of strings. Older themes
//! and some proxies still serve the legacy comma-separated string, so both
//! forms are accepted and normalized to a list.
//!
//! ### Prices
//! Decimal strings (`"30.00"`). `compare_at_price` is explicitly `null` when
//! the variant is not on sale. Both are passed through untouched.
//!
//! ### `available`
//! Absent on some older stores; treated as unknown rather than guessed.

use serde::{Deserialize, Deserializer};

/// Top-level response from `GET /products.json`.
#[derive(Debug, Deserialize)]
pub struct CatalogResponse {
    pub products: Vec<CatalogProduct>,
}

/// A single product from the catalog feed.
#[derive(Debug, Deserialize)]
pub struct CatalogProduct {
    pub id: i64,

    pub title: String,

    /// URL slug for the product page.
    pub handle: String,

    /// Raw HTML description. May be `null` or absent.
    #[serde(default)]
    pub body_html: Option<String>,

    #[serde(default)]
    pub vendor: Option<String>,

    /// May be an empty string, normalized to `None` downstream.
    #[serde(default)]
    pub product_type: Option<String>,

    #[serde(default, deserialize_with = "deserialize_tags")]
    pub tags: Vec<String>,

    #[serde(default)]
    pub created_at: Option<String>,

    #[serde(default)]
    pub updated_at: Option<String>,

    #[serde(default)]
    pub published_at: Option<String>,

    #[serde(default)]
    pub images: Vec<CatalogImage>,

    #[serde(default)]
    pub options: Vec<CatalogOption>,

    #[serde(default)]
    pub variants: Vec<CatalogVariant>,
}

/// A purchasable variant of a [`CatalogProduct`].
#[derive(Debug, Deserialize)]
pub struct CatalogVariant {
    pub id: i64,

    /// Size/colour string or `"Default Title"`.
    pub title: String,

    #[serde(default)]
    pub sku: Option<String>,

    #[serde(default)]
    pub price: Option<String>,

    #[serde(default)]
    pub compare_at_price: Option<String>,

    #[serde(default)]
    pub available: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct CatalogImage {
    /// Canonical CDN URL.
    pub src: String,
    #[serde(default)]
    pub alt: Option<String>,
}

/// A named option axis (`"Size"`, `"Color"`) with its values.
#[derive(Debug, Deserialize)]
pub struct CatalogOption {
    pub name: String,
    #[serde(default)]
    pub values: Vec<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawTags {
    List(Vec<String>),
    Joined(String),
}

fn deserialize_tags<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<RawTags>::deserialize(deserializer)?;
    Ok(match raw {
        Some(RawTags::List(tags)) => tags,
        Some(RawTags::Joined(joined)) => joined
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_owned)
            .collect(),
        None => Vec::new(),
    })
}
