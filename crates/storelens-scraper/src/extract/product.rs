use std::collections::HashSet;

use scraper::{ElementRef, Html};

use super::Extractor;
use crate::client::RawPage;
use crate::html::{absolutize_url, clean_text, element_text, selector, TextScope};
use crate::record::{HeroProduct, PartialResult, Product, ProductOption, ProductVariant};
use crate::types::{CatalogProduct, CatalogResponse};

/// Featured-section product markup, most specific first.
const HERO_SELECTORS: &str = "[class*='hero'] [class*='product'], \
    [class*='featured'] [class*='product'], \
    [class*='banner'] [class*='product'], \
    [class*='slider'] [class*='product'], \
    [class*='carousel'] [class*='product']";

/// Generic product-card markup used by most themes.
const CARD_SELECTORS: &str = ".product-item, .product-card, .product-tile, .grid-product, \
    .card--product, [data-product-id], [data-product-handle]";

const PRODUCT_LINK_SELECTOR: &str = "a[href*='/products/']";

const TITLE_SELECTORS: &str = "h1, h2, h3, h4, h5, .product-title, .product__title, \
    .card__heading, [class*='title'], [class*='name']";

const PRICE_SELECTORS: &str = "[class*='price'], .money";

/// Number of bare product links taken when a homepage has no card markup.
const HERO_LINK_FALLBACK: usize = 10;

const MAX_TITLE_CHARS: usize = 200;

/// Parses the JSON catalog feed (`/products.json`).
#[derive(Debug, Default)]
pub struct CatalogExtractor;

impl Extractor for CatalogExtractor {
    type Output = Vec<Product>;

    fn name(&self) -> &'static str {
        "catalog_feed"
    }

    fn extract(&self, page: &RawPage) -> PartialResult<Vec<Product>> {
        let response = match serde_json::from_str::<CatalogResponse>(&page.body) {
            Ok(response) => response,
            Err(e) => {
                return PartialResult::parse_error(format!(
                    "catalog feed at {} is not valid JSON: {e}",
                    page.url
                ))
            }
        };

        if response.products.is_empty() {
            return PartialResult::not_found(format!("catalog feed at {} is empty", page.url));
        }

        let origin = reqwest::Url::parse(&page.url)
            .map(|u| u.origin().ascii_serialization())
            .unwrap_or_default();
        let products = response
            .products
            .into_iter()
            .map(|p| normalize_catalog_product(&origin, p))
            .collect();
        PartialResult::found(products, &page.url, self.name())
    }
}

fn normalize_catalog_product(origin: &str, product: CatalogProduct) -> Product {
    let first_variant = product.variants.first();
    let price = first_variant.and_then(|v| v.price.clone());
    let compare_at_price = first_variant.and_then(|v| v.compare_at_price.clone());
    let available = product
        .variants
        .iter()
        .filter_map(|v| v.available)
        .reduce(|a, b| a || b);

    let description = product
        .body_html
        .as_deref()
        .map(|html| element_text(Html::parse_fragment(html).root_element(), TextScope::Visible))
        .filter(|text| !text.is_empty());

    let images: Vec<String> = product.images.into_iter().map(|i| i.src).collect();

    Product {
        id: Some(product.id),
        url: (!origin.is_empty()).then(|| format!("{origin}/products/{}", product.handle)),
        handle: Some(product.handle),
        title: product.title,
        vendor: product.vendor.filter(|v| !v.trim().is_empty()),
        product_type: product.product_type.filter(|t| !t.trim().is_empty()),
        description,
        tags: product.tags,
        price,
        compare_at_price,
        available,
        image: images.first().cloned(),
        images,
        options: product
            .options
            .into_iter()
            .map(|o| ProductOption {
                name: o.name,
                values: o.values,
            })
            .collect(),
        variants: product
            .variants
            .into_iter()
            .map(|v| ProductVariant {
                id: v.id,
                title: v.title,
                sku: v.sku.filter(|s| !s.trim().is_empty()),
                price: v.price,
                compare_at_price: v.compare_at_price,
                available: v.available,
            })
            .collect(),
        created_at: product.created_at,
        updated_at: product.updated_at,
        published_at: product.published_at,
    }
}

/// Scrapes product cards from a storefront listing page.
#[derive(Debug, Default)]
pub struct ProductCardExtractor;

impl Extractor for ProductCardExtractor {
    type Output = Vec<Product>;

    fn name(&self) -> &'static str {
        "product_cards"
    }

    fn extract(&self, page: &RawPage) -> PartialResult<Vec<Product>> {
        let doc = Html::parse_document(&page.body);
        let mut seen = HashSet::new();
        let mut cards = collect_cards(&doc, &page.url, CARD_SELECTORS, &mut seen);
        cards.extend(collect_link_cards(&doc, &page.url, usize::MAX, &mut seen));

        if cards.is_empty() {
            return PartialResult::not_found(format!("no product cards on {}", page.url));
        }
        let products = cards.into_iter().map(product_from_card).collect();
        PartialResult::found(products, &page.url, self.name())
    }
}

fn product_from_card(card: HeroProduct) -> Product {
    let handle = card
        .url
        .split("/products/")
        .nth(1)
        .map(|rest| rest.trim_end_matches('/').to_owned())
        .filter(|h| !h.is_empty());
    Product {
        id: None,
        title: card.title,
        handle,
        url: Some(card.url),
        vendor: None,
        product_type: None,
        description: None,
        tags: Vec::new(),
        price: card.price,
        compare_at_price: None,
        available: None,
        images: card.image.iter().cloned().collect(),
        image: card.image,
        options: Vec::new(),
        variants: Vec::new(),
        created_at: None,
        updated_at: None,
        published_at: None,
    }
}

/// Products featured on the homepage, independent of the catalog.
#[derive(Debug)]
pub struct HeroProductExtractor {
    max_products: usize,
}

impl HeroProductExtractor {
    #[must_use]
    pub fn new(max_products: usize) -> Self {
        Self { max_products }
    }
}

impl Extractor for HeroProductExtractor {
    type Output = Vec<HeroProduct>;

    fn name(&self) -> &'static str {
        "hero_markup"
    }

    fn extract(&self, page: &RawPage) -> PartialResult<Vec<HeroProduct>> {
        let doc = Html::parse_document(&page.body);
        let mut seen = HashSet::new();

        let mut featured = collect_cards(&doc, &page.url, HERO_SELECTORS, &mut seen);
        let cards = collect_cards(&doc, &page.url, CARD_SELECTORS, &mut seen);
        let (mut heroes, technique) = if !featured.is_empty() {
            featured.extend(cards);
            (featured, "featured_section")
        } else if !cards.is_empty() {
            (cards, "product_cards")
        } else {
            let links = collect_link_cards(&doc, &page.url, HERO_LINK_FALLBACK, &mut seen);
            (links, "product_links")
        };
        heroes.truncate(self.max_products);

        if heroes.is_empty() {
            return PartialResult::not_found(format!("no featured products on {}", page.url));
        }
        PartialResult::found(heroes, &page.url, self.name()).with_technique(technique)
    }
}

fn collect_cards(
    doc: &Html,
    base_url: &str,
    css: &str,
    seen: &mut HashSet<String>,
) -> Vec<HeroProduct> {
    let Some(sel) = selector(css) else {
        return Vec::new();
    };
    doc.select(&sel)
        .filter_map(|el| parse_card(el, base_url))
        .filter(|card| seen.insert(card.url.clone()))
        .collect()
}

fn collect_link_cards(
    doc: &Html,
    base_url: &str,
    limit: usize,
    seen: &mut HashSet<String>,
) -> Vec<HeroProduct> {
    let Some(sel) = selector(PRODUCT_LINK_SELECTOR) else {
        return Vec::new();
    };
    doc.select(&sel)
        .filter_map(|a| parse_card(a, base_url))
        .filter(|card| seen.insert(card.url.clone()))
        .take(limit)
        .collect()
}

fn parse_card(el: ElementRef<'_>, base_url: &str) -> Option<HeroProduct> {
    let link = card_link(el)?;
    let url = link
        .value()
        .attr("href")
        .and_then(|href| product_url(base_url, href))?;

    let title = first_text(el, TITLE_SELECTORS)
        .or_else(|| Some(element_text(link, TextScope::Visible)).filter(|t| !t.is_empty()))
        .or_else(|| first_attr(el, "img", "alt").map(clean_text))
        .or_else(|| el.value().attr("title").map(clean_text))
        .filter(|t| !t.is_empty() && t.chars().count() <= MAX_TITLE_CHARS)?;

    let price = first_text(el, PRICE_SELECTORS);
    let image = card_image(el).and_then(|src| absolutize_url(base_url, &src));

    Some(HeroProduct {
        title,
        url,
        price,
        image,
    })
}

/// The card's own anchor, its first product link, or its first link.
fn card_link(el: ElementRef<'_>) -> Option<ElementRef<'_>> {
    if el.value().name() == "a" {
        return el.value().attr("href").map(|_| el);
    }
    selector(PRODUCT_LINK_SELECTOR)
        .and_then(|sel| el.select(&sel).next())
        .or_else(|| selector("a[href]").and_then(|sel| el.select(&sel).next()))
}

fn product_url(base_url: &str, href: &str) -> Option<String> {
    let absolute = absolutize_url(base_url, href)?;
    let mut url = reqwest::Url::parse(&absolute).ok()?;
    url.set_query(None);
    Some(url.into())
}

fn card_image(el: ElementRef<'_>) -> Option<String> {
    let sel = selector("img")?;
    el.select(&sel).find_map(|img| {
        let attrs = img.value();
        attrs
            .attr("src")
            .or_else(|| attrs.attr("data-src"))
            .map(str::to_owned)
            .or_else(|| {
                attrs
                    .attr("srcset")
                    .or_else(|| attrs.attr("data-srcset"))
                    .and_then(|set| set.split_whitespace().next())
                    .map(|first| first.trim_end_matches(',').to_owned())
            })
            .filter(|src| !src.trim().is_empty())
    })
}

fn first_text(el: ElementRef<'_>, css: &str) -> Option<String> {
    let sel = selector(css)?;
    el.select(&sel)
        .map(|node| element_text(node, TextScope::Visible))
        .find(|text| !text.is_empty())
}

fn first_attr<'a>(el: ElementRef<'a>, css: &str, attr: &str) -> Option<&'a str> {
    let sel = selector(css)?;
    el.select(&sel).find_map(|node| node.value().attr(attr))
}

#[cfg(test)]
#[path = "product_test.rs"]
mod tests;
