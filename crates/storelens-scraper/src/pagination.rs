//! Catalog feed pagination.
//!
//! Storefronts that expose `/products.json` page through it with cursors
//! carried in the `Link` response header:
//!
//! ```text
//! <https://shop.com/products.json?limit=250&page_info=PREV>; rel="previous",
//! <https://shop.com/products.json?limit=250&page_info=NEXT>; rel="next"
//! ```
//!
//! Stores without cursor support simply omit the header, which ends the walk
//! after the first page.

/// Path of the public catalog feed relative to the store origin.
pub const CATALOG_FEED_PATH: &str = "/products.json";

/// Builds the catalog feed URL for `origin`, page size and optional cursor.
///
/// Returns `None` if `origin` is not a valid URL base.
#[must_use]
pub fn catalog_page_url(origin: &str, limit: u32, page_info: Option<&str>) -> Option<String> {
    let mut url = reqwest::Url::parse(origin)
        .ok()?
        .join(CATALOG_FEED_PATH)
        .ok()?;
    {
        let mut query = url.query_pairs_mut();
        query.append_pair("limit", &limit.to_string());
        if let Some(cursor) = page_info {
            query.append_pair("page_info", cursor);
        }
    }
    Some(url.into())
}

/// Returns the `page_info` cursor of the `rel="next"` link, if any.
#[must_use]
pub fn extract_next_cursor(link_header: Option<&str>) -> Option<String> {
    let target = next_link_target(link_header?)?;
    let url = reqwest::Url::parse(target).ok()?;
    url.query_pairs()
        .find(|(key, value)| key == "page_info" && !value.is_empty())
        .map(|(_, value)| value.into_owned())
}

fn next_link_target(header: &str) -> Option<&str> {
    header
        .split(',')
        .map(str::trim)
        .find(|directive| {
            directive
                .split(';')
                .skip(1)
                .any(|param| param.trim().eq_ignore_ascii_case(r#"rel="next""#))
        })
        .and_then(|directive| {
            let start = directive.find('<')? + 1;
            let end = directive.find('>')?;
            (start < end).then(|| &directive[start..end])
        })
}
