//! Target URL validation and origin helpers.

use reqwest::Url;

use crate::error::InsightsError;

/// Validates a user-supplied store URL and returns its origin (`scheme://host[:port]`).
///
/// Only absolute `http`/`https` URLs with a host are accepted. Paths, query
/// strings and fragments are dropped: every extraction starts from the root.
///
/// # Errors
///
/// Returns [`InsightsError::InvalidTarget`] for anything else. No network
/// access happens here.
pub fn normalize_target(raw: &str) -> Result<String, InsightsError> {
    let trimmed = raw.trim();
    let invalid = |reason: &str| InsightsError::InvalidTarget {
        url: raw.to_owned(),
        reason: reason.to_owned(),
    };

    if trimmed.is_empty() {
        return Err(invalid("URL is empty"));
    }

    let url = Url::parse(trimmed).map_err(|e| invalid(&e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(&format!("unsupported scheme \"{}\"", url.scheme())));
    }
    match url.host_str() {
        Some(host) if !host.is_empty() => {}
        _ => return Err(invalid("URL has no host")),
    }

    Ok(url.origin().ascii_serialization())
}

/// Extracts the hostname from `url` for throttling and error messages.
///
/// Falls back to the full string if parsing fails.
pub(crate) fn extract_domain(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_ascii_lowercase))
        .unwrap_or_else(|| url.to_owned())
}
