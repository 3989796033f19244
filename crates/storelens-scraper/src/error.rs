use serde::Serialize;
use thiserror::Error;

/// Transport-level failure for a single storefront request.
///
/// Always field-local: the orchestrator converts these into an absence for
/// the field that issued the request, except on the store root where a
/// DNS or connection failure means the whole target is unreachable.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} timed out")]
    Timeout { url: String },

    #[error("DNS resolution failed for {url}: {message}")]
    Dns { url: String, message: String },

    #[error("connection to {url} failed: {message}")]
    Connection { url: String, message: String },

    #[error("page not found: {url}")]
    NotFound { url: String },

    #[error("unexpected HTTP status {status} from {url}")]
    HttpStatus { status: u16, url: String },

    #[error("rate limited by {domain} (retry after {retry_after_secs}s)")]
    RateLimited {
        domain: String,
        retry_after_secs: u64,
    },

    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

/// The coarse failure kinds exposed at the fetch boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchErrorKind {
    Timeout,
    Dns,
    HttpError,
    Connection,
}

impl FetchError {
    #[must_use]
    pub fn kind(&self) -> FetchErrorKind {
        match self {
            FetchError::Timeout { .. } => FetchErrorKind::Timeout,
            FetchError::Dns { .. } => FetchErrorKind::Dns,
            FetchError::Connection { .. } | FetchError::Client(_) => FetchErrorKind::Connection,
            FetchError::NotFound { .. }
            | FetchError::HttpStatus { .. }
            | FetchError::RateLimited { .. } => FetchErrorKind::HttpError,
        }
    }

    /// `true` when the host itself could not be reached, as opposed to the
    /// host answering with an error or answering too slowly.
    #[must_use]
    pub fn is_host_unreachable(&self) -> bool {
        matches!(self.kind(), FetchErrorKind::Dns | FetchErrorKind::Connection)
    }

    /// Classifies a `reqwest` transport error for `url`.
    pub(crate) fn from_reqwest(url: &str, err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            return FetchError::Timeout {
                url: url.to_owned(),
            };
        }

        let message = error_chain_message(err);
        if looks_like_dns_failure(&message) {
            FetchError::Dns {
                url: url.to_owned(),
                message,
            }
        } else {
            FetchError::Connection {
                url: url.to_owned(),
                message,
            }
        }
    }
}

fn error_chain_message(err: &reqwest::Error) -> String {
    let mut message = err.to_string();
    let mut source = std::error::Error::source(err);
    while let Some(inner) = source {
        message.push_str(": ");
        message.push_str(&inner.to_string());
        source = inner.source();
    }
    message
}

fn looks_like_dns_failure(message: &str) -> bool {
    let lowered = message.to_ascii_lowercase();
    lowered.contains("dns error")
        || lowered.contains("failed to lookup address")
        || lowered.contains("name or service not known")
        || lowered.contains("no such host")
        || lowered.contains("nodename nor servname")
}

/// Request-fatal errors. Everything else degrades into per-field absence.
#[derive(Debug, Error)]
pub enum InsightsError {
    #[error("invalid target URL \"{url}\": {reason}")]
    InvalidTarget { url: String, reason: String },

    #[error("target {url} is unreachable: {source}")]
    TargetUnreachable {
        url: String,
        #[source]
        source: FetchError,
    },
}

impl InsightsError {
    /// Stable machine-readable name of the error kind.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            InsightsError::InvalidTarget { .. } => "InvalidTargetError",
            InsightsError::TargetUnreachable { .. } => "TargetUnreachableError",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_and_rate_limit_are_http_errors() {
        let not_found = FetchError::NotFound {
            url: "https://shop.example/pages/faq".to_owned(),
        };
        let limited = FetchError::RateLimited {
            domain: "shop.example".to_owned(),
            retry_after_secs: 2,
        };
        assert_eq!(not_found.kind(), FetchErrorKind::HttpError);
        assert_eq!(limited.kind(), FetchErrorKind::HttpError);
        assert!(!not_found.is_host_unreachable());
    }

    #[test]
    fn dns_and_connection_failures_mean_unreachable_host() {
        let dns = FetchError::Dns {
            url: "https://nope.invalid".to_owned(),
            message: "dns error".to_owned(),
        };
        let refused = FetchError::Connection {
            url: "https://127.0.0.1:1".to_owned(),
            message: "connection refused".to_owned(),
        };
        assert!(dns.is_host_unreachable());
        assert!(refused.is_host_unreachable());
    }

    #[test]
    fn timeout_is_not_unreachable() {
        let timeout = FetchError::Timeout {
            url: "https://slow.example".to_owned(),
        };
        assert_eq!(timeout.kind(), FetchErrorKind::Timeout);
        assert!(!timeout.is_host_unreachable());
    }

    #[test]
    fn dns_detection_matches_resolver_messages() {
        assert!(looks_like_dns_failure(
            "error sending request: client error (Connect): dns error: failed to lookup address information"
        ));
        assert!(!looks_like_dns_failure("tcp connect error: Connection refused"));
    }

    #[test]
    fn insights_error_kind_names() {
        let invalid = InsightsError::InvalidTarget {
            url: "ftp://x".to_owned(),
            reason: "unsupported scheme".to_owned(),
        };
        assert_eq!(invalid.kind(), "InvalidTargetError");
    }
}
