mod insights;

use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, HeaderName, Method, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use storelens_scraper::Orchestrator;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::middleware::{request_id, RequestId};

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub enhancement_enabled: bool,
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ResponseMeta {
    pub request_id: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub success: bool,
    pub error: ErrorBody,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<&'static str>,
    pub message: String,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
struct HealthData {
    status: &'static str,
    enhancement: &'static str,
}

impl ResponseMeta {
    pub(super) fn new(request_id: String) -> Self {
        Self {
            request_id,
            timestamp: Utc::now(),
        }
    }
}

impl<T: Serialize> ApiResponse<T> {
    pub(super) fn ok(request_id: String, data: T, message: impl Into<String>) -> Self {
        Self {
            success: true,
            data,
            message: Some(message.into()),
            meta: ResponseMeta::new(request_id),
        }
    }
}

impl ApiError {
    pub fn new(
        request_id: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            success: false,
            error: ErrorBody {
                code: code.into(),
                kind: None,
                message: message.into(),
            },
            meta: ResponseMeta::new(request_id.into()),
        }
    }

    #[must_use]
    pub fn with_kind(mut self, kind: &'static str) -> Self {
        self.error.kind = Some(kind);
        self
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = match self.error.code.as_str() {
            "not_found" => StatusCode::NOT_FOUND,
            "bad_request" => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(self)).into_response()
    }
}

fn build_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([
            header::CONTENT_TYPE,
            HeaderName::from_static("x-request-id"),
        ])
}

pub fn build_app(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/health", get(health))
        .route("/api/v1/insights", post(insights::fetch_insights))
        .route("/fetch-insights", post(insights::fetch_insights))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(build_cors())
                .layer(axum::middleware::from_fn(request_id)),
        )
        .with_state(state)
}

async fn health(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> impl IntoResponse {
    let enhancement = if state.enhancement_enabled {
        "enabled"
    } else {
        "disabled"
    };
    (
        StatusCode::OK,
        Json(ApiResponse {
            success: true,
            data: HealthData {
                status: "ok",
                enhancement,
            },
            message: None,
            meta: ResponseMeta::new(req_id.0),
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use storelens_scraper::{FetchError, OrchestratorConfig, PageFetcher, RawPage};
    use tower::ServiceExt;

    const HOMEPAGE: &str = r#"
    <html><head><title>Boot Co</title></head>
    <body>
      <footer>
        <a href="https://instagram.com/bootco">Instagram</a>
        <a href="mailto:hello@boots.example.com">Email</a>
      </footer>
    </body></html>
    "#;

    /// Serves a homepage for `boots.example.com`, a DNS failure for
    /// `gone.example.com` and 404 for everything else.
    #[derive(Default)]
    struct StubFetcher {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl PageFetcher for StubFetcher {
        async fn fetch(&self, url: &str, _timeout: Duration) -> Result<RawPage, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if url.starts_with("https://gone.example.com") {
                return Err(FetchError::Dns {
                    url: url.to_owned(),
                    message: "no such host".to_owned(),
                });
            }
            if url == "https://boots.example.com/" {
                return Ok(RawPage::new(url, HOMEPAGE));
            }
            Err(FetchError::NotFound {
                url: url.to_owned(),
            })
        }
    }

    fn app_with(fetcher: Arc<StubFetcher>) -> Router {
        let orchestrator = Orchestrator::new(fetcher, OrchestratorConfig::default());
        build_app(AppState {
            orchestrator: Arc::new(orchestrator),
            enhancement_enabled: false,
        })
    }

    fn app() -> Router {
        app_with(Arc::new(StubFetcher::default()))
    }

    fn post_json(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_owned()))
            .expect("request")
    }

    async fn json_body(response: axum::response::Response) -> serde_json::Value {
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body bytes");
        serde_json::from_slice(&body).expect("json parse")
    }

    #[test]
    fn api_error_codes_map_to_statuses() {
        let not_found = ApiError::new("req-1", "not_found", "gone").into_response();
        let bad = ApiError::new("req-1", "bad_request", "missing field").into_response();
        let other = ApiError::new("req-1", "internal_error", "boom").into_response();
        assert_eq!(not_found.status(), StatusCode::NOT_FOUND);
        assert_eq!(bad.status(), StatusCode::BAD_REQUEST);
        assert_eq!(other.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn health_reports_ok_and_echoes_request_id() {
        let response = app()
            .oneshot(
                Request::builder()
                    .uri("/api/v1/health")
                    .header("x-request-id", "req-health")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get("x-request-id").unwrap(),
            "req-health"
        );
        let json = json_body(response).await;
        assert_eq!(json["data"]["status"], "ok");
        assert_eq!(json["data"]["enhancement"], "disabled");
        assert_eq!(json["meta"]["request_id"], "req-health");
    }

    #[tokio::test]
    async fn insights_returns_partial_record_as_success() {
        let response = app()
            .oneshot(post_json(
                "/api/v1/insights",
                r#"{"website_url": "https://boots.example.com"}"#,
            ))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        assert_eq!(json["success"], true);
        assert_eq!(json["data"]["store_url"], "https://boots.example.com");
        assert_eq!(json["data"]["social_handles"]["instagram"], "bootco");
        assert_eq!(
            json["data"]["contact_details"]["emails"][0],
            "hello@boots.example.com"
        );
        assert_eq!(json["data"]["products"], serde_json::json!([]));
        assert_eq!(json["data"]["privacy_policy"], serde_json::Value::Null);
        assert!(json["data"].get("insights_summary").is_none());
    }

    #[tokio::test]
    async fn legacy_route_serves_the_same_handler() {
        let response = app()
            .oneshot(post_json(
                "/fetch-insights",
                r#"{"website_url": "https://boots.example.com/collections/all"}"#,
            ))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        assert_eq!(json["data"]["store_url"], "https://boots.example.com");
    }

    #[tokio::test]
    async fn invalid_url_is_not_found_without_fetching() {
        let fetcher = Arc::new(StubFetcher::default());
        let response = app_with(Arc::clone(&fetcher))
            .oneshot(post_json(
                "/api/v1/insights",
                r#"{"website_url": "ftp://boots.example.com"}"#,
            ))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let json = json_body(response).await;
        assert_eq!(json["success"], false);
        assert_eq!(json["error"]["kind"], "InvalidTargetError");
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unreachable_host_is_not_found() {
        let response = app()
            .oneshot(post_json(
                "/api/v1/insights",
                r#"{"website_url": "https://gone.example.com"}"#,
            ))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let json = json_body(response).await;
        assert_eq!(json["error"]["code"], "not_found");
        assert_eq!(json["error"]["kind"], "TargetUnreachableError");
    }

    #[tokio::test]
    async fn missing_website_url_is_bad_request() {
        let response = app()
            .oneshot(post_json("/api/v1/insights", r#"{"url": "x"}"#))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = json_body(response).await;
        assert_eq!(json["error"]["code"], "bad_request");
    }
}
