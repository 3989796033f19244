//! `FetchClient` against local `wiremock` servers, and the orchestrator
//! running on top of it.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use storelens_core::LlmConfig;
use storelens_scraper::{
    AggregateRecord, Enhancer, FetchClient, FetchError, FetchErrorKind, Field, FieldStatus,
    InsightsError, LlmEnhancer, Orchestrator, OrchestratorConfig, PageFetcher,
};

const TIMEOUT: Duration = Duration::from_secs(5);

/// No retries, no politeness delay.
fn test_client() -> FetchClient {
    FetchClient::new("storelens-test/0.1", 0, 0, Duration::ZERO)
        .expect("failed to build test FetchClient")
}

fn test_client_with_retries(max_retries: u32) -> FetchClient {
    FetchClient::new("storelens-test/0.1", max_retries, 1, Duration::ZERO)
        .expect("failed to build test FetchClient")
}

#[tokio::test]
async fn fetch_returns_body_status_and_link_header() {
    let server = MockServer::start().await;
    let next = format!(
        "<{}/products.json?limit=250&page_info=abc>; rel=\"next\"",
        server.uri()
    );
    Mock::given(method("GET"))
        .and(path("/products.json"))
        .and(header("user-agent", "storelens-test/0.1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(r#"{"products":[]}"#)
                .insert_header("Link", next.as_str()),
        )
        .mount(&server)
        .await;

    let url = format!("{}/products.json?limit=250", server.uri());
    let page = test_client().fetch(&url, TIMEOUT).await.unwrap();

    assert_eq!(page.status, 200);
    assert_eq!(page.body, r#"{"products":[]}"#);
    assert_eq!(page.link_header.as_deref(), Some(next.as_str()));
}

#[tokio::test]
async fn not_found_is_its_own_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let err = test_client()
        .fetch(&format!("{}/pages/faq", server.uri()), TIMEOUT)
        .await
        .unwrap_err();

    assert!(matches!(err, FetchError::NotFound { .. }), "got {err:?}");
    assert_eq!(err.kind(), FetchErrorKind::HttpError);
}

#[tokio::test]
async fn server_errors_are_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let err = test_client_with_retries(2)
        .fetch(&format!("{}/pages/contact", server.uri()), TIMEOUT)
        .await
        .unwrap_err();

    assert!(matches!(err, FetchError::HttpStatus { status: 500, .. }));
}

#[tokio::test]
async fn rate_limit_is_retried_then_succeeds() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "0"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
        .mount(&server)
        .await;

    let page = test_client_with_retries(1)
        .fetch(&format!("{}/", server.uri()), TIMEOUT)
        .await
        .unwrap();

    assert_eq!(page.body, "<html></html>");
}

#[tokio::test]
async fn rate_limit_gives_up_after_retries() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "1"))
        .expect(2)
        .mount(&server)
        .await;

    let err = test_client_with_retries(1)
        .fetch(&format!("{}/", server.uri()), TIMEOUT)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        FetchError::RateLimited {
            retry_after_secs: 1,
            ..
        }
    ));
}

#[tokio::test]
async fn rate_limit_waits_for_retry_after() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "1"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
        .mount(&server)
        .await;

    let started = Instant::now();
    test_client_with_retries(1)
        .fetch(&format!("{}/", server.uri()), TIMEOUT)
        .await
        .unwrap();

    assert!(started.elapsed() >= Duration::from_secs(1));
}

#[tokio::test]
async fn slow_response_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
        .mount(&server)
        .await;

    let err = test_client()
        .fetch(&format!("{}/", server.uri()), Duration::from_millis(200))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), FetchErrorKind::Timeout);
}

#[tokio::test]
async fn timeout_bounds_retries_too() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
        .mount(&server)
        .await;

    let started = Instant::now();
    let err = test_client_with_retries(3)
        .fetch(&format!("{}/", server.uri()), Duration::from_millis(300))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), FetchErrorKind::Timeout);
    assert!(started.elapsed() < Duration::from_millis(900), "took {:?}", started.elapsed());
}

#[tokio::test]
async fn slow_first_policy_candidate_falls_through_to_the_next() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html><title>Boot Co</title></html>"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/pages/privacy-policy"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/pages/privacy"))
        .respond_with(ResponseTemplate::new(200).set_body_string(format!(
            "<main><h1>Privacy policy</h1><p>{}</p></main>",
            "We only use your personal information to fulfil orders. ".repeat(5)
        )))
        .mount(&server)
        .await;

    let config = OrchestratorConfig {
        fetch_timeout: Duration::from_millis(300),
        request_deadline: Duration::from_secs(1),
        ..OrchestratorConfig::default()
    };
    let orchestrator = Orchestrator::new(Arc::new(test_client_with_retries(3)), config);
    let record = orchestrator.fetch_insights(&server.uri()).await.unwrap();

    assert_eq!(record.status_of(Field::PrivacyPolicy), Some(FieldStatus::Found));
    assert!(record
        .privacy_policy
        .as_deref()
        .unwrap()
        .contains("personal information"));
}

#[tokio::test]
async fn orchestrator_reports_dns_failure_as_unreachable() {
    let orchestrator = Orchestrator::new(Arc::new(test_client()), OrchestratorConfig::default());

    let err = orchestrator
        .fetch_insights("https://storelens-test.invalid")
        .await
        .unwrap_err();

    assert!(
        matches!(err, InsightsError::TargetUnreachable { .. }),
        "got {err:?}"
    );
    assert_eq!(err.kind(), "TargetUnreachableError");
}

#[tokio::test]
async fn orchestrator_over_http_reads_catalog_and_policies() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<html><head><title>Boot Co</title></head>
               <body><footer><a href="mailto:hello@boots.example.com">Email</a></footer></body></html>"#,
        ))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/products.json"))
        .and(query_param("limit", "250"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "products": [{"id": 7, "title": "Work Boot", "handle": "work-boot", "variants": []}]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/policies/refund-policy"))
        .respond_with(ResponseTemplate::new(200).set_body_string(format!(
            "<main><h1>Refund policy</h1><p>{}</p></main>",
            "Unworn items can be returned within 30 days for a full refund. ".repeat(5)
        )))
        .mount(&server)
        .await;

    let orchestrator = Orchestrator::new(Arc::new(test_client()), OrchestratorConfig::default());
    let record: AggregateRecord = orchestrator.fetch_insights(&server.uri()).await.unwrap();

    assert_eq!(record.products.len(), 1);
    assert_eq!(record.products[0].title, "Work Boot");
    assert!(record
        .return_refund_policy
        .as_deref()
        .unwrap()
        .starts_with("Refund policy"));
    assert_eq!(record.status_of(Field::PrivacyPolicy), Some(FieldStatus::NotFound));
    assert_eq!(record.contact_details.emails, vec!["hello@boots.example.com"]);
    assert_eq!(record.metadata["title"], "Boot Co");
}

fn llm_config(base_url: String) -> LlmConfig {
    LlmConfig {
        api_key: "test-key".to_owned(),
        base_url,
        model: "test-model".to_owned(),
        timeout_secs: 5,
    }
}

#[tokio::test]
async fn llm_enhancer_reads_chat_completion_content() {
    let server = MockServer::start().await;
    let content = json!({
        "insights_summary": "A small boot maker.",
        "product_analysis": {"categories": {"boots": 1}, "analysis": "Focused range."},
        "social_analysis": {"analysis": "Instagram only.", "recommendations": ["Try TikTok"]}
    })
    .to_string();
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer test-key"))
        .and(body_partial_json(json!({"model": "test-model"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content": content}}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let enhancer = LlmEnhancer::new(&llm_config(format!("{}/v1", server.uri()))).unwrap();
    let record = AggregateRecord::empty("https://boots.example.com");
    let fields = enhancer.enhance(&record).await.unwrap();

    assert_eq!(fields.insights_summary.as_deref(), Some("A small boot maker."));
    assert_eq!(fields.product_analysis.unwrap()["categories"]["boots"], 1);
    assert_eq!(
        fields.social_analysis.unwrap()["recommendations"][0],
        "Try TikTok"
    );
}

#[tokio::test]
async fn llm_enhancer_error_status_is_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let enhancer = LlmEnhancer::new(&llm_config(server.uri())).unwrap();
    let result = enhancer
        .enhance(&AggregateRecord::empty("https://boots.example.com"))
        .await;

    assert!(result.is_err());
}
