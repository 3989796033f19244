use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    Extension, Json,
};
use serde::Deserialize;
use storelens_scraper::{AggregateRecord, InsightsError};

use super::{ApiError, ApiResponse, AppState};
use crate::middleware::RequestId;

#[derive(Debug, Deserialize)]
pub(super) struct InsightsRequest {
    website_url: String,
}

/// Runs a full extraction for `website_url`.
///
/// Partial results are a 200 with empty fields; only an invalid or
/// unreachable target is an error.
pub(super) async fn fetch_insights(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    payload: Result<Json<InsightsRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<AggregateRecord>>), ApiError> {
    let Json(request) = payload.map_err(|rejection| {
        ApiError::new(req_id.0.clone(), "bad_request", rejection.body_text())
    })?;

    tracing::info!(
        request_id = %req_id.0,
        website_url = %request.website_url,
        "insights requested"
    );

    match state.orchestrator.fetch_insights(&request.website_url).await {
        Ok(record) => {
            let message = format!("extracted insights for {}", record.store_url);
            Ok((
                StatusCode::OK,
                Json(ApiResponse::ok(req_id.0, record, message)),
            ))
        }
        Err(e) => Err(map_insights_error(req_id.0, &e)),
    }
}

fn map_insights_error(request_id: String, error: &InsightsError) -> ApiError {
    tracing::warn!(request_id = %request_id, kind = error.kind(), error = %error, "insights request failed");
    ApiError::new(request_id, "not_found", error.to_string()).with_kind(error.kind())
}
