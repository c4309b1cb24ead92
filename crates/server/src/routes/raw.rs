//! `GET /?url=`: raw extraction, uncached.
//!
//! Kept for older clients. Always answers 200; any failure yields
//! `{"metadata": null}`.

use axum::Json;
use axum::extract::{Query, State};
use axum::extract::rejection::QueryRejection;
use serde::Serialize;

use linkpeek_client::RawExtraction;

use super::preview::PreviewQuery;
use crate::handler::AppState;

#[derive(Debug, Clone, Serialize)]
pub struct RawResponse {
    pub metadata: Option<RawExtraction>,
}

pub async fn raw_metadata(
    State(state): State<AppState>, query: Result<Query<PreviewQuery>, QueryRejection>,
) -> Json<RawResponse> {
    let Some(url) = query.ok().and_then(|Query(q)| q.url) else {
        return Json(RawResponse { metadata: None });
    };

    let metadata = state
        .service
        .extract_raw(&url)
        .await
        .inspect_err(|e| tracing::debug!(url, error = %e, "raw extraction failed"))
        .ok();

    Json(RawResponse { metadata })
}
