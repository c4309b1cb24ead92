//! `GET /v2?url=`: normalized, cached link preview.

use axum::Json;
use axum::extract::{Query, State};
use axum::extract::rejection::QueryRejection;
use serde::{Deserialize, Serialize};

use linkpeek_core::LinkPreview;

use crate::error::ApiError;
use crate::handler::AppState;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PreviewQuery {
    /// The page to preview; the scheme may be omitted.
    pub url: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PreviewResponse {
    pub metadata: LinkPreview,
}

pub async fn preview(
    State(state): State<AppState>, query: Result<Query<PreviewQuery>, QueryRejection>,
) -> Result<Json<PreviewResponse>, ApiError> {
    let Ok(Query(PreviewQuery { url: Some(url) })) = query else {
        return Err(ApiError::InvalidUrl("missing url parameter".into()));
    };

    let preview = state.service.preview(&url).await?;
    tracing::debug!(url, source = preview.source.as_str(), "preview served");

    Ok(Json(PreviewResponse { metadata: preview.metadata }))
}
