use axum::extract::{Query, State};
use axum::http::StatusCode;
use tokio_util::sync::CancellationToken;

use crate::models::{ApiError, UrlQuery};
use crate::state::AppState;

/// `GET /pdf/forget?url=` → start extraction and answer `202` at once.
///
/// The pipeline runs detached from the request; its outcome is only logged.
pub async fn forget(
    State(state): State<AppState>,
    Query(query): Query<UrlQuery>,
) -> Result<StatusCode, ApiError> {
    let url = query.require_url()?.to_string();

    tokio::spawn(async move {
        let cancel = CancellationToken::new();
        match state.service.remote_pdf_to_text(&url, &cancel).await {
            Ok(text) => tracing::info!(url = %url, chars = text.len(), "detached extraction finished"),
            Err(e) => tracing::warn!(url = %url, kind = e.kind(), error = %e, "detached extraction failed"),
        }
    });

    Ok(StatusCode::ACCEPTED)
}
