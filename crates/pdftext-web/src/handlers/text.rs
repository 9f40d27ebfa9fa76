use axum::extract::{Query, State};
use tokio_util::sync::CancellationToken;

use crate::models::{ApiError, UrlQuery};
use crate::state::AppState;

/// `GET /pdf?url=` → dehyphenated plain text.
pub async fn text(
    State(state): State<AppState>,
    Query(query): Query<UrlQuery>,
) -> Result<String, ApiError> {
    let url = query.require_url()?;
    let cancel = CancellationToken::new();
    // Client disconnect drops this future, which cancels the pipeline.
    let _guard = cancel.clone().drop_guard();

    let text = state.service.remote_pdf_to_text(url, &cancel).await?;
    tracing::info!(url, chars = text.len(), "text extracted");
    Ok(text)
}
