use axum::extract::{Query, State};
use tokio_util::sync::CancellationToken;

use crate::models::{ApiError, UrlQuery};
use crate::state::AppState;

/// `GET /pdf/large?url=` → text produced by the external extractor.
pub async fn large(
    State(state): State<AppState>,
    Query(query): Query<UrlQuery>,
) -> Result<String, ApiError> {
    let url = query.require_url()?;
    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();

    let text = state
        .service
        .remote_pdf_to_text_external(url, &cancel)
        .await?;
    tracing::info!(url, chars = text.len(), "text extracted by external tool");
    Ok(text)
}
