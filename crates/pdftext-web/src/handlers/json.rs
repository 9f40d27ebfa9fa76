use axum::Json;
use axum::extract::{Query, State};
use tokio_util::sync::CancellationToken;

use pdftext_core::ResultMap;

use crate::models::{ApiError, UrlQuery};
use crate::state::AppState;

/// `GET /pdf/json?url=[&key=]` → document metadata plus text.
pub async fn json(
    State(state): State<AppState>,
    Query(query): Query<UrlQuery>,
) -> Result<Json<ResultMap>, ApiError> {
    let url = query.require_url()?;
    let key = query.key.as_deref().map(str::trim).filter(|k| !k.is_empty());
    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();

    let result = state.service.remote_pdf_to_json(url, key, &cancel).await?;
    tracing::info!(url, fields = result.len(), "metadata extracted");
    Ok(Json(result))
}
