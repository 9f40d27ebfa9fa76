use axum::body::Body;
use axum::extract::{Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use futures_util::StreamExt;
use tokio_util::sync::CancellationToken;

use crate::models::{ApiError, UrlQuery};
use crate::state::AppState;

/// `GET /stream?url=` → raw extracted lines as a chunked body.
///
/// Lines are sent as the producer reads them, without dehyphenation. A
/// failure after the first chunk can only abort the body.
pub async fn stream(
    State(state): State<AppState>,
    Query(query): Query<UrlQuery>,
) -> Result<Response, ApiError> {
    let url = query.require_url()?.to_string();
    let cancel = CancellationToken::new();
    let guard = cancel.clone().drop_guard();

    let lines = state.service.remote_pdf_raw_lines(&url, &cancel).await?;

    // The guard moves into the body so cancellation fires when the client
    // stops reading, not when this handler returns.
    let body = lines.map(move |line| {
        let _guard = &guard;
        match line {
            Ok(mut line) => {
                line.push('\n');
                Ok(Bytes::from(line))
            }
            Err(e) => {
                tracing::warn!(url = %url, kind = e.kind(), error = %e, "stream aborted");
                Err(e)
            }
        }
    });

    Ok((
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        Body::from_stream(body),
    )
        .into_response())
}
