use axum::Router;
use axum::routing::get;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/pdf", get(handlers::text::text))
        .route("/pdf/forget", get(handlers::forget::forget))
        .route("/pdf/json", get(handlers::json::json))
        .route("/pdf/large", get(handlers::large::large))
        .route("/stream", get(handlers::stream::stream))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
