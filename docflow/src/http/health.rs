//! `GET /healthz` and `GET /metrics`, the two ambient endpoints SPEC_FULL.md
//! adds beyond the operation surface spec.md enumerates.

use axum::extract::State;
use axum::response::IntoResponse;

use crate::http::state::AppState;

pub async fn healthz(State(app): State<AppState>) -> impl IntoResponse {
    match app.pool.get() {
        Ok(_) => (axum::http::StatusCode::OK, "ok"),
        Err(_) => (axum::http::StatusCode::SERVICE_UNAVAILABLE, "db unavailable"),
    }
}

pub async fn metrics(State(app): State<AppState>) -> impl IntoResponse {
    (
        [(axum::http::header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        app.metrics.render(),
    )
}
