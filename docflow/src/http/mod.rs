//! HTTP server bootstrap. Router construction follows
//! `compute_tools/src/http/server.rs`'s layering order: route table, then
//! a `ServiceBuilder` stack of tracing/request-id/CORS middleware, then
//! `with_state`.

pub mod auth_routes;
pub mod download_routes;
pub mod health;
pub mod history_routes;
pub mod multipart;
pub mod pdf_routes;
pub mod state;

use axum::body::Body;
use axum::http::Request;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{delete, get, post};
use axum::Router;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::request_id::PropagateRequestIdLayer;
use tower_http::trace::TraceLayer;

use state::AppState;

const X_REQUEST_ID: &str = "x-request-id";

/// Stamps a request ID if the caller didn't send one, so every log line
/// and `PropagateRequestIdLayer` response has one to work with.
async fn ensure_request_id(mut request: Request<Body>, next: Next<Body>) -> Response {
    if request.headers().get(X_REQUEST_ID).is_none() {
        let id = uuid::Uuid::new_v4().to_string();
        if let Ok(value) = id.parse() {
            request.headers_mut().append(X_REQUEST_ID, value);
        }
    }
    next.run(request).await
}

pub fn build_router(app_state: AppState, cors_origins: &[String]) -> Router {
    let cors = build_cors(cors_origins);

    Router::new()
        .route("/pdf/:op", post(pdf_routes::run_operation))
        .route("/pdf/:op/info", get(pdf_routes::operation_info))
        .route("/pdf/convert/:format", post(pdf_routes::run_convert))
        .route("/pdf/convert/:format/info", get(pdf_routes::operation_info))
        .route("/user/auth/register", post(auth_routes::register))
        .route("/user/auth/login", post(auth_routes::login))
        .route("/user/auth/refresh", post(auth_routes::refresh))
        .route("/user/auth/logout", post(auth_routes::logout))
        .route("/user/history", get(history_routes::list))
        .route("/user/history/job/:id", get(history_routes::get_job).delete(history_routes::delete_job))
        .route("/user/history/clear-history", delete(history_routes::clear_history))
        .route("/storage/downloads/:tenant_id/:job_id/:filename", get(download_routes::download))
        .route("/healthz", get(health::healthz))
        .route("/metrics", get(health::metrics))
        .layer(
            ServiceBuilder::new()
                .layer(middleware::from_fn(ensure_request_id))
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(cors),
        )
        .with_state(app_state)
}

fn build_cors(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.iter().any(|o| o == "*") {
        AllowOrigin::any()
    } else {
        let parsed: Vec<_> = origins
            .iter()
            .filter_map(|o| o.parse::<axum::http::HeaderValue>().ok())
            .collect();
        AllowOrigin::list(parsed)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(tower_http::cors::Any)
        .allow_headers(tower_http::cors::Any)
}
