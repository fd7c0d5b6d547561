//! `/user/auth/*`: registration, login, refresh, logout. Token issuance
//! follows `compute_tools/src/http/middleware/authorize.rs`'s bearer-token
//! shape, generalized to an access/refresh pair this service itself signs
//! rather than one it only verifies.

use axum::extract::State;
use axum::Json;

use docflow_api::requests::{LoginRequest, RefreshRequest, RegisterRequest};
use docflow_api::responses::TokenPair;

use crate::auth::{self, extractor::AuthenticatedTenant};
use crate::error::ApiError;
use crate::http::state::AppState;
use crate::tenant;

/// `POST /user/auth/register`
pub async fn register(
    State(app): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<Json<TokenPair>, ApiError> {
    if req.email.is_empty() || !req.email.contains('@') {
        return Err(ApiError::invalid_input("invalid email address"));
    }
    if req.password.len() < 8 {
        return Err(ApiError::invalid_input("password must be at least 8 characters"));
    }

    let password_hash = auth::hash_password(&req.password)?;
    let default_plan_id = app.default_plan_id;

    let pool = app.pool.clone();
    let email = req.email.clone();
    let tenant = crate::db::with_conn(&pool, move |conn| {
        tenant::create(conn, &email, &password_hash, default_plan_id)
    })
    .await?;

    issue_pair(&app, &tenant)
}

/// `POST /user/auth/login`
pub async fn login(
    State(app): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<TokenPair>, ApiError> {
    let pool = app.pool.clone();
    let email = req.email.clone();
    let tenant = crate::db::with_conn(&pool, move |conn| tenant::get_by_email(conn, &email))
        .await?
        .ok_or_else(|| ApiError::unauthenticated("invalid email or password"))?;

    if !auth::verify_password(&req.password, &tenant.password_hash) {
        return Err(ApiError::unauthenticated("invalid email or password"));
    }
    if !tenant.active {
        return Err(ApiError::forbidden("account is not active"));
    }

    issue_pair(&app, &tenant)
}

/// `POST /user/auth/refresh`
pub async fn refresh(
    State(app): State<AppState>,
    Json(req): Json<RefreshRequest>,
) -> Result<Json<TokenPair>, ApiError> {
    let claims = app.tokens.verify_refresh_token(&req.refresh_token)?;
    let tenant_id = auth::parse_tenant_id(&claims.sub)?;

    let pool = app.pool.clone();
    let tenant = crate::db::with_conn(&pool, move |conn| tenant::get_by_id(conn, tenant_id)).await?;
    if !tenant.active {
        return Err(ApiError::forbidden("account is not active"));
    }

    issue_pair(&app, &tenant)
}

/// `POST /user/auth/logout`. Tokens are stateless JWTs with no server-side
/// session to revoke; logout is a client-side no-op the API still exposes
/// for symmetry with the rest of the auth surface.
pub async fn logout(AuthenticatedTenant(_tenant): AuthenticatedTenant) -> Result<Json<serde_json::Value>, ApiError> {
    Ok(Json(serde_json::json!({ "success": true })))
}

fn issue_pair(app: &AppState, tenant: &tenant::Tenant) -> Result<Json<TokenPair>, ApiError> {
    let access_token = app.tokens.issue_access_token(tenant.id, &tenant.email)?;
    let refresh_token = app.tokens.issue_refresh_token(tenant.id)?;
    Ok(Json(TokenPair {
        access_token,
        refresh_token,
        token_type: "bearer",
    }))
}
