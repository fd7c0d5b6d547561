//! The `AuthenticatedTenant` extractor: resolves a bearer JWT or an
//! `X-API-Key` header into the calling tenant, following the grounding
//! pack's bearer-token extraction idiom in
//! `compute_tools/src/http/middleware/authorize.rs` (a `TypedHeader<
//! Authorization<Bearer>>` pulled via axum-extra), generalized here with
//! a second credential form since this spec allows either.

use async_trait::async_trait;
use axum::extract::{FromRef, FromRequestParts};
use axum::http::request::Parts;
use axum::headers::authorization::Bearer;
use axum::headers::Authorization;
use axum::RequestPartsExt;
use axum::TypedHeader;
use chrono::Utc;

use utils::id::TenantId;

use crate::auth;
use crate::db::schema::api_keys;
use crate::error::ApiError;
use crate::http::state::AppState;
use crate::tenant::{self, Tenant};

const API_KEY_HEADER: &str = "x-api-key";

/// The tenant identified by the request's credentials, re-read from the
/// Job Store fresh on every request rather than trusted from the token
/// alone — the token only proves identity, not current `active`/`verified`
/// status or plan.
pub struct AuthenticatedTenant(pub Tenant);

#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedTenant
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app = AppState::from_ref(state);

        if let Some(raw_key) = parts
            .headers
            .get(API_KEY_HEADER)
            .and_then(|v| v.to_str().ok())
        {
            let tenant_id = authenticate_api_key(&app, raw_key).await?;
            let pool = app.pool.clone();
            let tenant = crate::db::with_conn(&pool, move |conn| tenant::get_by_id(conn, tenant_id)).await?;
            return Ok(AuthenticatedTenant(tenant));
        }

        let TypedHeader(Authorization(bearer)) = parts
            .extract::<TypedHeader<Authorization<Bearer>>>()
            .await
            .map_err(|_| ApiError::unauthenticated("missing or malformed Authorization header"))?;

        let claims = app.tokens.verify_access_token(bearer.token())?;
        let tenant_id = auth::parse_tenant_id(&claims.sub)?;

        let pool = app.pool.clone();
        let tenant = crate::db::with_conn(&pool, move |conn| tenant::get_by_id(conn, tenant_id)).await?;
        Ok(AuthenticatedTenant(tenant))
    }
}

/// Matches `raw_key` against the SHA-256 hashes in `api_keys`, updates
/// `last_used_at` on success, and returns the owning tenant's id.
async fn authenticate_api_key(app: &AppState, raw_key: &str) -> Result<TenantId, ApiError> {
    let key_hash = auth::hash_api_key(raw_key);
    let pool = app.pool.clone();

    crate::db::with_conn(&pool, move |conn| {
        use diesel::prelude::*;

        let row: Option<(i64, i64)> = api_keys::table
            .filter(api_keys::key_hash.eq(&key_hash))
            .select((api_keys::id, api_keys::tenant_id))
            .first(conn)
            .optional()
            .map_err(|e| ApiError::internal(format!("lookup api key: {e}")))?;

        let (key_id, tenant_id) =
            row.ok_or_else(|| ApiError::unauthenticated("invalid API key"))?;

        diesel::update(api_keys::table.find(key_id))
            .set(api_keys::last_used_at.eq(Utc::now()))
            .execute(conn)
            .map_err(|e| ApiError::internal(format!("touch api key: {e}")))?;

        Ok(TenantId::new(tenant_id))
    })
    .await
}
