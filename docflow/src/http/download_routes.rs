//! `GET /storage/downloads/:tenant_id/:job_id/:filename`: a static handler
//! bound to the storage root, scoped to the requesting tenant's own
//! subtree. Runs every segment through `StorageService`'s path-traversal
//! defenses rather than trusting the path components verbatim.

use axum::extract::{Path, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};

use utils::id::{JobId, TenantId};

use crate::auth::extractor::AuthenticatedTenant;
use crate::error::ApiError;
use crate::http::state::AppState;

pub async fn download(
    State(app): State<AppState>,
    AuthenticatedTenant(tenant): AuthenticatedTenant,
    Path((tenant_id, job_id, filename)): Path<(String, String, String)>,
) -> Result<Response, ApiError> {
    let tenant_id: TenantId = tenant_id.parse().map_err(|_| ApiError::not_found("file not found"))?;
    if tenant_id != tenant.id {
        return Err(ApiError::not_found("file not found"));
    }
    let job_id: JobId = job_id.parse().map_err(|_| ApiError::not_found("file not found"))?;

    crate::storage::StorageService::validate_filename(&filename)?;
    let relative = app.storage.download_dir(tenant_id, job_id).join(&filename);
    let abs_path = app.storage.root().join(&relative);

    if tokio::fs::metadata(&abs_path).await.is_err() {
        return Err(ApiError::not_found("file not found"));
    }
    // The path escape check only canonicalizes once the file is known to
    // exist; validate_filename already rejected `..` and separators above,
    // so this is defense in depth against a symlink planted under the root.
    app.storage.check_within_root(&abs_path)?;

    let data = tokio::fs::read(&abs_path)
        .await
        .map_err(|_| ApiError::not_found("file not found"))?;

    let mime = utils::mime_sniff::sniff(&data);
    Ok((
        [
            (header::CONTENT_TYPE, mime),
            (header::CONTENT_DISPOSITION, "attachment"),
        ],
        data,
    )
        .into_response())
}
