//! `/user/history*`: paginated job listing, single-job lookup, and the
//! two delete operations. Every read and delete is scoped to the
//! authenticated tenant at the Job Store layer, not just in the handler.

use axum::extract::{Path, Query, State};
use axum::Json;

use docflow_api::requests::HistoryQuery;
use docflow_api::responses::{HistoryItem, HistoryPage};
use docflow_api::{JobKind, JobStatus};
use utils::id::JobId;

use crate::auth::extractor::AuthenticatedTenant;
use crate::error::ApiError;
use crate::http::state::AppState;
use crate::jobs::{self, HistoryFilter, Job};
use crate::storage::StorageService;

const DEFAULT_LIMIT: i64 = 50;
const MAX_LIMIT: i64 = 100;

fn download_url(tenant_id: utils::id::TenantId, job: &Job) -> Option<String> {
    if job.status != JobStatus::Completed {
        return None;
    }
    let name = job.output_name.as_ref()?;
    Some(format!("/storage/downloads/{}/{}/{}", tenant_id, job.id, name))
}

fn to_item(tenant_id: utils::id::TenantId, job: Job) -> HistoryItem {
    let url = download_url(tenant_id, &job);
    HistoryItem {
        job_id: job.id.to_string(),
        kind: job.kind,
        status: job.status,
        created_at: job.created_at,
        started_at: job.started_at,
        completed_at: job.completed_at,
        input_name: job.input_name,
        output_name: job.output_name,
        output_size: job.output_size,
        download_url: url,
        error_kind: job.error_kind,
        error_message: job.error_message,
        processing_time_ms: job.processing_time_ms,
    }
}

/// `GET /user/history`
pub async fn list(
    State(app): State<AppState>,
    AuthenticatedTenant(tenant): AuthenticatedTenant,
    Query(q): Query<HistoryQuery>,
) -> Result<Json<HistoryPage>, ApiError> {
    let limit = q.limit.map(|l| l as i64).unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let offset = q.offset.map(|o| o as i64).unwrap_or(0).max(0);

    let status = q
        .status
        .as_deref()
        .map(|s| s.parse::<JobStatus>())
        .transpose()
        .map_err(|_| ApiError::invalid_input("invalid status filter"))?;
    let kind = q
        .kind
        .as_deref()
        .map(|s| s.parse::<JobKind>())
        .transpose()
        .map_err(|_| ApiError::invalid_input("invalid kind filter"))?;

    let filter = HistoryFilter { status, kind, limit, offset };
    let tenant_id = tenant.id;

    let pool = app.pool.clone();
    let (jobs_page, total) =
        crate::db::with_conn(&pool, move |conn| jobs::list_history(conn, tenant_id, &filter)).await?;

    let items = jobs_page.into_iter().map(|j| to_item(tenant_id, j)).collect();
    Ok(Json(HistoryPage {
        items,
        total,
        limit: limit as u32,
        offset: offset as u32,
    }))
}

/// `GET /user/history/job/:id`
pub async fn get_job(
    State(app): State<AppState>,
    AuthenticatedTenant(tenant): AuthenticatedTenant,
    Path(id): Path<String>,
) -> Result<Json<HistoryItem>, ApiError> {
    let job_id: JobId = id.parse().map_err(|_| ApiError::not_found("job not found"))?;
    let tenant_id = tenant.id;

    let pool = app.pool.clone();
    let job = crate::db::with_conn(&pool, move |conn| jobs::get(conn, tenant_id, job_id)).await?;
    Ok(Json(to_item(tenant_id, job)))
}

/// `DELETE /user/history/job/:id`
pub async fn delete_job(
    State(app): State<AppState>,
    AuthenticatedTenant(tenant): AuthenticatedTenant,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let job_id: JobId = id.parse().map_err(|_| ApiError::not_found("job not found"))?;
    let tenant_id = tenant.id;

    let pool = app.pool.clone();
    let job = crate::db::with_conn(&pool, move |conn| jobs::delete(conn, tenant_id, job_id)).await?;
    delete_job_files(&app.storage, &job).await?;

    Ok(Json(serde_json::json!({ "success": true })))
}

/// `DELETE /user/history/clear-history`
pub async fn clear_history(
    State(app): State<AppState>,
    AuthenticatedTenant(tenant): AuthenticatedTenant,
) -> Result<Json<serde_json::Value>, ApiError> {
    let tenant_id = tenant.id;
    let pool = app.pool.clone();
    crate::db::with_conn(&pool, move |conn| jobs::delete_all_for_tenant(conn, tenant_id)).await?;
    app.storage.delete_tenant(tenant_id).await?;

    Ok(Json(serde_json::json!({ "success": true })))
}

/// Removes a job's staged input and output artifacts. `output_path` is a
/// single file for most kinds but the job's download directory for
/// multi-artifact kinds (`split`); either is safe to pass through
/// `check_within_root` before removal.
async fn delete_job_files(storage: &StorageService, job: &Job) -> Result<(), ApiError> {
    if let Some(path) = &job.input_path {
        storage.delete(camino::Utf8Path::new(path)).await?;
    }
    if let Some(path) = &job.output_path {
        let path = camino::Utf8Path::new(path);
        if path.is_dir() {
            storage.check_within_root(path)?;
            match tokio::fs::remove_dir_all(path).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        } else {
            storage.delete(path).await?;
        }
    }
    Ok(())
}
