//! The Job Store: the durable record of every request and its state
//! transitions. Transitions use optimistic conditional updates keyed on
//! the expected current status, so a second writer racing to pick up or
//! complete the same job observes zero rows affected and fails cleanly
//! instead of corrupting the record.

use chrono::{DateTime, Utc};
use diesel::pg::PgConnection;
use diesel::prelude::*;
use serde_json::Value;
use uuid::Uuid;

use docflow_api::{JobKind, JobStatus};
use utils::id::{JobId, TenantId};

use crate::db::models::{JobRow, NewJob};
use crate::db::schema::jobs;
use crate::error::ApiError;

#[derive(Debug, Clone)]
pub struct Job {
    pub id: JobId,
    pub tenant_id: TenantId,
    pub kind: JobKind,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub input_path: Option<String>,
    pub input_name: Option<String>,
    pub input_size: Option<i64>,
    pub parameters: Value,
    pub output_path: Option<String>,
    pub output_name: Option<String>,
    pub output_size: Option<i64>,
    pub result_data: Option<Value>,
    pub error_kind: Option<String>,
    pub error_message: Option<String>,
    pub processing_time_ms: Option<i64>,
}

impl TryFrom<JobRow> for Job {
    type Error = ApiError;

    fn try_from(r: JobRow) -> Result<Self, Self::Error> {
        Ok(Job {
            id: JobId::from(r.id),
            tenant_id: TenantId::new(r.tenant_id),
            kind: r
                .kind
                .parse()
                .map_err(|_| ApiError::internal("corrupt job kind in store"))?,
            status: r
                .status
                .parse()
                .map_err(|_| ApiError::internal("corrupt job status in store"))?,
            created_at: r.created_at,
            started_at: r.started_at,
            completed_at: r.completed_at,
            input_path: r.input_path,
            input_name: r.input_name,
            input_size: r.input_size,
            parameters: r.parameters,
            output_path: r.output_path,
            output_name: r.output_name,
            output_size: r.output_size,
            result_data: r.result_data,
            error_kind: r.error_kind,
            error_message: r.error_message,
            processing_time_ms: r.processing_time_ms,
        })
    }
}

/// Creates a PENDING job row with no `started_at`, `completed_at`, or
/// `output_path` set.
pub fn create(
    conn: &mut PgConnection,
    tenant_id: TenantId,
    kind: JobKind,
    input_path: Option<String>,
    input_name: Option<String>,
    input_size: Option<i64>,
    parameters: Value,
) -> Result<Job, ApiError> {
    let new_job = NewJob {
        id: Uuid::new_v4(),
        tenant_id: tenant_id.get(),
        kind: kind.as_str().to_string(),
        status: JobStatus::Pending.as_str().to_string(),
        created_at: Utc::now(),
        input_path,
        input_name,
        input_size,
        parameters,
    };
    let row: JobRow = diesel::insert_into(jobs::table)
        .values(&new_job)
        .get_result(conn)
        .map_err(|e| ApiError::internal(format!("create job: {e}")))?;
    row.try_into()
}

pub fn get(conn: &mut PgConnection, tenant_id: TenantId, id: JobId) -> Result<Job, ApiError> {
    let row: JobRow = jobs::table
        .find(id.as_uuid())
        .filter(jobs::tenant_id.eq(tenant_id.get()))
        .first(conn)
        .map_err(|_| ApiError::not_found("job not found"))?;
    row.try_into()
}

/// Fetches a job by id regardless of owning tenant. Used only by
/// system-internal callers (the scheduler, cleanup) that already know the
/// tenant scope doesn't apply.
pub fn get_any(conn: &mut PgConnection, id: JobId) -> Result<Job, ApiError> {
    let row: JobRow = jobs::table
        .find(id.as_uuid())
        .first(conn)
        .map_err(|_| ApiError::not_found("job not found"))?;
    row.try_into()
}

pub struct HistoryFilter {
    pub status: Option<JobStatus>,
    pub kind: Option<JobKind>,
    pub limit: i64,
    pub offset: i64,
}

pub fn list_history(
    conn: &mut PgConnection,
    tenant_id: TenantId,
    filter: &HistoryFilter,
) -> Result<(Vec<Job>, i64), ApiError> {
    let mut query = jobs::table.filter(jobs::tenant_id.eq(tenant_id.get())).into_boxed();
    let mut count_query = jobs::table
        .filter(jobs::tenant_id.eq(tenant_id.get()))
        .into_boxed();

    if let Some(status) = filter.status {
        query = query.filter(jobs::status.eq(status.as_str().to_string()));
        count_query = count_query.filter(jobs::status.eq(status.as_str().to_string()));
    }
    if let Some(kind) = filter.kind {
        query = query.filter(jobs::kind.eq(kind.as_str().to_string()));
        count_query = count_query.filter(jobs::kind.eq(kind.as_str().to_string()));
    }

    let total: i64 = count_query
        .count()
        .get_result(conn)
        .map_err(|e| ApiError::internal(format!("count history: {e}")))?;

    let rows: Vec<JobRow> = query
        .order(jobs::created_at.desc())
        .limit(filter.limit)
        .offset(filter.offset)
        .load(conn)
        .map_err(|e| ApiError::internal(format!("list history: {e}")))?;

    let jobs = rows
        .into_iter()
        .map(Job::try_from)
        .collect::<Result<Vec<_>, _>>()?;
    Ok((jobs, total))
}

/// PENDING -> PROCESSING. Fails if the row is not currently PENDING,
/// guarding against double-pickup by a second worker.
pub fn start(conn: &mut PgConnection, id: JobId) -> Result<Job, ApiError> {
    let now = Utc::now();
    let updated = diesel::update(
        jobs::table
            .find(id.as_uuid())
            .filter(jobs::status.eq(JobStatus::Pending.as_str())),
    )
    .set((
        jobs::status.eq(JobStatus::Processing.as_str()),
        jobs::started_at.eq(now),
    ))
    .get_result::<JobRow>(conn)
    .optional()
    .map_err(|e| ApiError::internal(format!("start job: {e}")))?;

    match updated {
        Some(row) => row.try_into(),
        None => Err(ApiError::internal(
            "job was not PENDING when the worker tried to start it",
        )),
    }
}

/// PROCESSING -> COMPLETED, writing back the finalizer's output metadata
/// in the same statement as the status transition.
#[allow(clippy::too_many_arguments)]
pub fn complete(
    conn: &mut PgConnection,
    id: JobId,
    output_path: Option<String>,
    output_name: Option<String>,
    output_size: Option<i64>,
    result_data: Option<Value>,
    processing_time_ms: i64,
) -> Result<Job, ApiError> {
    let now = Utc::now();
    let updated = diesel::update(
        jobs::table
            .find(id.as_uuid())
            .filter(jobs::status.eq(JobStatus::Processing.as_str())),
    )
    .set((
        jobs::status.eq(JobStatus::Completed.as_str()),
        jobs::completed_at.eq(now),
        jobs::output_path.eq(output_path),
        jobs::output_name.eq(output_name),
        jobs::output_size.eq(output_size),
        jobs::result_data.eq(result_data),
        jobs::processing_time_ms.eq(processing_time_ms),
    ))
    .get_result::<JobRow>(conn)
    .optional()
    .map_err(|e| ApiError::internal(format!("complete job: {e}")))?;

    match updated {
        Some(row) => row.try_into(),
        None => Err(ApiError::internal(
            "job was not PROCESSING when the worker tried to complete it",
        )),
    }
}

/// PROCESSING -> FAILED.
pub fn fail(
    conn: &mut PgConnection,
    id: JobId,
    error_kind: &str,
    error_message: &str,
    processing_time_ms: i64,
) -> Result<Job, ApiError> {
    let now = Utc::now();
    let updated = diesel::update(
        jobs::table
            .find(id.as_uuid())
            .filter(jobs::status.eq(JobStatus::Processing.as_str())),
    )
    .set((
        jobs::status.eq(JobStatus::Failed.as_str()),
        jobs::completed_at.eq(now),
        jobs::error_kind.eq(error_kind),
        jobs::error_message.eq(error_message),
        jobs::processing_time_ms.eq(processing_time_ms),
    ))
    .get_result::<JobRow>(conn)
    .optional()
    .map_err(|e| ApiError::internal(format!("fail job: {e}")))?;

    match updated {
        Some(row) => row.try_into(),
        None => Err(ApiError::internal(
            "job was not PROCESSING when the worker tried to fail it",
        )),
    }
}

/// PENDING|PROCESSING -> CANCELLED. Returns `NotFound` if the job is
/// already terminal, since there is nothing left to cancel.
pub fn cancel(conn: &mut PgConnection, tenant_id: TenantId, id: JobId) -> Result<Job, ApiError> {
    let now = Utc::now();
    let updated = diesel::update(
        jobs::table
            .find(id.as_uuid())
            .filter(jobs::tenant_id.eq(tenant_id.get()))
            .filter(
                jobs::status
                    .eq(JobStatus::Pending.as_str())
                    .or(jobs::status.eq(JobStatus::Processing.as_str())),
            ),
    )
    .set((jobs::status.eq(JobStatus::Cancelled.as_str()), jobs::completed_at.eq(now)))
    .get_result::<JobRow>(conn)
    .optional()
    .map_err(|e| ApiError::internal(format!("cancel job: {e}")))?;

    match updated {
        Some(row) => row.try_into(),
        None => Err(ApiError::not_found("job is not cancellable")),
    }
}

pub fn delete(conn: &mut PgConnection, tenant_id: TenantId, id: JobId) -> Result<Job, ApiError> {
    let row: JobRow = diesel::delete(
        jobs::table
            .find(id.as_uuid())
            .filter(jobs::tenant_id.eq(tenant_id.get())),
    )
    .get_result(conn)
    .map_err(|_| ApiError::not_found("job not found"))?;
    row.try_into()
}

pub fn delete_all_for_tenant(conn: &mut PgConnection, tenant_id: TenantId) -> Result<Vec<Job>, ApiError> {
    let rows: Vec<JobRow> = diesel::delete(jobs::table.filter(jobs::tenant_id.eq(tenant_id.get())))
        .get_results(conn)
        .map_err(|e| ApiError::internal(format!("clear history: {e}")))?;
    rows.into_iter().map(Job::try_from).collect()
}

/// Jobs in a terminal state whose `completed_at` is older than `cutoff`.
/// Used by the cleanup service's job-age sweep.
pub fn find_terminal_older_than(
    conn: &mut PgConnection,
    cutoff: DateTime<Utc>,
) -> Result<Vec<Job>, ApiError> {
    let rows: Vec<JobRow> = jobs::table
        .filter(
            jobs::status
                .eq(JobStatus::Completed.as_str())
                .or(jobs::status.eq(JobStatus::Failed.as_str())),
        )
        .filter(jobs::completed_at.lt(cutoff))
        .load(conn)
        .map_err(|e| ApiError::internal(format!("find old jobs: {e}")))?;
    rows.into_iter().map(Job::try_from).collect()
}

pub fn delete_by_id(conn: &mut PgConnection, id: JobId) -> Result<(), ApiError> {
    diesel::delete(jobs::table.find(id.as_uuid()))
        .execute(conn)
        .map_err(|e| ApiError::internal(format!("delete job: {e}")))?;
    Ok(())
}
