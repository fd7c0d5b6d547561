//! Artifact Finalizer: moves a processor's output from its temp working
//! directory into tenant-scoped downloads, and writes the resulting
//! path/size back into the Job record in the same transition as
//! PROCESSING→COMPLETED.

use serde_json::Value;

use utils::id::{JobId, TenantId};

use crate::db::PgPool;
use crate::error::ApiError;
use crate::jobs::{self, Job};
use crate::processors::ProcessorResult;
use crate::storage::StorageService;

/// Installs `result`'s artifacts (zero for `compare`, one for most kinds,
/// N for `split`, order preserved) and completes the job in one Job Store
/// transition. `display_name_for(i)` names the i-th artifact.
pub async fn finalize_and_complete(
    pool: &PgPool,
    storage: &StorageService,
    tenant_id: TenantId,
    job_id: JobId,
    result: ProcessorResult,
    display_name_for: impl Fn(usize) -> String,
    processing_time_ms: i64,
) -> Result<Job, ApiError> {
    let (output_path, output_name, output_size, result_data) = match result.artifacts.len() {
        0 => (None, None, None, Some(result.metadata)),
        1 => {
            let name = display_name_for(0);
            let dest = storage
                .finalize_output(&result.artifacts[0], tenant_id, job_id, &name)
                .await?;
            let size = tokio::fs::metadata(&dest).await.ok().map(|m| m.len() as i64);
            (Some(dest.to_string()), Some(name), size, Some(result.metadata))
        }
        _ => {
            let mut dests = Vec::with_capacity(result.artifacts.len());
            let mut total_size: i64 = 0;
            for (i, artifact) in result.artifacts.iter().enumerate() {
                let name = display_name_for(i);
                let dest = storage.finalize_output(artifact, tenant_id, job_id, &name).await?;
                total_size += tokio::fs::metadata(&dest).await.map(|m| m.len() as i64).unwrap_or(0);
                dests.push(dest.to_string());
            }
            let mut metadata = result.metadata;
            if let Value::Object(ref mut map) = metadata {
                map.insert("artifacts".to_string(), Value::Array(dests.iter().cloned().map(Value::String).collect()));
            }
            (
                Some(storage.download_dir(tenant_id, job_id).to_string()),
                Some(format!("{}-files", dests.len())),
                Some(total_size),
                Some(metadata),
            )
        }
    };

    let pool = pool.clone();
    crate::db::with_conn(&pool, move |conn| {
        jobs::complete(conn, job_id, output_path, output_name, output_size, result_data, processing_time_ms)
    })
    .await
}
