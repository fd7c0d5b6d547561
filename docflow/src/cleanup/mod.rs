//! The Cleanup Service: two idempotent periodic sweeps run on a timer,
//! following the grounding repo's periodic background-task shape in
//! `pageserver/src/tenant/tasks.rs` (a `tokio::time::interval` loop
//! spawned once at startup), generalized here to two independent passes
//! instead of one.

use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use chrono::Utc;

use crate::config::ServiceConfig;
use crate::db::PgPool;
use crate::jobs;
use crate::storage::StorageService;

/// Runs both sweeps once per `config.cleanup_interval`, forever, until the
/// process exits. Errors from one pass are logged and do not stop the
/// loop; the next tick tries again.
pub async fn run(pool: PgPool, storage: std::sync::Arc<StorageService>, config: ServiceConfig) {
    let mut ticker = tokio::time::interval(config.cleanup_interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        if let Err(e) = file_age_sweep(&storage, config.max_file_age, config.max_temp_file_age).await {
            tracing::error!(error = %e, "file age sweep failed");
        }
        if let Err(e) = job_age_sweep(&pool, &storage, config.terminal_job_retention).await {
            tracing::error!(error = %e, "job age sweep failed");
        }
    }
}

/// Deletes files under `uploads/`/`downloads/` older than `max_file_age`
/// and files under `temp/` older than `max_temp_file_age`, then prunes any
/// directory left empty by the deletions. PROCESSING jobs are untouched
/// because their files live in a temp working directory the scheduler
/// still holds open, not under `uploads/`/`downloads/`.
async fn file_age_sweep(
    storage: &StorageService,
    max_file_age: Duration,
    max_temp_file_age: Duration,
) -> std::io::Result<()> {
    let now = std::time::SystemTime::now();
    sweep_dir(&storage.root().join("uploads"), now, max_file_age).await?;
    sweep_dir(&storage.root().join("downloads"), now, max_file_age).await?;
    sweep_dir(&storage.root().join("temp"), now, max_temp_file_age).await?;
    Ok(())
}

/// Recursively deletes files older than `max_age` under `dir`, then
/// removes any directory (including `dir` itself, if not the storage
/// root) left with no entries.
async fn sweep_dir(dir: &Utf8Path, now: std::time::SystemTime, max_age: Duration) -> std::io::Result<()> {
    if !dir.exists() {
        return Ok(());
    }

    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut remaining = 0usize;

    while let Some(entry) = entries.next_entry().await? {
        let path = Utf8PathBuf::from_path_buf(entry.path()).expect("storage tree is UTF-8");
        let metadata = entry.metadata().await?;

        if metadata.is_dir() {
            Box::pin(sweep_dir(&path, now, max_age)).await?;
            if tokio::fs::read_dir(&path).await?.next_entry().await?.is_none() {
                tokio::fs::remove_dir(&path).await.ok();
            } else {
                remaining += 1;
            }
            continue;
        }

        let age = now
            .duration_since(metadata.modified()?)
            .unwrap_or(Duration::ZERO);
        if age > max_age {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e),
            }
        } else {
            remaining += 1;
        }
    }

    if remaining == 0 {
        tracing::debug!(dir = %dir, "emptied during sweep");
    }
    Ok(())
}

/// Deletes terminal jobs (COMPLETED or FAILED) whose `completed_at` is
/// older than `retention`, along with any files they still reference.
async fn job_age_sweep(
    pool: &PgPool,
    storage: &StorageService,
    retention: Duration,
) -> Result<(), crate::error::ApiError> {
    let cutoff = Utc::now() - chrono::Duration::from_std(retention).unwrap_or(chrono::Duration::zero());

    let pool_for_find = pool.clone();
    let stale = crate::db::with_conn(&pool_for_find, move |conn| jobs::find_terminal_older_than(conn, cutoff)).await?;

    for job in stale {
        if let Some(path) = &job.input_path {
            let _ = storage.delete(Utf8Path::new(path)).await;
        }
        if let Some(path) = &job.output_path {
            let path = Utf8Path::new(path);
            if path.is_dir() {
                let _ = tokio::fs::remove_dir_all(path).await;
            } else {
                let _ = storage.delete(path).await;
            }
        }

        let pool = pool.clone();
        let job_id = job.id;
        crate::db::with_conn(&pool, move |conn| jobs::delete_by_id(conn, job_id)).await?;
    }

    Ok(())
}
