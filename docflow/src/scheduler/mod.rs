//! The worker pool: a bounded number of concurrently-running jobs, gated
//! by a semaphore the way the grounding repo gates its background loop
//! kinds (`pageserver/src/tenant/tasks.rs`'s per-kind concurrency limit),
//! generalized here to one shared pool across every job kind.

pub mod finalize;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use camino::Utf8PathBuf;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use docflow_api::requests::JobParameters;
use docflow_api::{ErrorKind, JobKind};
use utils::id::{JobId, TenantId};

use crate::config::ServiceConfig;
use crate::db::PgPool;
use crate::error::ApiError;
use crate::jobs;
use crate::metrics::Metrics;
use crate::processors::Registry;
use crate::storage::StorageService;
use crate::tenant::quota;

/// Everything a worker needs to run one job, captured at admission time so
/// the worker never has to re-derive it from the request.
pub struct JobTicket {
    pub job_id: JobId,
    pub tenant_id: TenantId,
    pub kind: JobKind,
    pub input_paths: Vec<Utf8PathBuf>,
    pub params: JobParameters,
    pub max_files_per_period: i64,
}

pub struct WorkerPool {
    semaphore: Arc<Semaphore>,
    submit_wait: Duration,
    job_deadline: Duration,
    pool: PgPool,
    storage: Arc<StorageService>,
    registry: Arc<Registry>,
    metrics: Arc<Metrics>,
    running: Mutex<HashMap<JobId, CancellationToken>>,
    shutdown: CancellationToken,
}

impl WorkerPool {
    pub fn new(
        config: &ServiceConfig,
        pool: PgPool,
        storage: Arc<StorageService>,
        registry: Arc<Registry>,
        metrics: Arc<Metrics>,
    ) -> Arc<Self> {
        Arc::new(WorkerPool {
            semaphore: Arc::new(Semaphore::new(config.max_concurrent_jobs)),
            submit_wait: Duration::from_millis(50),
            job_deadline: config.pdf_processing_timeout,
            pool,
            storage,
            registry,
            metrics,
            running: Mutex::new(HashMap::new()),
            shutdown: CancellationToken::new(),
        })
    }

    /// Reserves a worker slot for `ticket` and spawns it. Returns `Busy`
    /// immediately if every slot is occupied and stays occupied past a
    /// short wait, rather than queuing requests indefinitely — callers see
    /// backpressure instead of an ever-growing list of pending jobs.
    pub async fn submit(self: &Arc<Self>, ticket: JobTicket) -> Result<(), ApiError> {
        if self.shutdown.is_cancelled() {
            return Err(ApiError::busy("the service is shutting down"));
        }

        let permit = match tokio::time::timeout(self.submit_wait, self.semaphore.clone().acquire_owned()).await {
            Ok(Ok(permit)) => permit,
            Ok(Err(_)) => return Err(ApiError::internal("worker pool is shut down")),
            Err(_) => return Err(ApiError::busy("all worker slots are occupied, try again shortly")),
        };

        self.metrics
            .jobs_submitted_total
            .with_label_values(&[ticket.kind.as_str()])
            .inc();

        let job_id = ticket.job_id;
        let token = CancellationToken::new();
        self.running.lock().unwrap().insert(job_id, token.clone());

        let this = Arc::clone(self);
        tokio::spawn(async move {
            let _permit = permit;
            this.clone().run(ticket, token).await;
            this.running.lock().unwrap().remove(&job_id);
        });
        Ok(())
    }

    /// Signals a running job's cancellation token, if it is currently
    /// executing. Has no effect on a job that is still PENDING (the job
    /// store transition alone handles that case) or already terminal.
    pub fn request_cancel(&self, job_id: JobId) {
        if let Some(token) = self.running.lock().unwrap().get(&job_id) {
            token.cancel();
        }
    }

    /// Begins draining: no new jobs start, and every in-flight job's
    /// cancellation token is signalled so it can wind down promptly.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
        for token in self.running.lock().unwrap().values() {
            token.cancel();
        }
    }

    /// True once every in-flight job has removed itself from `running`.
    /// Polled by the binary's graceful-shutdown sequence after calling
    /// `shutdown`.
    pub fn is_drained(&self) -> bool {
        self.running.lock().unwrap().is_empty()
    }

    async fn run(self: Arc<Self>, ticket: JobTicket, cancel: CancellationToken) {
        let job_id = ticket.job_id;
        let started = tokio::time::Instant::now();

        if let Err(e) = crate::db::with_conn(&self.pool, move |conn| jobs::start(conn, job_id)).await {
            tracing::error!(job_id = %job_id, error = %e, "failed to transition job to processing");
            return;
        }

        let out_dir = match self.storage.new_temp_dir().await {
            Ok(dir) => dir,
            Err(e) => {
                self.finish_failed(job_id, ticket.kind, e, started).await;
                return;
            }
        };

        if self.registry.get(&ticket.kind).is_none() {
            self.finish_failed(
                job_id,
                ticket.kind,
                ApiError::internal(format!("no processor registered for {}", ticket.kind.as_str())),
                started,
            )
            .await;
            let _ = tokio::fs::remove_dir_all(&out_dir).await;
            return;
        }

        // Every processor — lopdf transforms and supervised subprocesses
        // alike — runs on a dedicated blocking-pool thread, the same
        // uniform offload `db::with_conn` gives diesel calls, so a batch
        // of heavy jobs never pins the async runtime's worker threads and
        // starves unrelated fast requests like `/healthz`.
        let registry = Arc::clone(&self.registry);
        let proc_kind = ticket.kind;
        let proc_input_paths = ticket.input_paths.clone();
        let proc_params = ticket.params.clone();
        let proc_out_dir = out_dir.clone();

        let process_call = async {
            match tokio::task::spawn_blocking(move || {
                tokio::runtime::Handle::current().block_on(async move {
                    let processor = registry
                        .get(&proc_kind)
                        .expect("presence checked before spawning this task");
                    processor.process(&proc_input_paths, &proc_out_dir, &proc_params).await
                })
            })
            .await
            {
                Ok(result) => result,
                Err(e) => Err(ApiError::internal(format!("processor task panicked: {e}"))),
            }
        };

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            result = tokio::time::timeout(self.job_deadline, process_call) => Some(result),
        };

        let elapsed_ms = started.elapsed().as_millis() as i64;

        match outcome {
            None => {
                let tenant_id = ticket.tenant_id;
                if crate::db::with_conn(&self.pool, move |conn| jobs::cancel(conn, tenant_id, job_id))
                    .await
                    .is_err()
                {
                    tracing::warn!(job_id = %job_id, "job cancellation lost the race with completion");
                }
            }
            Some(Err(_elapsed)) => {
                self.finish_failed(
                    job_id,
                    ticket.kind,
                    ApiError::new(ErrorKind::SubprocessTimeout, "processing exceeded the configured deadline"),
                    started,
                )
                .await;
            }
            Some(Ok(Err(e))) => {
                self.finish_failed(job_id, ticket.kind, e, started).await;
            }
            Some(Ok(Ok(result))) => {
                let naming_kind = ticket.kind;
                let display_name_for = move |i: usize| default_artifact_name(naming_kind, i);
                let finalized = finalize::finalize_and_complete(
                    &self.pool,
                    &self.storage,
                    ticket.tenant_id,
                    job_id,
                    result,
                    display_name_for,
                    elapsed_ms,
                )
                .await;

                match finalized {
                    Ok(_) => {
                        let tenant_id = ticket.tenant_id;
                        let max_files = ticket.max_files_per_period;
                        if let Err(e) =
                            crate::db::with_conn(&self.pool, move |conn| quota::increment_usage(conn, tenant_id, max_files))
                                .await
                        {
                            tracing::error!(job_id = %job_id, error = %e, "failed to increment usage after completion");
                        }
                        self.metrics
                            .jobs_completed_total
                            .with_label_values(&[ticket.kind.as_str()])
                            .inc();
                        self.metrics
                            .processing_duration_seconds
                            .with_label_values(&[ticket.kind.as_str()])
                            .observe(elapsed_ms as f64 / 1000.0);
                    }
                    Err(e) => {
                        tracing::error!(job_id = %job_id, error = %e, "failed to finalize completed job");
                    }
                }
            }
        }

        let _ = tokio::fs::remove_dir_all(&out_dir).await;
    }

    async fn finish_failed(&self, job_id: JobId, job_kind: JobKind, err: ApiError, started: tokio::time::Instant) {
        let elapsed_ms = started.elapsed().as_millis() as i64;
        let error_kind = err.kind().as_str().to_string();
        let message = err.to_string();
        self.metrics
            .jobs_failed_total
            .with_label_values(&[job_kind.as_str(), &error_kind])
            .inc();
        if let Err(e) = crate::db::with_conn(&self.pool, move |conn| {
            jobs::fail(conn, job_id, &error_kind, &message, elapsed_ms)
        })
        .await
        {
            tracing::error!(job_id = %job_id, error = %e, "failed to record job failure");
        }
    }
}

/// The artifact name a finalized job is shown under. `split` produces
/// `page_<n>.pdf` per selected page; every other kind gets one
/// conventional name based on its target format.
fn default_artifact_name(kind: JobKind, index: usize) -> String {
    if kind == JobKind::Split {
        return format!("page_{}.pdf", index + 1);
    }
    let ext = match kind {
        JobKind::ConvertPdfToWord => "docx",
        JobKind::ConvertPdfToExcel => "xlsx",
        JobKind::ConvertPdfToPpt => "pptx",
        JobKind::ConvertPdfToJpg => "jpg",
        _ => "pdf",
    };
    format!("{}.{ext}", kind.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_names_pages_sequentially() {
        assert_eq!(default_artifact_name(JobKind::Split, 0), "page_1.pdf");
        assert_eq!(default_artifact_name(JobKind::Split, 4), "page_5.pdf");
    }

    #[test]
    fn convert_names_use_the_target_extension() {
        assert_eq!(default_artifact_name(JobKind::ConvertPdfToWord, 0), "convert_pdf_to_word.docx");
        assert_eq!(default_artifact_name(JobKind::Compress, 0), "compress.pdf");
    }
}
