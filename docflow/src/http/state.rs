//! Shared process-wide state handed to every handler through axum's
//! `State` extractor: the one Job Store pool, storage service, worker
//! pool, and token service for the process, wired explicitly here rather
//! than reached through ambient globals, per `spec.md` §9's "Global
//! state" design note.

use std::sync::Arc;

use utils::id::PlanId;

use crate::auth::TokenService;
use crate::db::PgPool;
use crate::metrics::Metrics;
use crate::scheduler::WorkerPool;
use crate::storage::StorageService;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub storage: Arc<StorageService>,
    pub scheduler: Arc<WorkerPool>,
    pub tokens: Arc<TokenService>,
    pub metrics: Arc<Metrics>,
    pub default_plan_id: PlanId,
}
