//! Connection pooling and the async/blocking boundary for the Job Store.
//! Diesel is synchronous; every query goes through `spawn_blocking` so a
//! slow database round-trip never stalls the async runtime the HTTP layer
//! shares with every other tenant's requests, uniformly, rather than
//! leaving it to each call site to remember.

use diesel::pg::PgConnection;
use diesel::r2d2::{ConnectionManager, Pool, PooledConnection};

use crate::error::ApiError;

pub type PgPool = Pool<ConnectionManager<PgConnection>>;
pub type PgPooled = PooledConnection<ConnectionManager<PgConnection>>;

pub fn build_pool(database_url: &str) -> anyhow::Result<PgPool> {
    let manager = ConnectionManager::<PgConnection>::new(database_url);
    let pool = Pool::builder().max_size(16).build(manager)?;
    Ok(pool)
}

/// Runs a blocking diesel closure on the blocking thread pool and maps
/// pool/connection failures to `ErrorKind::Internal`.
pub async fn with_conn<F, T>(pool: &PgPool, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&mut PgConnection) -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    let pool = pool.clone();
    tokio::task::spawn_blocking(move || {
        let mut conn = pool
            .get()
            .map_err(|e| ApiError::internal(format!("db pool exhausted: {e}")))?;
        f(&mut conn)
    })
    .await
    .map_err(|e| ApiError::internal(format!("db task panicked: {e}")))?
}
