//! The `docflowd` process entrypoint: loads configuration, brings up the
//! database pool, storage, worker pool, and HTTP server, and runs a
//! graceful drain on shutdown. Bootstrap shape follows
//! `pageserver/src/bin/pageserver.rs`'s init-or-exit-nonzero discipline,
//! simplified to this service's flatter startup sequence (no tenant
//! attach/detach, no separate config file).

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::signal;

use docflow::config::ServiceConfig;
use docflow::scheduler::WorkerPool;
use docflow::{auth, cleanup, db, http, metrics, processors, storage, tenant};

fn init_tracing(log_level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_new(log_level)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() {
    let config = match ServiceConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("docflowd: configuration error: {e}");
            std::process::exit(1);
        }
    };

    init_tracing(&config.log_level);

    if let Err(e) = run(config).await {
        tracing::error!(error = %e, "docflowd failed to start");
        std::process::exit(1);
    }
}

async fn run(config: ServiceConfig) -> anyhow::Result<()> {
    let pool = db::build_pool(&config.database_url)?;
    {
        let mut conn = pool.get()?;
        db::run_migrations(&mut conn)?;
    }

    let default_plan_id = {
        let pool = pool.clone();
        let max_files = config.max_files_per_user_per_month;
        let max_size = config.max_file_size_bytes as i64;
        db::with_conn(&pool, move |conn| tenant::ensure_default_plan(conn, max_files, max_size)).await?
    };

    let storage = Arc::new(storage::StorageService::new(config.storage_base_path.clone())?);
    let registry = Arc::new(processors::build_registry(&config));
    let app_metrics = Arc::new(metrics::Metrics::new());

    let scheduler = WorkerPool::new(&config, pool.clone(), storage.clone(), registry, app_metrics.clone());

    let tokens = Arc::new(auth::TokenService::new(
        config.secret_key.clone(),
        config.access_token_expire,
        config.refresh_token_expire,
    ));

    let app_state = http::state::AppState {
        pool: pool.clone(),
        storage: storage.clone(),
        scheduler: scheduler.clone(),
        tokens,
        metrics: app_metrics,
        default_plan_id,
    };

    let router = http::build_router(app_state, &config.cors_origins);

    let cleanup_handle = tokio::spawn(cleanup::run(pool, storage, config.clone()));

    let addr: SocketAddr = config
        .listen_addr
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid LISTEN_ADDR '{}': {e}", config.listen_addr))?;
    tracing::info!(%addr, "docflowd listening");

    axum::Server::bind(&addr)
        .serve(router.into_make_service())
        .with_graceful_shutdown(shutdown_signal(scheduler.clone()))
        .await?;

    cleanup_handle.abort();

    // Give in-flight jobs a grace period to notice the cancellation
    // signal and finish winding down before the process exits.
    for _ in 0..50 {
        if scheduler.is_drained() {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    }

    Ok(())
}

async fn shutdown_signal(scheduler: Arc<WorkerPool>) {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install ctrl-c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received, draining worker pool");
    scheduler.shutdown();
}
