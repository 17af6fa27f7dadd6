//! advisorflow-server
//!
//! Levanta la API HTTP de runs. Con `DATABASE_URL` usa Postgres (aplicando
//! migraciones pendientes); sin ella arranca con stores en memoria.
use std::process::ExitCode;
use std::sync::Arc;

use advisor_adapters::LogNotifier;
use advisor_core::{DocumentSink, InMemoryRunStore, RunStore};
use advisor_domain::{InMemoryVault, VaultDirectory};
use advisor_persistence::{build_pool_from_env, PgRunStore, PgVault};
use advisorflow::watchdog::spawn_watchdog;
use advisorflow::{build_manager, router, AppConfig, AppState};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

type Backend = (Arc<dyn RunStore>, Arc<dyn DocumentSink>, Arc<dyn VaultDirectory>);

async fn postgres_backend() -> Result<Backend, String> {
    // el pool se entrega con las migraciones ya aplicadas
    let pool = build_pool_from_env().await.map_err(|e| format!("database error: {e}"))?;
    info!("using Postgres backend");
    let vault = Arc::new(PgVault::new(pool.clone()));
    let store: Arc<dyn RunStore> = Arc::new(PgRunStore::new(pool));
    let sink: Arc<dyn DocumentSink> = vault.clone();
    let directory: Arc<dyn VaultDirectory> = vault;
    Ok((store, sink, directory))
}

fn memory_backend() -> Backend {
    let vault = Arc::new(InMemoryVault::new());
    let store: Arc<dyn RunStore> = Arc::new(InMemoryRunStore::new());
    let sink: Arc<dyn DocumentSink> = vault.clone();
    let directory: Arc<dyn VaultDirectory> = vault;
    (store, sink, directory)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "could not listen for ctrl-c");
    }
    info!("shutting down");
}

async fn serve(config: AppConfig) -> Result<(), String> {
    let (store, sink, vault) = match &config.database_url {
        Some(_) => postgres_backend().await?,
        None => {
            warn!("DATABASE_URL not set; using in-memory stores");
            memory_backend()
        }
    };

    let manager = Arc::new(build_manager(store, sink, &config));
    let watchdog = spawn_watchdog(manager.clone(), config.watchdog_interval, config.stall_timeout);
    let app = router(AppState::new(manager, vault, Arc::new(LogNotifier)));

    let listener = tokio::net::TcpListener::bind(config.bind)
                                           .await
                                           .map_err(|e| format!("bind {}: {e}", config.bind))?;
    info!(addr = %config.bind, "listening");
    let result = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal())
                                           .await
                                           .map_err(|e| format!("server error: {e}"));
    watchdog.abort();
    result
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
                             .init();

    let config = match AppConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            error!(error = %e, "invalid configuration");
            return ExitCode::from(2);
        }
    };
    match serve(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}
