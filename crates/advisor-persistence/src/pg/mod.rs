//! Implementaciones Postgres (sqlx) de los contratos del core y del vault.
//!
//! - `PgRunStore`: runs y asociaciones. Las transiciones son `UPDATE ...
//!   WHERE status = $from`, así que el compare-and-swap lo resuelve la base de
//!   datos aunque varios procesos atiendan el mismo run.
//! - `PgVault`: documentos y proyectos del vault; también guarda uploads.
//! - Manejo básico de errores transitorios: reintento con backoff corto.

mod runs;
mod vault;

use std::future::Future;
use std::time::Duration;

use log::warn;
use sqlx::postgres::PgPoolOptions;

use crate::config::DbConfig;
use crate::error::PersistenceError;
use crate::migrations::run_pending_migrations;

pub use runs::PgRunStore;
pub use vault::PgVault;

/// Pool de conexiones Postgres.
pub type PgPool = sqlx::PgPool;

const MAX_RETRIES: u32 = 3;

/// Retry simple con backoff lineal (15ms, 30ms, 45ms) para errores
/// transitorios. No altera la semántica de la operación: sólo repite `f`.
pub(crate) async fn with_retry<F, Fut, T>(op: &str, mut f: F) -> Result<T, PersistenceError>
    where F: FnMut() -> Fut,
          Fut: Future<Output = Result<T, PersistenceError>>
{
    let mut attempts = 0;
    loop {
        match f().await {
            Err(e) if e.is_retryable() && attempts < MAX_RETRIES => {
                let delay_ms = 15 * u64::from(attempts + 1);
                warn!("{op}: retryable error (attempt {}): {e} -> sleeping {delay_ms}ms", attempts + 1);
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                attempts += 1;
            }
            r => return r,
        }
    }
}

/// Construye el pool y aplica las migraciones pendientes.
pub async fn build_pool(database_url: &str, min_size: u32, max_size: u32) -> Result<PgPool, PersistenceError> {
    let max_size = max_size.max(1);
    let min_size = min_size.max(1).min(max_size);
    let pool = PgPoolOptions::new().min_connections(min_size)
                                   .max_connections(max_size)
                                   .acquire_timeout(Duration::from_secs(5))
                                   .connect(database_url)
                                   .await
                                   .map_err(|e| PersistenceError::TransientIo(format!("pool build: {e}")))?;
    run_pending_migrations(&pool).await?;
    Ok(pool)
}

/// Carga `.env`, lee la configuración y construye un pool ya migrado.
pub async fn build_pool_from_env() -> Result<PgPool, PersistenceError> {
    let cfg = DbConfig::from_env()?;
    build_pool(&cfg.url, cfg.min_connections, cfg.max_connections).await
}
