//! Runner de migraciones SQL embebidas.
//!
//! Cada archivo de `migrations/` es una migración; se aplican en orden, una
//! sola vez, dentro de una transacción. Las aplicadas quedan registradas en
//! `schema_migrations`.

use chrono::Utc;
use log::info;
use sqlx::PgPool;

use crate::error::PersistenceError;

/// (versión, contenido) en orden de aplicación.
pub const MIGRATIONS: &[(&str, &str)] = &[("0001_vault.sql", include_str!("../migrations/0001_vault.sql")),
                                          ("0002_workflow_runs.sql", include_str!("../migrations/0002_workflow_runs.sql"))];

/// Divide un archivo en sentencias, descartando comentarios de línea y
/// sentencias vacías.
fn statements(sql: &str) -> Vec<String> {
    let without_comments: String = sql.lines()
                                      .filter(|l| !l.trim_start().starts_with("--"))
                                      .collect::<Vec<_>>()
                                      .join("\n");
    without_comments.split(';')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
}

/// Aplica las migraciones pendientes. Devuelve cuántas se aplicaron.
pub async fn run_pending_migrations(pool: &PgPool) -> Result<usize, PersistenceError> {
    sqlx::query("CREATE TABLE IF NOT EXISTS schema_migrations (version TEXT PRIMARY KEY, applied_at TIMESTAMPTZ NOT NULL)")
        .execute(pool)
        .await?;

    let mut applied = 0;
    for (version, sql) in MIGRATIONS {
        let already: Option<(String,)> = sqlx::query_as("SELECT version FROM schema_migrations WHERE version = $1")
            .bind(*version)
            .fetch_optional(pool)
            .await?;
        if already.is_some() {
            continue;
        }
        info!("applying migration {version}");
        let mut tx = pool.begin().await?;
        for stmt in statements(sql) {
            sqlx::query(&stmt).execute(&mut *tx)
                              .await
                              .map_err(|e| PersistenceError::Migration { version: version.to_string(),
                                                                         message: e.to_string() })?;
        }
        sqlx::query("INSERT INTO schema_migrations (version, applied_at) VALUES ($1, $2)")
            .bind(*version)
            .bind(Utc::now())
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        applied += 1;
    }
    Ok(applied)
}
