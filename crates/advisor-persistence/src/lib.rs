//! advisor-persistence
//!
//! Implementaciones Postgres (sqlx) de los contratos de almacenamiento:
//! `RunStore` para runs y asociaciones, `VaultDirectory` y `DocumentSink`
//! para el vault.
//!
//! Módulos:
//! - `pg`: stores sobre Postgres, pool y reintentos.
//! - `migrations`: runner de migraciones SQL embebidas.
//! - `config`: carga de configuración desde .env.

pub mod config;
pub mod error;
pub mod migrations;
pub mod pg;

pub use config::{init_dotenv, DbConfig};
pub use error::PersistenceError;
pub use pg::{build_pool, build_pool_from_env, PgPool, PgRunStore, PgVault};
