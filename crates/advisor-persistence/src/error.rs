//! Errores de persistencia.
//! Mapea errores de sqlx / conexión a variantes semánticas y, hacia el core,
//! a `StoreError`.

use advisor_core::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("unique violation: {0}")]
    UniqueViolation(String),
    #[error("check violation: {0}")]
    CheckViolation(String),
    #[error("foreign key violation: {0}")]
    ForeignKeyViolation(String),
    #[error("not found")]
    NotFound,
    #[error("serialization conflict (retryable)")]
    SerializationConflict,
    #[error("transient IO / connection pool error: {0}")]
    TransientIo(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("row decode error: {0}")]
    Decode(String),
    #[error("migration {version} failed: {message}")]
    Migration { version: String, message: String },
    #[error("unknown database error: {0}")]
    Unknown(String),
}

impl PersistenceError {
    /// Errores transitorios: conviene reintentar con backoff.
    pub fn is_retryable(&self) -> bool {
        match self {
            PersistenceError::SerializationConflict | PersistenceError::TransientIo(_) => true,
            // Algunos mensajes del servidor llegan sin SQLSTATE útil.
            PersistenceError::Unknown(msg) => {
                let m = msg.to_lowercase();
                m.contains("deadlock detected")
                || m.contains("terminating connection due to administrator command")
                || m.contains("connection closed")
                || m.contains("connection refused")
                || m.contains("timeout")
            }
            _ => false,
        }
    }
}

impl From<sqlx::Error> for PersistenceError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => Self::NotFound,
            sqlx::Error::Database(db) => {
                let message = db.message().to_string();
                match db.code().as_deref() {
                    Some("23505") => Self::UniqueViolation(message),
                    Some("23514") => Self::CheckViolation(message),
                    Some("23503") => Self::ForeignKeyViolation(message),
                    Some("40001") | Some("40P01") => Self::SerializationConflict,
                    Some(code) => Self::Unknown(format!("sqlstate {code}: {message}")),
                    None => Self::Unknown(message),
                }
            }
            sqlx::Error::PoolTimedOut => Self::TransientIo("pool timed out".into()),
            sqlx::Error::PoolClosed => Self::TransientIo("pool closed".into()),
            sqlx::Error::Io(e) => Self::TransientIo(format!("io: {e}")),
            sqlx::Error::Tls(e) => Self::TransientIo(format!("tls: {e}")),
            sqlx::Error::ColumnNotFound(c) => Self::Decode(format!("column not found: {c}")),
            sqlx::Error::ColumnDecode { index, source } => Self::Decode(format!("column {index}: {source}")),
            sqlx::Error::Decode(e) => Self::Decode(e.to_string()),
            other => Self::Unknown(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for PersistenceError {
    fn from(e: serde_json::Error) -> Self {
        PersistenceError::Decode(format!("json: {e}"))
    }
}

impl From<PersistenceError> for StoreError {
    fn from(e: PersistenceError) -> Self {
        match e {
            PersistenceError::NotFound => StoreError::NotFound("row".into()),
            PersistenceError::UniqueViolation(m)
            | PersistenceError::CheckViolation(m)
            | PersistenceError::ForeignKeyViolation(m) => StoreError::Conflict(m),
            PersistenceError::SerializationConflict | PersistenceError::TransientIo(_) => StoreError::Unavailable(e.to_string()),
            other => StoreError::Backend(other.to_string()),
        }
    }
}
