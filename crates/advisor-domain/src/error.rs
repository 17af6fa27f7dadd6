// error.rs
use advisor_core::StoreError;
use thiserror::Error;
use uuid::Uuid;

/// Errores del dominio de selección y vault.
///
/// Los conflictos de fusión (nombre duplicado, proyecto vacío) no son
/// errores: las operaciones de la selección los resuelven como no-op.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("vault document {0} not found")]
    DocumentNotFound(Uuid),
    #[error("vault project {0} not found")]
    ProjectNotFound(Uuid),
    #[error("vault lookup failed: {0}")]
    Vault(#[from] StoreError),
}
