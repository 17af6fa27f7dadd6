//! Errores del núcleo: fallos de almacenamiento y fallos del ciclo de vida de
//! un run.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::model::RunStatus;

/// Error devuelto por las implementaciones de `RunStore` / `DocumentSink`.
///
/// Las capas de persistencia traducen sus errores de driver a estas
/// variantes para que el core nunca dependa de tipos de base de datos.
#[derive(Debug, Error, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub enum StoreError {
    #[error("record not found: {0}")]
    NotFound(String),
    #[error("conflicting write: {0}")]
    Conflict(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("store backend error: {0}")]
    Backend(String),
}

/// Errores del ciclo de vida de un `WorkflowRun`.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum RunError {
    #[error("run {0} not found")]
    RunNotFound(Uuid),
    #[error("run failed to start: {0}")]
    FailedToStart(String),
    #[error("invalid status transition {from} -> {to}")]
    InvalidTransition { from: RunStatus, to: RunStatus },
    #[error("step '{step_id}' failed: {message}")]
    StepFailed { step_id: String, message: String },
    #[error("step '{step_id}' exceeded its deadline of {deadline_ms}ms")]
    StepDeadlineExceeded { step_id: String, deadline_ms: u64 },
    /// La solicitud `execute` nombra un workflow distinto del que creó el run.
    #[error("run {run_id} belongs to workflow '{expected}', not '{requested}'")]
    WorkflowMismatch { run_id: Uuid, expected: String, requested: String },
    #[error("workflow plan has no steps")]
    EmptyPlan,
    #[error(transparent)]
    Store(#[from] StoreError),
}
