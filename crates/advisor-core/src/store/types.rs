//! Contratos de almacenamiento que consume el manager.
//!
//! `RunStore` es la superficie CRUD sobre los runs y sus asociaciones;
//! `DocumentSink` guarda en el vault los archivos subidos con una selección.
//! Las transiciones de estado se expresan como compare-and-swap: la
//! implementación sólo escribe si el estado actual coincide con `from`, lo que
//! da exclusión mutua por run sin un lock externo.
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::errors::StoreError;
use crate::model::{Deliverable, RunDocumentAssociation, RunStatus, RunStep, UploadedFile, WorkflowRun};

#[async_trait]
pub trait RunStore: Send + Sync {
    /// Inserta la fila del run. Falla con `Conflict` si el id ya existe.
    async fn insert_run(&self, run: &WorkflowRun) -> Result<(), StoreError>;

    /// Inserta todas las asociaciones de una vez (todas o ninguna).
    async fn insert_associations(&self, rows: &[RunDocumentAssociation]) -> Result<(), StoreError>;

    async fn load_run(&self, run_id: Uuid) -> Result<Option<WorkflowRun>, StoreError>;

    async fn list_associations(&self, run_id: Uuid) -> Result<Vec<RunDocumentAssociation>, StoreError>;

    /// Cambia `status` de `from` a `to` y fija `last_updated = at`.
    /// Devuelve `false` si el estado actual no era `from`.
    async fn transition(&self, run_id: Uuid, from: RunStatus, to: RunStatus, at: DateTime<Utc>) -> Result<bool, StoreError>;

    /// Escribe `completed` con pasos, entregable y `completed_at`, sólo si el
    /// run sigue en `running`.
    async fn record_completion(&self,
                               run_id: Uuid,
                               steps: &[RunStep],
                               deliverable: &Deliverable,
                               at: DateTime<Utc>)
                               -> Result<bool, StoreError>;

    /// Latido de un run en curso: fija `last_updated = at` sólo si sigue en
    /// `running`. Devuelve `false` en otro caso.
    async fn touch(&self, run_id: Uuid, at: DateTime<Utc>) -> Result<bool, StoreError>;

    /// Ids de runs en `running` cuyo `last_updated` es anterior a
    /// `updated_before`.
    async fn stalled_runs(&self, updated_before: DateTime<Utc>) -> Result<Vec<Uuid>, StoreError>;
}

/// Destino de los archivos subidos: los guarda y devuelve su id de vault.
#[async_trait]
pub trait DocumentSink: Send + Sync {
    async fn store_upload(&self, file: &UploadedFile) -> Result<Uuid, StoreError>;

    /// Borra un upload guardado por `store_upload` cuyo run no llegó a
    /// crearse. Un id desconocido no es un error.
    async fn discard_upload(&self, document_id: Uuid) -> Result<(), StoreError>;
}
