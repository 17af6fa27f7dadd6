use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use log::debug;
use uuid::Uuid;

use super::{DocumentSink, RunStore};
use crate::errors::StoreError;
use crate::model::{Deliverable, RunDocumentAssociation, RunStatus, RunStep, UploadedFile, WorkflowRun};

/// `RunStore` en memoria. Cada entrada del `DashMap` se modifica bajo el lock
/// de su shard, así que el compare-and-swap de `transition` es atómico por
/// run.
#[derive(Debug, Default)]
pub struct InMemoryRunStore {
    runs: DashMap<Uuid, WorkflowRun>,
    associations: DashMap<Uuid, Vec<RunDocumentAssociation>>,
}

impl InMemoryRunStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn run_count(&self) -> usize {
        self.runs.len()
    }
}

#[async_trait]
impl RunStore for InMemoryRunStore {
    async fn insert_run(&self, run: &WorkflowRun) -> Result<(), StoreError> {
        match self.runs.entry(run.id) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(StoreError::Conflict(format!("run {} already exists", run.id))),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(run.clone());
                debug!("insert_run run_id={} status={}", run.id, run.status);
                Ok(())
            }
        }
    }

    async fn insert_associations(&self, rows: &[RunDocumentAssociation]) -> Result<(), StoreError> {
        if let Some(orphan) = rows.iter().find(|r| !self.runs.contains_key(&r.run_id)) {
            return Err(StoreError::NotFound(format!("run {}", orphan.run_id)));
        }
        for row in rows {
            self.associations.entry(row.run_id).or_default().push(row.clone());
        }
        debug!("insert_associations count={}", rows.len());
        Ok(())
    }

    async fn load_run(&self, run_id: Uuid) -> Result<Option<WorkflowRun>, StoreError> {
        Ok(self.runs.get(&run_id).map(|r| r.clone()))
    }

    async fn list_associations(&self, run_id: Uuid) -> Result<Vec<RunDocumentAssociation>, StoreError> {
        Ok(self.associations.get(&run_id).map(|rows| rows.clone()).unwrap_or_default())
    }

    async fn transition(&self, run_id: Uuid, from: RunStatus, to: RunStatus, at: DateTime<Utc>) -> Result<bool, StoreError> {
        if !from.can_advance_to(to) {
            return Err(StoreError::Conflict(format!("illegal transition {from} -> {to}")));
        }
        let mut run = self.runs
                          .get_mut(&run_id)
                          .ok_or_else(|| StoreError::NotFound(format!("run {run_id}")))?;
        if run.status != from {
            debug!("transition:skip run_id={run_id} expected={from} actual={}", run.status);
            return Ok(false);
        }
        run.status = to;
        run.last_updated = at;
        debug!("transition run_id={run_id} {from} -> {to}");
        Ok(true)
    }

    async fn record_completion(&self,
                               run_id: Uuid,
                               steps: &[RunStep],
                               deliverable: &Deliverable,
                               at: DateTime<Utc>)
                               -> Result<bool, StoreError> {
        let mut run = self.runs
                          .get_mut(&run_id)
                          .ok_or_else(|| StoreError::NotFound(format!("run {run_id}")))?;
        if run.status != RunStatus::Running {
            return Ok(false);
        }
        run.status = RunStatus::Completed;
        run.steps = steps.to_vec();
        run.deliverable = Some(deliverable.clone());
        run.completed_at = Some(at);
        run.last_updated = at;
        Ok(true)
    }

    async fn touch(&self, run_id: Uuid, at: DateTime<Utc>) -> Result<bool, StoreError> {
        let mut run = self.runs
                          .get_mut(&run_id)
                          .ok_or_else(|| StoreError::NotFound(format!("run {run_id}")))?;
        if run.status != RunStatus::Running {
            return Ok(false);
        }
        if at > run.last_updated {
            run.last_updated = at;
        }
        Ok(true)
    }

    async fn stalled_runs(&self, updated_before: DateTime<Utc>) -> Result<Vec<Uuid>, StoreError> {
        Ok(self.runs
               .iter()
               .filter(|r| r.status == RunStatus::Running && r.last_updated < updated_before)
               .map(|r| r.id)
               .collect())
    }
}

/// `DocumentSink` en memoria: asigna un id nuevo a cada upload y conserva
/// los archivos para inspección.
#[derive(Debug, Default)]
pub struct InMemoryUploadSink {
    stored: DashMap<Uuid, UploadedFile>,
}

impl InMemoryUploadSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: Uuid) -> Option<UploadedFile> {
        self.stored.get(&id).map(|f| f.clone())
    }

    pub fn len(&self) -> usize {
        self.stored.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stored.is_empty()
    }
}

#[async_trait]
impl DocumentSink for InMemoryUploadSink {
    async fn store_upload(&self, file: &UploadedFile) -> Result<Uuid, StoreError> {
        let id = Uuid::new_v4();
        self.stored.insert(id, file.clone());
        Ok(id)
    }

    async fn discard_upload(&self, document_id: Uuid) -> Result<(), StoreError> {
        self.stored.remove(&document_id);
        Ok(())
    }
}
