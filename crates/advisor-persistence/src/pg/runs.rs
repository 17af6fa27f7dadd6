use advisor_core::{Deliverable, RunDocumentAssociation, RunStatus, RunStep, RunStore, StoreError, WorkflowRun};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::debug;
use serde_json::Value;
use sqlx::postgres::PgRow;
use sqlx::Row;
use uuid::Uuid;

use super::{with_retry, PgPool};
use crate::error::PersistenceError;

const RUN_COLUMNS: &str =
    "id, workflow_id, run_by, created_at, status, inputs, steps, deliverable, last_updated, completed_at";

/// `RunStore` sobre las tablas `workflow_runs` y `workflow_run_documents`.
#[derive(Clone)]
pub struct PgRunStore {
    pool: PgPool,
}

impl PgRunStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn insert_run_once(&self, run: &WorkflowRun) -> Result<(), PersistenceError> {
        let deliverable = run.deliverable.as_ref().map(serde_json::to_value).transpose()?;
        sqlx::query("INSERT INTO workflow_runs (id, workflow_id, run_by, created_at, status, inputs, steps, deliverable, last_updated, completed_at)
                     VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10)")
            .bind(run.id)
            .bind(&run.workflow_id)
            .bind(&run.run_by)
            .bind(run.created_at)
            .bind(run.status.as_str())
            .bind(Value::Object(run.inputs.clone()))
            .bind(serde_json::to_value(&run.steps)?)
            .bind(deliverable)
            .bind(run.last_updated)
            .bind(run.completed_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn insert_associations_once(&self, rows: &[RunDocumentAssociation]) -> Result<(), PersistenceError> {
        // Todas o ninguna: una sola transacción.
        let mut tx = self.pool.begin().await?;
        for row in rows {
            sqlx::query("INSERT INTO workflow_run_documents (run_id, document_id, project_id, created_at) VALUES ($1,$2,$3,$4)")
                .bind(row.run_id)
                .bind(row.document_id)
                .bind(row.project_id)
                .bind(row.created_at)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn load_run_once(&self, run_id: Uuid) -> Result<Option<WorkflowRun>, PersistenceError> {
        let sql = format!("SELECT {RUN_COLUMNS} FROM workflow_runs WHERE id = $1");
        let row = sqlx::query(&sql).bind(run_id).fetch_optional(&self.pool).await?;
        row.map(|r| row_to_run(&r)).transpose()
    }

    async fn list_associations_once(&self, run_id: Uuid) -> Result<Vec<RunDocumentAssociation>, PersistenceError> {
        let rows = sqlx::query("SELECT run_id, document_id, project_id, created_at FROM workflow_run_documents WHERE run_id = $1 ORDER BY seq")
            .bind(run_id)
            .fetch_all(&self.pool)
            .await?;
        rows.iter()
            .map(|r| -> Result<RunDocumentAssociation, PersistenceError> {
                Ok(RunDocumentAssociation { run_id: r.try_get("run_id")?,
                                            document_id: r.try_get("document_id")?,
                                            project_id: r.try_get("project_id")?,
                                            created_at: r.try_get("created_at")? })
            })
            .collect()
    }

    async fn exists(&self, run_id: Uuid) -> Result<bool, PersistenceError> {
        let row: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM workflow_runs WHERE id = $1").bind(run_id)
                                                                                              .fetch_optional(&self.pool)
                                                                                              .await?;
        Ok(row.is_some())
    }

    async fn transition_once(&self,
                             run_id: Uuid,
                             from: RunStatus,
                             to: RunStatus,
                             at: DateTime<Utc>)
                             -> Result<bool, PersistenceError> {
        let result = sqlx::query("UPDATE workflow_runs SET status = $3, last_updated = $4 WHERE id = $1 AND status = $2")
            .bind(run_id)
            .bind(from.as_str())
            .bind(to.as_str())
            .bind(at)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 1 {
            debug!("transition run_id={run_id} {from} -> {to}");
            return Ok(true);
        }
        if !self.exists(run_id).await? {
            return Err(PersistenceError::NotFound);
        }
        debug!("transition:skip run_id={run_id} expected={from}");
        Ok(false)
    }

    async fn record_completion_once(&self,
                                    run_id: Uuid,
                                    steps: &[RunStep],
                                    deliverable: &Deliverable,
                                    at: DateTime<Utc>)
                                    -> Result<bool, PersistenceError> {
        let result = sqlx::query("UPDATE workflow_runs SET status = 'completed', steps = $2, deliverable = $3, completed_at = $4, last_updated = $4
                                  WHERE id = $1 AND status = 'running'")
            .bind(run_id)
            .bind(serde_json::to_value(steps)?)
            .bind(serde_json::to_value(deliverable)?)
            .bind(at)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 1 {
            return Ok(true);
        }
        if !self.exists(run_id).await? {
            return Err(PersistenceError::NotFound);
        }
        Ok(false)
    }

    async fn touch_once(&self, run_id: Uuid, at: DateTime<Utc>) -> Result<bool, PersistenceError> {
        let result = sqlx::query("UPDATE workflow_runs SET last_updated = GREATEST(last_updated, $2) WHERE id = $1 AND status = 'running'")
            .bind(run_id)
            .bind(at)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 1 {
            return Ok(true);
        }
        if !self.exists(run_id).await? {
            return Err(PersistenceError::NotFound);
        }
        Ok(false)
    }

    async fn stalled_runs_once(&self, updated_before: DateTime<Utc>) -> Result<Vec<Uuid>, PersistenceError> {
        let rows: Vec<(Uuid,)> =
            sqlx::query_as("SELECT id FROM workflow_runs WHERE status = 'running' AND last_updated < $1 ORDER BY last_updated")
                .bind(updated_before)
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }
}

fn row_to_run(row: &PgRow) -> Result<WorkflowRun, PersistenceError> {
    let status: String = row.try_get("status")?;
    let status = status.parse::<RunStatus>().map_err(PersistenceError::Decode)?;
    let inputs = match row.try_get::<Value, _>("inputs")? {
        Value::Object(map) => map,
        Value::Null => serde_json::Map::new(),
        other => return Err(PersistenceError::Decode(format!("inputs is not an object: {other}"))),
    };
    let steps: Vec<RunStep> = serde_json::from_value(row.try_get("steps")?)?;
    let deliverable = row.try_get::<Option<Value>, _>("deliverable")?
                         .map(serde_json::from_value::<Deliverable>)
                         .transpose()?;
    Ok(WorkflowRun { id: row.try_get("id")?,
                     workflow_id: row.try_get("workflow_id")?,
                     run_by: row.try_get("run_by")?,
                     created_at: row.try_get("created_at")?,
                     status,
                     inputs,
                     steps,
                     deliverable,
                     last_updated: row.try_get("last_updated")?,
                     completed_at: row.try_get("completed_at")? })
}

#[async_trait]
impl RunStore for PgRunStore {
    async fn insert_run(&self, run: &WorkflowRun) -> Result<(), StoreError> {
        debug!("insert_run:start run_id={}", run.id);
        Ok(with_retry("insert_run", move || self.insert_run_once(run)).await?)
    }

    async fn insert_associations(&self, rows: &[RunDocumentAssociation]) -> Result<(), StoreError> {
        if rows.is_empty() {
            return Ok(());
        }
        Ok(with_retry("insert_associations", move || self.insert_associations_once(rows)).await?)
    }

    async fn load_run(&self, run_id: Uuid) -> Result<Option<WorkflowRun>, StoreError> {
        Ok(with_retry("load_run", move || self.load_run_once(run_id)).await?)
    }

    async fn list_associations(&self, run_id: Uuid) -> Result<Vec<RunDocumentAssociation>, StoreError> {
        Ok(with_retry("list_associations", move || self.list_associations_once(run_id)).await?)
    }

    async fn transition(&self, run_id: Uuid, from: RunStatus, to: RunStatus, at: DateTime<Utc>) -> Result<bool, StoreError> {
        if !from.can_advance_to(to) {
            return Err(StoreError::Conflict(format!("illegal transition {from} -> {to}")));
        }
        let result = with_retry("transition", move || self.transition_once(run_id, from, to, at)).await;
        result.map_err(|e| match e {
                  PersistenceError::NotFound => StoreError::NotFound(format!("run {run_id}")),
                  other => other.into(),
              })
    }

    async fn record_completion(&self,
                               run_id: Uuid,
                               steps: &[RunStep],
                               deliverable: &Deliverable,
                               at: DateTime<Utc>)
                               -> Result<bool, StoreError> {
        Ok(with_retry("record_completion", move || self.record_completion_once(run_id, steps, deliverable, at)).await?)
    }

    async fn touch(&self, run_id: Uuid, at: DateTime<Utc>) -> Result<bool, StoreError> {
        Ok(with_retry("touch", move || self.touch_once(run_id, at)).await?)
    }

    async fn stalled_runs(&self, updated_before: DateTime<Utc>) -> Result<Vec<Uuid>, StoreError> {
        Ok(with_retry("stalled_runs", move || self.stalled_runs_once(updated_before)).await?)
    }
}
