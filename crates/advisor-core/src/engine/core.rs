//! Manager del ciclo de vida de un `WorkflowRun`.
//!
//! Es el único componente con autoridad de escritura sobre un run una vez
//! creado. Cada transición pasa por un compare-and-swap del `RunStore`, de
//! modo que dos solicitudes `execute` concurrentes sobre el mismo run nunca
//! ejecutan los pasos dos veces.
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use uuid::Uuid;

use crate::engine::deliverable::synthesize_deliverable;
use crate::engine::LifecycleBuilder;
use crate::errors::RunError;
use crate::model::{DocumentSource, ExecuteDocument, ExecuteRequest, RunDocumentAssociation, RunStatus, RunStep,
                   RunSubmission, WorkflowRun};
use crate::step::{StepContext, StepNarrator, StepPlanner, StepStatus, StepTemplate};
use crate::store::{DocumentSink, RunStore};

/// Resultado de `initialize`: el run creado, sus asociaciones y el resumen
/// de documentos listo para la solicitud de ejecución.
#[derive(Debug, Clone)]
pub struct InitializedRun {
    pub run: WorkflowRun,
    pub associations: Vec<RunDocumentAssociation>,
    pub documents: Vec<ExecuteDocument>,
}

/// Resultado de `execute`.
#[derive(Debug, Clone, PartialEq)]
pub enum ExecuteOutcome {
    /// Esta llamada ejecutó los pasos y el run quedó `completed`.
    Completed(WorkflowRun),
    /// El run ya no estaba en `initializing`; no se tocó nada.
    Skipped(WorkflowRun),
}

/// Run con sus asociaciones, para lectura.
#[derive(Debug, Clone)]
pub struct RunView {
    pub run: WorkflowRun,
    pub associations: Vec<RunDocumentAssociation>,
}

pub struct RunLifecycleManager {
    pub(crate) store: Arc<dyn RunStore>,
    pub(crate) sink: Arc<dyn DocumentSink>,
    pub(crate) narrator: Arc<dyn StepNarrator>,
    pub(crate) planner: Arc<dyn StepPlanner>,
    pub(crate) step_deadline: Option<Duration>,
}

impl RunLifecycleManager {
    #[inline]
    pub fn builder(store: Arc<dyn RunStore>, sink: Arc<dyn DocumentSink>) -> LifecycleBuilder {
        LifecycleBuilder::new(store, sink)
    }

    pub fn step_deadline(&self) -> Option<Duration> {
        self.step_deadline
    }

    /// Crea el run en `initializing` y asocia sus documentos.
    ///
    /// Orden de escritura: uploads al vault, fila del run, asociaciones. Si
    /// falla la escritura de asociaciones el run se compensa a `failed` y no
    /// se devuelve ningún id. Ante cualquier fallo se borran del vault los
    /// uploads ya guardados.
    pub async fn initialize(&self, submission: RunSubmission) -> Result<InitializedRun, RunError> {
        let mut uploaded_ids = Vec::new();
        let mut linked: Vec<(Uuid, Option<Uuid>)> = Vec::with_capacity(submission.documents.len());
        for doc in &submission.documents.documents {
            let document_id = match &doc.source {
                DocumentSource::Vault(id) => *id,
                DocumentSource::Upload(file) => match self.sink.store_upload(file).await {
                    Ok(id) => {
                        uploaded_ids.push(id);
                        id
                    }
                    Err(e) => {
                        warn!("initialize:upload error name={} err={e}", file.name);
                        self.discard_uploads(&uploaded_ids).await;
                        return Err(RunError::FailedToStart(format!("upload of '{}' failed: {e}", file.name)));
                    }
                },
            };
            linked.push((document_id, doc.project.as_ref().map(|p| p.id)));
        }

        let run = WorkflowRun::initializing(submission.workflow_id, submission.run_by, submission.inputs);
        if let Err(e) = self.store.insert_run(&run).await {
            error!("initialize:insert_run error run_id={} err={e}", run.id);
            self.discard_uploads(&uploaded_ids).await;
            return Err(RunError::FailedToStart(format!("run record: {e}")));
        }

        let associations: Vec<RunDocumentAssociation> =
            linked.into_iter()
                  .map(|(document_id, project_id)| RunDocumentAssociation { run_id: run.id,
                                                                            document_id,
                                                                            project_id,
                                                                            created_at: run.created_at })
                  .collect();
        if let Err(e) = self.store.insert_associations(&associations).await {
            error!("initialize:associations error run_id={} err={e}", run.id);
            self.mark_failed(run.id, RunStatus::Initializing, &e.to_string()).await;
            self.discard_uploads(&uploaded_ids).await;
            return Err(RunError::FailedToStart(format!("document associations: {e}")));
        }

        info!("run initialized run_id={} workflow_id={} documents={}",
              run.id,
              run.workflow_id,
              associations.len());
        let documents = submission.documents.execute_documents(&uploaded_ids);
        Ok(InitializedRun { run,
                            associations,
                            documents })
    }

    /// Transición `initializing -> running`, ejecución secuencial de pasos y
    /// cierre en `completed` o `failed`.
    ///
    /// Una invocación sobre un run que ya no está en `initializing` es un
    /// no-op y devuelve `ExecuteOutcome::Skipped` con el estado actual.
    pub async fn execute(&self, request: &ExecuteRequest) -> Result<ExecuteOutcome, RunError> {
        let run_id = request.run_id;
        let run = self.store.load_run(run_id).await?.ok_or(RunError::RunNotFound(run_id))?;
        if run.workflow_id != request.workflow_id {
            warn!("execute:reject run_id={run_id} workflow_id={} requested={}",
                  run.workflow_id,
                  request.workflow_id);
            return Err(RunError::WorkflowMismatch { run_id,
                                                    expected: run.workflow_id,
                                                    requested: request.workflow_id.clone() });
        }
        if run.status != RunStatus::Initializing {
            info!("execute:skip run_id={run_id} status={}", run.status);
            return Ok(ExecuteOutcome::Skipped(run));
        }

        let accepted_at = Utc::now();
        if !self.store.transition(run_id, RunStatus::Initializing, RunStatus::Running, accepted_at).await? {
            let current = self.store.load_run(run_id).await?.ok_or(RunError::RunNotFound(run_id))?;
            info!("execute:lost-race run_id={run_id} status={}", current.status);
            return Ok(ExecuteOutcome::Skipped(current));
        }
        info!("run accepted run_id={run_id} workflow_id={}", request.workflow_id);

        let mut running = run;
        running.status = RunStatus::Running;
        running.last_updated = accepted_at;

        match self.run_to_completion(running, request).await {
            Ok(completed) => Ok(ExecuteOutcome::Completed(completed)),
            Err(e) => {
                self.mark_failed(run_id, RunStatus::Running, &e.to_string()).await;
                Err(e)
            }
        }
    }

    async fn run_to_completion(&self, mut run: WorkflowRun, request: &ExecuteRequest) -> Result<WorkflowRun, RunError> {
        let plan = self.planner.plan(request);
        if plan.is_empty() {
            return Err(RunError::EmptyPlan);
        }
        let documents = request.documents.clone().unwrap_or_default();

        let mut steps: Vec<RunStep> = Vec::with_capacity(plan.len());
        for (index, template) in plan.steps.iter().enumerate() {
            let step = self.run_step(request, &documents, template, index, plan.len(), &steps).await?;
            let heartbeat = step.end_time.unwrap_or_else(Utc::now);
            steps.push(step);
            if !self.store.touch(run.id, heartbeat).await? {
                // otro escritor (p. ej. el watchdog) ya sacó el run de `running`
                let current = self.current_status(run.id).await?;
                warn!("execute:abandon run_id={} status={current} after step={}", run.id, template.id);
                return Err(RunError::InvalidTransition { from: current,
                                                         to: RunStatus::Completed });
            }
        }

        let deliverable = synthesize_deliverable(request, &steps);
        let completed_at = Utc::now();
        if !self.store.record_completion(run.id, &steps, &deliverable, completed_at).await? {
            let current = self.current_status(run.id).await?;
            return Err(RunError::InvalidTransition { from: current,
                                                     to: RunStatus::Completed });
        }
        info!("run completed run_id={} steps={}", run.id, steps.len());

        run.status = RunStatus::Completed;
        run.steps = steps;
        run.deliverable = Some(deliverable);
        run.completed_at = Some(completed_at);
        run.last_updated = completed_at;
        Ok(run)
    }

    async fn run_step(&self,
                      request: &ExecuteRequest,
                      documents: &[ExecuteDocument],
                      template: &StepTemplate,
                      index: usize,
                      total: usize,
                      previous: &[RunStep])
                      -> Result<RunStep, RunError> {
        // Un paso nunca empieza antes de que termine el anterior, aunque el
        // reloj del sistema retroceda.
        let start_time = not_before(Utc::now(), previous.last().and_then(|s| s.end_time));
        debug!("step:start run_id={} step_id={} index={index}", request.run_id, template.id);

        let ctx = StepContext { run_id: request.run_id,
                                workflow_id: &request.workflow_id,
                                workflow_title: &request.workflow_title,
                                workflow_description: &request.workflow_description,
                                step: template,
                                index,
                                total,
                                inputs: &request.inputs,
                                documents,
                                previous };
        let narration = match self.step_deadline {
            Some(deadline) => tokio::time::timeout(deadline, self.narrator.narrate(&ctx)).await
                                                                                          .map_err(|_| RunError::StepDeadlineExceeded { step_id: template.id.clone(),
                                                                                                                                         deadline_ms: deadline.as_millis() as u64 })?,
            None => self.narrator.narrate(&ctx).await,
        };
        let reasoning = narration.map_err(|e| RunError::StepFailed { step_id: template.id.clone(),
                                                                     message: e.to_string() })?;
        let end_time = not_before(Utc::now(), Some(start_time));
        debug!("step:done run_id={} step_id={}", request.run_id, template.id);

        Ok(RunStep { id: template.id.clone(),
                     name: template.name.clone(),
                     description: template.description.clone(),
                     status: StepStatus::Completed,
                     reasoning: Some(reasoning),
                     start_time: Some(start_time),
                     end_time: Some(end_time) })
    }

    async fn current_status(&self, run_id: Uuid) -> Result<RunStatus, RunError> {
        Ok(self.store
               .load_run(run_id)
               .await?
               .map(|r| r.status)
               .unwrap_or(RunStatus::Failed))
    }

    /// Borrado best-effort de uploads cuyo run no llegó a crearse.
    async fn discard_uploads(&self, uploaded_ids: &[Uuid]) {
        for id in uploaded_ids {
            if let Err(e) = self.sink.discard_upload(*id).await {
                error!("initialize:discard error document_id={id} err={e}");
            }
        }
    }

    /// Escritura best-effort de `failed`. Nunca propaga su propio error: el
    /// llamador ya tiene el error original.
    async fn mark_failed(&self, run_id: Uuid, from: RunStatus, cause: &str) {
        match self.store.transition(run_id, from, RunStatus::Failed, Utc::now()).await {
            Ok(true) => warn!("run failed run_id={run_id} cause={cause}"),
            Ok(false) => warn!("mark_failed:skip run_id={run_id} no longer {from} cause={cause}"),
            Err(e) => error!("mark_failed:error run_id={run_id} err={e} cause={cause}"),
        }
    }

    /// Watchdog: pasa a `failed` los runs en `running` sin actividad desde
    /// hace más de `max_idle`. Devuelve los ids efectivamente marcados.
    pub async fn reap_stalled_runs(&self, max_idle: chrono::Duration) -> Result<Vec<Uuid>, RunError> {
        let cutoff = Utc::now() - max_idle;
        let candidates = self.store.stalled_runs(cutoff).await?;
        let mut reaped = Vec::new();
        for run_id in candidates {
            match self.store.transition(run_id, RunStatus::Running, RunStatus::Failed, Utc::now()).await {
                Ok(true) => {
                    warn!("watchdog: run stalled run_id={run_id} cutoff={cutoff}");
                    reaped.push(run_id);
                }
                Ok(false) => debug!("watchdog:skip run_id={run_id} finished meanwhile"),
                Err(e) => error!("watchdog:error run_id={run_id} err={e}"),
            }
        }
        Ok(reaped)
    }

    pub async fn load(&self, run_id: Uuid) -> Result<RunView, RunError> {
        let run = self.store.load_run(run_id).await?.ok_or(RunError::RunNotFound(run_id))?;
        let associations = self.store.list_associations(run_id).await?;
        Ok(RunView { run, associations })
    }
}

fn not_before(now: DateTime<Utc>, floor: Option<DateTime<Utc>>) -> DateTime<Utc> {
    match floor {
        Some(floor) if floor > now => floor,
        _ => now,
    }
}
