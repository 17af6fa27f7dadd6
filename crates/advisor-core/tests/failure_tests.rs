use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use advisor_core::step::NarrationError;
use advisor_core::{Deliverable, DocumentSink, DocumentSource, ExecuteRequest, InMemoryRunStore, InMemoryUploadSink,
                   RunDocumentAssociation, RunError, RunLifecycleManager, RunStatus, RunStep, RunStore, RunSubmission,
                   SelectionPayload, StepContext, StepNarrator, StepPlanner, StoreError, SubmittedDocument, UploadedFile,
                   WorkflowPlan, WorkflowRun};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Envuelve el store en memoria y permite forzar fallos de escritura.
#[derive(Default)]
struct FlakyStore {
    inner: InMemoryRunStore,
    fail_insert_run: AtomicBool,
    fail_associations: AtomicBool,
    fail_completion: AtomicBool,
    fail_transition_to_failed: AtomicBool,
}

#[async_trait]
impl RunStore for FlakyStore {
    async fn insert_run(&self, run: &WorkflowRun) -> Result<(), StoreError> {
        if self.fail_insert_run.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("runs table locked".into()));
        }
        self.inner.insert_run(run).await
    }
    async fn insert_associations(&self, rows: &[RunDocumentAssociation]) -> Result<(), StoreError> {
        if self.fail_associations.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("associations table locked".into()));
        }
        self.inner.insert_associations(rows).await
    }
    async fn load_run(&self, run_id: Uuid) -> Result<Option<WorkflowRun>, StoreError> {
        self.inner.load_run(run_id).await
    }
    async fn list_associations(&self, run_id: Uuid) -> Result<Vec<RunDocumentAssociation>, StoreError> {
        self.inner.list_associations(run_id).await
    }
    async fn transition(&self, run_id: Uuid, from: RunStatus, to: RunStatus, at: DateTime<Utc>) -> Result<bool, StoreError> {
        if to == RunStatus::Failed && self.fail_transition_to_failed.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("connection reset".into()));
        }
        self.inner.transition(run_id, from, to, at).await
    }
    async fn record_completion(&self,
                               run_id: Uuid,
                               steps: &[RunStep],
                               deliverable: &Deliverable,
                               at: DateTime<Utc>)
                               -> Result<bool, StoreError> {
        if self.fail_completion.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("write rejected".into()));
        }
        self.inner.record_completion(run_id, steps, deliverable, at).await
    }
    async fn touch(&self, run_id: Uuid, at: DateTime<Utc>) -> Result<bool, StoreError> {
        self.inner.touch(run_id, at).await
    }
    async fn stalled_runs(&self, updated_before: DateTime<Utc>) -> Result<Vec<Uuid>, StoreError> {
        self.inner.stalled_runs(updated_before).await
    }
}

struct BrokenSink;

#[async_trait]
impl DocumentSink for BrokenSink {
    async fn store_upload(&self, _file: &UploadedFile) -> Result<Uuid, StoreError> {
        Err(StoreError::Unavailable("vault offline".into()))
    }
    async fn discard_upload(&self, _document_id: Uuid) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("vault offline".into()))
    }
}

/// Guarda en memoria pero rechaza el archivo con el nombre indicado.
struct PickySink {
    inner: InMemoryUploadSink,
    reject: &'static str,
}

#[async_trait]
impl DocumentSink for PickySink {
    async fn store_upload(&self, file: &UploadedFile) -> Result<Uuid, StoreError> {
        if file.name == self.reject {
            return Err(StoreError::Backend(format!("{} rejected", file.name)));
        }
        self.inner.store_upload(file).await
    }
    async fn discard_upload(&self, document_id: Uuid) -> Result<(), StoreError> {
        self.inner.discard_upload(document_id).await
    }
}

struct FailingNarrator {
    fail_on: &'static str,
}

#[async_trait]
impl StepNarrator for FailingNarrator {
    async fn narrate(&self, ctx: &StepContext<'_>) -> Result<String, NarrationError> {
        if ctx.step.id == self.fail_on {
            return Err("text service returned 503".into());
        }
        Ok(format!("ok {}", ctx.step.id))
    }
}

struct SlowNarrator;

#[async_trait]
impl StepNarrator for SlowNarrator {
    async fn narrate(&self, _ctx: &StepContext<'_>) -> Result<String, NarrationError> {
        tokio::time::sleep(Duration::from_millis(500)).await;
        Ok("late".into())
    }
}

/// Cada paso tarda `delay` y termina bien.
struct PacedNarrator {
    delay: Duration,
}

#[async_trait]
impl StepNarrator for PacedNarrator {
    async fn narrate(&self, ctx: &StepContext<'_>) -> Result<String, NarrationError> {
        tokio::time::sleep(self.delay).await;
        Ok(format!("done {}", ctx.step.id))
    }
}

struct EmptyPlanner;

impl StepPlanner for EmptyPlanner {
    fn plan(&self, _request: &ExecuteRequest) -> WorkflowPlan {
        WorkflowPlan::default()
    }
}

fn submission(documents: Vec<SubmittedDocument>) -> RunSubmission {
    RunSubmission { workflow_id: "wf-planning".into(),
                    run_by: "advisor".into(),
                    inputs: serde_json::Map::new(),
                    documents: SelectionPayload::new(documents) }
}

fn request(run_id: Uuid) -> ExecuteRequest {
    ExecuteRequest { run_id,
                     workflow_id: "wf-planning".into(),
                     workflow_title: "Tax Planning".into(),
                     workflow_description: String::new(),
                     inputs: serde_json::Map::new(),
                     documents: None }
}

#[tokio::test]
async fn association_failure_compensates_run_to_failed() {
    let store = Arc::new(FlakyStore::default());
    store.fail_associations.store(true, Ordering::SeqCst);
    let manager = RunLifecycleManager::builder(store.clone(), Arc::new(InMemoryUploadSink::new())).build();

    let err = manager.initialize(submission(vec![SubmittedDocument { source: DocumentSource::Vault(Uuid::new_v4()),
                                                                     name: "W2.pdf".into(),
                                                                     project: None }]))
                     .await
                     .unwrap_err();
    assert!(matches!(err, RunError::FailedToStart(_)));

    // The row exists but can never be executed.
    assert_eq!(store.inner.run_count(), 1);
    let stalled = store.inner.stalled_runs(Utc::now() + chrono::Duration::days(1)).await.unwrap();
    assert!(stalled.is_empty());
}

#[tokio::test]
async fn upload_failure_creates_no_run() {
    let store = Arc::new(InMemoryRunStore::new());
    let manager = RunLifecycleManager::builder(store.clone(), Arc::new(BrokenSink)).build();
    let upload = SubmittedDocument { source: DocumentSource::Upload(UploadedFile::new("scan.pdf", vec![1, 2, 3])),
                                     name: "scan.pdf".into(),
                                     project: None };
    let err = manager.initialize(submission(vec![upload])).await.unwrap_err();
    assert!(matches!(err, RunError::FailedToStart(msg) if msg.contains("scan.pdf")));
    assert_eq!(store.run_count(), 0);
}

#[tokio::test]
async fn step_failure_marks_run_failed() {
    let store = Arc::new(InMemoryRunStore::new());
    let manager = RunLifecycleManager::builder(store.clone(), Arc::new(InMemoryUploadSink::new()))
        .narrator(Arc::new(FailingNarrator { fail_on: "input-analysis" }))
        .build();
    let init = manager.initialize(submission(vec![])).await.unwrap();

    let err = manager.execute(&request(init.run.id)).await.unwrap_err();
    assert!(matches!(&err, RunError::StepFailed { step_id, .. } if step_id == "input-analysis"));

    let run = store.load_run(init.run.id).await.unwrap().unwrap();
    assert_eq!(run.status, RunStatus::Failed);
    assert!(run.deliverable.is_none());
    assert!(run.completed_at.is_none());

    // A failed run is terminal; a later execute does nothing.
    let again = manager.execute(&request(init.run.id)).await.unwrap();
    assert!(matches!(again, advisor_core::ExecuteOutcome::Skipped(r) if r.status == RunStatus::Failed));
}

#[tokio::test]
async fn completion_write_failure_marks_run_failed() {
    let store = Arc::new(FlakyStore::default());
    store.fail_completion.store(true, Ordering::SeqCst);
    let manager = RunLifecycleManager::builder(store.clone(), Arc::new(InMemoryUploadSink::new())).build();
    let init = manager.initialize(submission(vec![])).await.unwrap();

    let err = manager.execute(&request(init.run.id)).await.unwrap_err();
    assert!(matches!(err, RunError::Store(StoreError::Backend(_))));
    let run = store.load_run(init.run.id).await.unwrap().unwrap();
    assert_eq!(run.status, RunStatus::Failed);
}

#[tokio::test]
async fn slow_step_exceeds_deadline() {
    let store = Arc::new(InMemoryRunStore::new());
    let manager = RunLifecycleManager::builder(store.clone(), Arc::new(InMemoryUploadSink::new()))
        .narrator(Arc::new(SlowNarrator))
        .step_deadline(Duration::from_millis(20))
        .build();
    let init = manager.initialize(submission(vec![])).await.unwrap();

    let err = manager.execute(&request(init.run.id)).await.unwrap_err();
    assert_eq!(err,
               RunError::StepDeadlineExceeded { step_id: "document-review".into(),
                                                deadline_ms: 20 });
    assert_eq!(store.load_run(init.run.id).await.unwrap().unwrap().status, RunStatus::Failed);
}

#[tokio::test]
async fn empty_plan_fails_the_run() {
    let store = Arc::new(InMemoryRunStore::new());
    let manager = RunLifecycleManager::builder(store.clone(), Arc::new(InMemoryUploadSink::new()))
        .planner(Arc::new(EmptyPlanner))
        .build();
    let init = manager.initialize(submission(vec![])).await.unwrap();
    assert_eq!(manager.execute(&request(init.run.id)).await.unwrap_err(), RunError::EmptyPlan);
    assert_eq!(store.load_run(init.run.id).await.unwrap().unwrap().status, RunStatus::Failed);
}

#[tokio::test]
async fn watchdog_reaps_only_idle_running_runs() {
    let store = Arc::new(InMemoryRunStore::new());
    let manager = RunLifecycleManager::builder(store.clone(), Arc::new(InMemoryUploadSink::new())).build();

    let stale = WorkflowRun::initializing("wf", "a", serde_json::Map::new());
    let fresh = WorkflowRun::initializing("wf", "b", serde_json::Map::new());
    let waiting = WorkflowRun::initializing("wf", "c", serde_json::Map::new());
    for run in [&stale, &fresh, &waiting] {
        store.insert_run(run).await.unwrap();
    }
    let long_ago = Utc::now() - chrono::Duration::minutes(30);
    store.transition(stale.id, RunStatus::Initializing, RunStatus::Running, long_ago).await.unwrap();
    store.transition(fresh.id, RunStatus::Initializing, RunStatus::Running, Utc::now()).await.unwrap();

    let reaped = manager.reap_stalled_runs(chrono::Duration::minutes(10)).await.unwrap();
    assert_eq!(reaped, vec![stale.id]);
    assert_eq!(store.load_run(stale.id).await.unwrap().unwrap().status, RunStatus::Failed);
    assert_eq!(store.load_run(fresh.id).await.unwrap().unwrap().status, RunStatus::Running);
    assert_eq!(store.load_run(waiting.id).await.unwrap().unwrap().status, RunStatus::Initializing);
}

fn upload(name: &str) -> SubmittedDocument {
    SubmittedDocument { source: DocumentSource::Upload(UploadedFile::new(name, name.as_bytes().to_vec())),
                        name: name.into(),
                        project: None }
}

#[tokio::test]
async fn failed_association_write_discards_stored_uploads() {
    let store = Arc::new(FlakyStore::default());
    store.fail_associations.store(true, Ordering::SeqCst);
    let sink = Arc::new(InMemoryUploadSink::new());
    let manager = RunLifecycleManager::builder(store.clone(), sink.clone()).build();

    let err = manager.initialize(submission(vec![upload("W2.pdf"), upload("1099.pdf")])).await.unwrap_err();
    assert!(matches!(err, RunError::FailedToStart(_)));
    assert!(sink.is_empty());
}

#[tokio::test]
async fn failed_run_insert_discards_stored_uploads() {
    let store = Arc::new(FlakyStore::default());
    store.fail_insert_run.store(true, Ordering::SeqCst);
    let sink = Arc::new(InMemoryUploadSink::new());
    let manager = RunLifecycleManager::builder(store.clone(), sink.clone()).build();

    let err = manager.initialize(submission(vec![upload("W2.pdf")])).await.unwrap_err();
    assert!(matches!(err, RunError::FailedToStart(msg) if msg.contains("run record")));
    assert!(sink.is_empty());
    assert_eq!(store.inner.run_count(), 0);
}

#[tokio::test]
async fn rejected_upload_discards_the_earlier_ones() {
    let store = Arc::new(InMemoryRunStore::new());
    let sink = Arc::new(PickySink { inner: InMemoryUploadSink::new(),
                                    reject: "K1.pdf" });
    let manager = RunLifecycleManager::builder(store.clone(), sink.clone()).build();

    let err = manager.initialize(submission(vec![upload("W2.pdf"), upload("K1.pdf")])).await.unwrap_err();
    assert!(matches!(err, RunError::FailedToStart(msg) if msg.contains("K1.pdf")));
    assert!(sink.inner.is_empty());
    assert_eq!(store.run_count(), 0);
}

#[tokio::test]
async fn failed_status_write_does_not_mask_step_error() {
    let store = Arc::new(FlakyStore::default());
    store.fail_transition_to_failed.store(true, Ordering::SeqCst);
    let manager = RunLifecycleManager::builder(store.clone(), Arc::new(InMemoryUploadSink::new()))
        .narrator(Arc::new(FailingNarrator { fail_on: "document-review" }))
        .build();
    let init = manager.initialize(submission(vec![])).await.unwrap();

    let err = manager.execute(&request(init.run.id)).await.unwrap_err();
    assert!(matches!(&err, RunError::StepFailed { step_id, message }
                     if step_id == "document-review" && message.contains("503")));
    // the failed write was only logged; the run stays where it was
    assert_eq!(store.load_run(init.run.id).await.unwrap().unwrap().status, RunStatus::Running);
}

#[tokio::test]
async fn failed_status_write_does_not_mask_completion_error() {
    let store = Arc::new(FlakyStore::default());
    store.fail_completion.store(true, Ordering::SeqCst);
    store.fail_transition_to_failed.store(true, Ordering::SeqCst);
    let manager = RunLifecycleManager::builder(store.clone(), Arc::new(InMemoryUploadSink::new())).build();
    let init = manager.initialize(submission(vec![])).await.unwrap();

    let err = manager.execute(&request(init.run.id)).await.unwrap_err();
    assert_eq!(err, RunError::Store(StoreError::Backend("write rejected".into())));
}

#[tokio::test]
async fn long_runs_with_steady_progress_are_not_reaped() {
    let store = Arc::new(InMemoryRunStore::new());
    let manager = RunLifecycleManager::builder(store.clone(), Arc::new(InMemoryUploadSink::new()))
        .narrator(Arc::new(PacedNarrator { delay: Duration::from_millis(300) }))
        .step_deadline(Duration::from_secs(1))
        .build();
    let init = manager.initialize(submission(vec![])).await.unwrap();

    let req = request(init.run.id);
    let (outcome, reaped) = tokio::join!(manager.execute(&req), async {
        tokio::time::sleep(Duration::from_millis(700)).await;
        manager.reap_stalled_runs(chrono::Duration::milliseconds(500)).await
    });
    assert!(reaped.unwrap().is_empty());
    assert!(matches!(outcome.unwrap(), advisor_core::ExecuteOutcome::Completed(_)));
    assert_eq!(store.load_run(init.run.id).await.unwrap().unwrap().status, RunStatus::Completed);
}

#[tokio::test]
async fn reaped_run_stops_before_the_next_step() {
    let store = Arc::new(InMemoryRunStore::new());
    let manager = RunLifecycleManager::builder(store.clone(), Arc::new(InMemoryUploadSink::new()))
        .narrator(Arc::new(PacedNarrator { delay: Duration::from_millis(400) }))
        .build();
    let init = manager.initialize(submission(vec![])).await.unwrap();

    let req = request(init.run.id);
    let (outcome, reaped) = tokio::join!(manager.execute(&req), async {
        tokio::time::sleep(Duration::from_millis(650)).await;
        manager.reap_stalled_runs(chrono::Duration::milliseconds(100)).await
    });
    assert_eq!(reaped.unwrap(), vec![init.run.id]);
    assert_eq!(outcome.unwrap_err(),
               RunError::InvalidTransition { from: RunStatus::Failed,
                                             to: RunStatus::Completed });
    let run = store.load_run(init.run.id).await.unwrap().unwrap();
    assert_eq!(run.status, RunStatus::Failed);
    assert!(run.steps.is_empty());
}
