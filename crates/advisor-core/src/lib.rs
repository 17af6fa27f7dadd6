//! advisor-core: ciclo de vida de las ejecuciones de workflow.
//!
//! Un `WorkflowRun` nace en `initializing` cuando el usuario envía su
//! selección de documentos, pasa a `running` con una solicitud `execute`
//! explícita y termina en `completed` (con entregable) o `failed`.
pub mod constants;
pub mod engine;
pub mod errors;
pub mod model;
pub mod step;
pub mod store;

pub use engine::{ExecuteOutcome, InitializedRun, LifecycleBuilder, RunLifecycleManager, RunView};
pub use errors::{RunError, StoreError};
pub use model::{Attachment, Deliverable, DocumentKind, DocumentSource, ExecuteDocument, ExecuteRequest, ProjectRef,
                RunDocumentAssociation, RunStatus, RunStep, RunSubmission, SelectionPayload, SubmittedDocument,
                UploadedFile, WorkflowRun};
pub use step::{PlainNarrator, StandardPlanner, StepContext, StepNarrator, StepPlanner, StepStatus, StepTemplate,
               WorkflowPlan};
pub use store::{DocumentSink, InMemoryRunStore, InMemoryUploadSink, RunStore};
