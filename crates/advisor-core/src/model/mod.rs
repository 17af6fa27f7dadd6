//! Modelo de datos del ciclo de vida: runs, pasos registrados, entregables,
//! asociaciones run-documento y contratos de entrada.

mod run;
mod submission;

pub use run::{Attachment, Deliverable, RunDocumentAssociation, RunStatus, RunStep, WorkflowRun};
pub use submission::{DocumentKind, DocumentSource, ExecuteDocument, ExecuteRequest, ProjectRef, RunSubmission,
                     SelectionPayload, SubmittedDocument, UploadedFile};
