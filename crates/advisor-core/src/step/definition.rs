use async_trait::async_trait;
use uuid::Uuid;

use crate::model::{ExecuteDocument, ExecuteRequest, RunStep};

/// Error opaco devuelto por un narrador (generación de texto externa).
pub type NarrationError = Box<dyn std::error::Error + Send + Sync>;

/// Paso declarado por un plan, antes de ejecutarse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepTemplate {
    pub id: String,
    pub name: String,
    pub description: String,
}

impl StepTemplate {
    pub fn new(id: impl Into<String>, name: impl Into<String>, description: impl Into<String>) -> Self {
        Self { id: id.into(),
               name: name.into(),
               description: description.into() }
    }
}

/// Secuencia ordenada de pasos de un workflow.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkflowPlan {
    pub steps: Vec<StepTemplate>,
}

impl WorkflowPlan {
    pub fn new(steps: Vec<StepTemplate>) -> Self {
        Self { steps }
    }
    pub fn len(&self) -> usize {
        self.steps.len()
    }
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// Contexto que recibe el narrador para un paso.
#[derive(Debug)]
pub struct StepContext<'a> {
    pub run_id: Uuid,
    pub workflow_id: &'a str,
    pub workflow_title: &'a str,
    pub workflow_description: &'a str,
    pub step: &'a StepTemplate,
    pub index: usize,
    pub total: usize,
    pub inputs: &'a serde_json::Map<String, serde_json::Value>,
    pub documents: &'a [ExecuteDocument],
    /// Pasos ya completados en este run, en orden.
    pub previous: &'a [RunStep],
}

/// Productor opaco del texto `reasoning` de cada paso.
#[async_trait]
pub trait StepNarrator: Send + Sync {
    async fn narrate(&self, ctx: &StepContext<'_>) -> Result<String, NarrationError>;
}

/// Decide qué pasos ejecuta un workflow.
pub trait StepPlanner: Send + Sync {
    fn plan(&self, request: &ExecuteRequest) -> WorkflowPlan;
}

/// Plan por defecto de tres pasos: revisión documental, análisis de
/// respuestas y preparación del entregable.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardPlanner;

impl StepPlanner for StandardPlanner {
    fn plan(&self, request: &ExecuteRequest) -> WorkflowPlan {
        WorkflowPlan::new(vec![StepTemplate::new("document-review",
                                                 "Document Review",
                                                 "Review the documents attached to the run"),
                               StepTemplate::new("input-analysis",
                                                 "Input Analysis",
                                                 format!("Analyze the answers collected for {}", request.workflow_title)),
                               StepTemplate::new("deliverable-preparation",
                                                 "Deliverable Preparation",
                                                 "Assemble findings into the client deliverable"),])
    }
}

/// Narrador mínimo usado cuando no se configura otro.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainNarrator;

#[async_trait]
impl StepNarrator for PlainNarrator {
    async fn narrate(&self, ctx: &StepContext<'_>) -> Result<String, NarrationError> {
        Ok(format!("{} ({} of {}): {}.", ctx.step.name, ctx.index + 1, ctx.total, ctx.step.description))
    }
}
