//! TemplateNarrator (narración determinista)
//!
//! - Cada paso conocido tiene su plantilla; los pasos desconocidos usan la
//!   descripción del paso.
//! - El texto sólo depende del contexto, así que dos ejecuciones con la misma
//!   entrada producen el mismo `reasoning`.

use advisor_core::step::NarrationError;
use advisor_core::{DocumentKind, StepContext, StepNarrator};
use async_trait::async_trait;

/// Cantidad máxima de respuestas citadas en el análisis de inputs.
const MAX_QUOTED_INPUTS: usize = 6;

#[derive(Debug, Clone, Default)]
pub struct TemplateNarrator {
    /// Firma opcional añadida al final de cada narración (p. ej. el equipo).
    pub signature: Option<String>,
}

impl TemplateNarrator {
    pub fn signed(signature: impl Into<String>) -> Self {
        Self { signature: Some(signature.into()) }
    }

    fn document_review(ctx: &StepContext<'_>) -> String {
        if ctx.documents.is_empty() {
            return format!("No documents were attached to {}; the review relies on the answers provided.",
                           ctx.workflow_title);
        }
        let files: Vec<&str> = ctx.documents
                                  .iter()
                                  .filter(|d| d.kind == DocumentKind::File)
                                  .map(|d| d.name.as_str())
                                  .collect();
        let projects: Vec<&str> = ctx.documents
                                     .iter()
                                     .filter(|d| d.kind == DocumentKind::Project)
                                     .map(|d| d.name.as_str())
                                     .collect();
        let mut text = format!("Reviewed {} document reference(s) for {}.", ctx.documents.len(), ctx.workflow_title);
        if !files.is_empty() {
            text.push_str(&format!(" Files: {}.", files.join(", ")));
        }
        if !projects.is_empty() {
            text.push_str(&format!(" Project folders: {}.", projects.join(", ")));
        }
        text
    }

    fn input_analysis(ctx: &StepContext<'_>) -> String {
        if ctx.inputs.is_empty() {
            return "No questionnaire answers were captured; follow-up with the client is required.".to_string();
        }
        let quoted: Vec<String> = ctx.inputs
                                     .iter()
                                     .take(MAX_QUOTED_INPUTS)
                                     .map(|(k, v)| format!("{k} = {}", render_value(v)))
                                     .collect();
        let mut text = format!("Analyzed {} answer(s): {}.", ctx.inputs.len(), quoted.join("; "));
        if ctx.inputs.len() > MAX_QUOTED_INPUTS {
            text.push_str(&format!(" {} more answer(s) omitted.", ctx.inputs.len() - MAX_QUOTED_INPUTS));
        }
        text
    }

    fn deliverable_preparation(ctx: &StepContext<'_>) -> String {
        let done: Vec<&str> = ctx.previous.iter().map(|s| s.name.as_str()).collect();
        if done.is_empty() {
            return format!("Prepared the {} deliverable.", ctx.workflow_title);
        }
        format!("Prepared the {} deliverable from {} prior step(s): {}.",
                ctx.workflow_title,
                done.len(),
                done.join(", "))
    }
}

fn render_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => "(blank)".to_string(),
        other => other.to_string(),
    }
}

#[async_trait]
impl StepNarrator for TemplateNarrator {
    async fn narrate(&self, ctx: &StepContext<'_>) -> Result<String, NarrationError> {
        let mut text = match ctx.step.id.as_str() {
            "document-review" => Self::document_review(ctx),
            "input-analysis" => Self::input_analysis(ctx),
            "deliverable-preparation" => Self::deliverable_preparation(ctx),
            _ => format!("{}: {}.", ctx.step.name, ctx.step.description),
        };
        if let Some(signature) = &self.signature {
            text.push_str(&format!(" ({signature})"));
        }
        Ok(text)
    }
}
