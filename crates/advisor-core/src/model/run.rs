//! Registro persistido de una ejecución de workflow (`WorkflowRun`) y su
//! máquina de estados.
//!
//! Transiciones válidas:
//! - `Initializing` -> `Running`
//! - `Initializing` -> `Failed` (compensación de una inicialización rota)
//! - `Running` -> `Completed`
//! - `Running` -> `Failed`
//!
//! `Completed` y `Failed` son terminales: ninguna transición sale de ellos.
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::step::StepStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Initializing,
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Initializing => "initializing",
            RunStatus::Running => "running",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
        }
    }

    /// Rango en la progresión; los dos estados terminales comparten rango.
    pub fn rank(&self) -> u8 {
        match self {
            RunStatus::Initializing => 0,
            RunStatus::Running => 1,
            RunStatus::Completed | RunStatus::Failed => 2,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Completed | RunStatus::Failed)
    }

    /// `true` si `next` es un avance legal desde `self`.
    pub fn can_advance_to(&self, next: RunStatus) -> bool {
        matches!((self, next),
                 (RunStatus::Initializing, RunStatus::Running)
                 | (RunStatus::Initializing, RunStatus::Failed)
                 | (RunStatus::Running, RunStatus::Completed)
                 | (RunStatus::Running, RunStatus::Failed))
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "initializing" => Ok(RunStatus::Initializing),
            "running" => Ok(RunStatus::Running),
            "completed" => Ok(RunStatus::Completed),
            "failed" => Ok(RunStatus::Failed),
            other => Err(format!("unknown run status '{other}'")),
        }
    }
}

/// Paso ejecutado de un run, tal como queda registrado al completar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunStep {
    pub id: String,
    pub name: String,
    pub description: String,
    pub status: StepStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
}

/// Documento referenciado por el entregable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub name: String,
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<Uuid>,
}

/// Artefacto sintetizado cuando un run termina en `completed`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deliverable {
    pub title: String,
    pub content: String,
    pub summary: String,
    pub recommendations: Vec<String>,
    pub attachments: Vec<Attachment>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowRun {
    pub id: Uuid,
    pub workflow_id: String,
    pub run_by: String,
    pub created_at: DateTime<Utc>,
    pub status: RunStatus,
    /// Respuestas capturadas aguas arriba (id de campo -> valor); opacas
    /// para el core.
    pub inputs: serde_json::Map<String, serde_json::Value>,
    pub steps: Vec<RunStep>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deliverable: Option<Deliverable>,
    pub last_updated: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl WorkflowRun {
    /// Crea un run nuevo en `Initializing`, sin pasos ni entregable.
    pub fn initializing(workflow_id: impl Into<String>,
                        run_by: impl Into<String>,
                        inputs: serde_json::Map<String, serde_json::Value>)
                        -> Self {
        let now = Utc::now();
        Self { id: Uuid::new_v4(),
               workflow_id: workflow_id.into(),
               run_by: run_by.into(),
               created_at: now,
               status: RunStatus::Initializing,
               inputs,
               steps: Vec::new(),
               deliverable: None,
               last_updated: now,
               completed_at: None }
    }
}

/// Vínculo many-to-many entre un run y un documento del vault.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunDocumentAssociation {
    pub run_id: Uuid,
    pub document_id: Uuid,
    /// Proyecto de origen cuando el documento entró como miembro de un
    /// proyecto.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_forward_edges_are_legal() {
        use RunStatus::*;
        assert!(Initializing.can_advance_to(Running));
        assert!(Running.can_advance_to(Completed));
        assert!(Running.can_advance_to(Failed));
        assert!(Initializing.can_advance_to(Failed));
        assert!(!Running.can_advance_to(Initializing));
        assert!(!Initializing.can_advance_to(Completed));
        for terminal in [Completed, Failed] {
            for next in [Initializing, Running, Completed, Failed] {
                assert!(!terminal.can_advance_to(next), "{terminal} -> {next} must be rejected");
            }
        }
    }

    #[test]
    fn legal_edges_never_decrease_rank() {
        use RunStatus::*;
        let all = [Initializing, Running, Completed, Failed];
        for from in all {
            for to in all {
                if from.can_advance_to(to) {
                    assert!(to.rank() > from.rank());
                }
            }
        }
    }

    #[test]
    fn status_round_trips_through_text() {
        for s in [RunStatus::Initializing, RunStatus::Running, RunStatus::Completed, RunStatus::Failed] {
            assert_eq!(s.as_str().parse::<RunStatus>().unwrap(), s);
            assert_eq!(serde_json::to_value(s).unwrap(), serde_json::json!(s.as_str()));
        }
        assert!("paused".parse::<RunStatus>().is_err());
    }

    #[test]
    fn new_run_starts_initializing_and_empty() {
        let run = WorkflowRun::initializing("wf-1040", "advisor@firm", serde_json::Map::new());
        assert_eq!(run.status, RunStatus::Initializing);
        assert!(run.steps.is_empty());
        assert!(run.deliverable.is_none());
        assert_eq!(run.created_at, run.last_updated);
        let json = serde_json::to_value(&run).unwrap();
        assert_eq!(json["workflowId"], "wf-1040");
        assert!(json.get("deliverable").is_none());
    }
}
