//! Contratos de entrada del ciclo de vida: la carga normalizada que produce
//! la selección de documentos (`SelectionPayload`), la solicitud de creación
//! (`RunSubmission`) y la solicitud de ejecución (`ExecuteRequest`).
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Archivo recién subido, todavía sin identificador de vault.
#[derive(Clone, PartialEq, Eq)]
pub struct UploadedFile {
    pub name: String,
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

impl UploadedFile {
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self { name: name.into(),
               bytes: bytes.into(),
               content_type: None }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

impl fmt::Debug for UploadedFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadedFile")
         .field("name", &self.name)
         .field("len", &self.bytes.len())
         .field("content_type", &self.content_type)
         .finish()
    }
}

/// Origen de un documento enviado con el run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentSource {
    /// Documento existente del vault.
    Vault(Uuid),
    /// Bytes subidos que se guardan en el vault al inicializar el run.
    Upload(UploadedFile),
}

/// Proyecto del vault del que procede un documento agrupado.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectRef {
    pub id: Uuid,
    pub name: String,
}

/// Entrada plana de la carga: documento suelto (`project == None`) o miembro
/// de un proyecto.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmittedDocument {
    pub source: DocumentSource,
    pub name: String,
    pub project: Option<ProjectRef>,
}

impl SubmittedDocument {
    pub fn is_grouped(&self) -> bool {
        self.project.is_some()
    }
}

/// Tipo de elemento en el resumen `documents` de la solicitud de ejecución.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    File,
    Project,
}

/// Resumen de un elemento seleccionado tal como viaja en `POST /workflow/execute`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecuteDocument {
    pub id: Uuid,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: DocumentKind,
}

/// Carga normalizada producida por la selección de documentos.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionPayload {
    pub documents: Vec<SubmittedDocument>,
}

impl SelectionPayload {
    pub fn new(documents: Vec<SubmittedDocument>) -> Self {
        Self { documents }
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn standalone(&self) -> impl Iterator<Item = &SubmittedDocument> {
        self.documents.iter().filter(|d| !d.is_grouped())
    }

    pub fn grouped(&self) -> impl Iterator<Item = &SubmittedDocument> {
        self.documents.iter().filter(|d| d.is_grouped())
    }

    /// Resumen para la solicitud de ejecución: una entrada por documento
    /// suelto y una por proyecto (en orden de primera aparición).
    ///
    /// Los uploads aún no tienen id de vault; se resumen con el id que les
    /// asigne `uploaded_ids` (en orden) o con un id nulo si no hay.
    pub fn execute_documents(&self, uploaded_ids: &[Uuid]) -> Vec<ExecuteDocument> {
        let mut out: Vec<ExecuteDocument> = Vec::new();
        let mut uploads = uploaded_ids.iter();
        for doc in &self.documents {
            match (&doc.project, &doc.source) {
                (Some(project), _) => {
                    if !out.iter().any(|e| e.kind == DocumentKind::Project && e.id == project.id) {
                        out.push(ExecuteDocument { id: project.id,
                                                   name: project.name.clone(),
                                                   kind: DocumentKind::Project });
                    }
                }
                (None, DocumentSource::Vault(id)) => out.push(ExecuteDocument { id: *id,
                                                                                name: doc.name.clone(),
                                                                                kind: DocumentKind::File }),
                (None, DocumentSource::Upload(_)) => {
                    let id = uploads.next().copied().unwrap_or_else(Uuid::nil);
                    out.push(ExecuteDocument { id,
                                               name: doc.name.clone(),
                                               kind: DocumentKind::File })
                }
            }
        }
        out
    }
}

/// Solicitud de creación de un run.
#[derive(Debug, Clone)]
pub struct RunSubmission {
    pub workflow_id: String,
    pub run_by: String,
    pub inputs: serde_json::Map<String, serde_json::Value>,
    pub documents: SelectionPayload,
}

/// Cuerpo de `POST /workflow/execute`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteRequest {
    pub run_id: Uuid,
    pub workflow_id: String,
    pub workflow_title: String,
    #[serde(default)]
    pub workflow_description: String,
    #[serde(default)]
    pub inputs: serde_json::Map<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub documents: Option<Vec<ExecuteDocument>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn grouped(doc: Uuid, name: &str, project: Uuid) -> SubmittedDocument {
        SubmittedDocument { source: DocumentSource::Vault(doc),
                            name: name.into(),
                            project: Some(ProjectRef { id: project,
                                                       name: "2024 Return".into() }) }
    }

    #[test]
    fn execute_documents_collapses_project_members() {
        let project = Uuid::new_v4();
        let loose = Uuid::new_v4();
        let payload = SelectionPayload::new(vec![grouped(Uuid::new_v4(), "1099.pdf", project),
                                                 SubmittedDocument { source: DocumentSource::Vault(loose),
                                                                     name: "W9.pdf".into(),
                                                                     project: None },
                                                 grouped(Uuid::new_v4(), "K1.pdf", project),]);
        let summary = payload.execute_documents(&[]);
        assert_eq!(summary.len(), 2);
        assert_eq!(summary[0].kind, DocumentKind::Project);
        assert_eq!(summary[0].id, project);
        assert_eq!(summary[1], ExecuteDocument { id: loose, name: "W9.pdf".into(), kind: DocumentKind::File });
        assert_eq!(payload.standalone().count(), 1);
        assert_eq!(payload.grouped().count(), 2);
    }

    #[test]
    fn execute_request_uses_wire_names() {
        let run_id = Uuid::new_v4();
        let body = json!({
            "runId": run_id,
            "workflowId": "wf-sched-c",
            "workflowTitle": "Schedule C Review",
            "workflowDescription": "Review self-employment income",
            "inputs": {"taxYear": 2024},
            "documents": [{"id": Uuid::nil(), "name": "Receipts", "type": "project"}]
        });
        let req: ExecuteRequest = serde_json::from_value(body).unwrap();
        assert_eq!(req.run_id, run_id);
        assert_eq!(req.documents.as_ref().unwrap()[0].kind, DocumentKind::Project);
        assert_eq!(req.inputs["taxYear"], json!(2024));
    }

    #[test]
    fn execute_request_documents_are_optional() {
        let req: ExecuteRequest = serde_json::from_value(json!({
            "runId": Uuid::new_v4(),
            "workflowId": "wf",
            "workflowTitle": "T"
        })).unwrap();
        assert!(req.documents.is_none());
        assert!(req.inputs.is_empty());
    }

    #[test]
    fn uploaded_file_debug_hides_bytes() {
        let f = UploadedFile::new("W2.pdf", vec![1u8; 2048]).with_content_type("application/pdf");
        let dbg = format!("{f:?}");
        assert!(dbg.contains("len: 2048"));
        assert!(!dbg.contains("[1, 1"));
    }
}
