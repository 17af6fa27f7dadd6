use advisor_core::{ExecuteOutcome, ExecuteRequest, RunStatus, RunSubmission, UploadedFile, WorkflowRun};
use advisor_domain::SelectionSession;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Deserialize;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use super::AppState;
use crate::errors::ApiError;

/// Archivo subido junto con la creación del run.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadBody {
    pub name: String,
    pub content_base64: String,
    #[serde(default)]
    pub content_type: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRunBody {
    pub workflow_id: String,
    pub run_by: String,
    #[serde(default)]
    pub inputs: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub vault_document_ids: Vec<Uuid>,
    #[serde(default)]
    pub uploads: Vec<UploadBody>,
}

fn decode_upload(body: UploadBody) -> Result<UploadedFile, ApiError> {
    let name = body.name.trim().to_string();
    if name.is_empty() {
        return Err(ApiError::BadRequest("upload without a file name".into()));
    }
    let bytes = STANDARD.decode(body.content_base64.as_bytes())
                        .map_err(|e| ApiError::BadRequest(format!("upload '{name}' is not valid base64: {e}")))?;
    let file = UploadedFile::new(name, bytes);
    Ok(match body.content_type {
           Some(ct) => file.with_content_type(ct),
           None => file,
       })
}

/// POST /workflow/runs
pub(super) async fn create_run(State(state): State<AppState>, Json(body): Json<CreateRunBody>) -> Result<Response, ApiError> {
    let uploads = body.uploads
                      .into_iter()
                      .map(decode_upload)
                      .collect::<Result<Vec<_>, _>>()?;

    let mut session = SelectionSession::new(state.notifier.clone());
    session.upload(uploads);
    if !body.vault_document_ids.is_empty() {
        session.import(state.vault.as_ref(), &body.vault_document_ids).await?;
    }

    let init = state.manager
                    .initialize(RunSubmission { workflow_id: body.workflow_id,
                                                run_by: body.run_by,
                                                inputs: body.inputs,
                                                documents: session.payload() })
                    .await?;
    info!(run_id = %init.run.id, documents = init.associations.len(), "run created");
    Ok((StatusCode::CREATED,
        Json(json!({ "success": true,
                     "runId": init.run.id,
                     "status": init.run.status,
                     "documents": init.documents }))).into_response())
}

fn completed_body(run: &WorkflowRun) -> Response {
    (StatusCode::OK,
     Json(json!({ "success": true,
                  "runId": run.id,
                  "steps": run.steps,
                  "deliverable": run.deliverable }))).into_response()
}

/// POST /workflow/execute
pub(super) async fn execute_run(State(state): State<AppState>, Json(request): Json<ExecuteRequest>) -> Result<Response, ApiError> {
    match state.manager.execute(&request).await? {
        ExecuteOutcome::Completed(run) => Ok(completed_body(&run)),
        // Llamada redundante: se repite el resultado guardado, nunca se re-ejecuta.
        ExecuteOutcome::Skipped(run) if run.status == RunStatus::Completed => Ok(completed_body(&run)),
        ExecuteOutcome::Skipped(run) => Err(ApiError::Conflict(format!("run {} is already {}", run.id, run.status))),
    }
}

/// GET /workflow/runs/:id
pub(super) async fn get_run(State(state): State<AppState>, Path(run_id): Path<Uuid>) -> Result<Response, ApiError> {
    let view = state.manager.load(run_id).await?;
    Ok(Json(json!({ "run": view.run, "documents": view.associations })).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uploads_are_decoded_with_content_type() {
        let file = decode_upload(UploadBody { name: " W9.pdf ".into(),
                                              content_base64: STANDARD.encode(b"%PDF"),
                                              content_type: Some("application/pdf".into()) }).unwrap();
        assert_eq!(file.name, "W9.pdf");
        assert_eq!(file.bytes, b"%PDF");
        assert_eq!(file.content_type.as_deref(), Some("application/pdf"));
    }

    #[test]
    fn bad_uploads_are_rejected() {
        let err = decode_upload(UploadBody { name: "x.pdf".into(),
                                             content_base64: "@@not-base64@@".into(),
                                             content_type: None }).unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
        let err = decode_upload(UploadBody { name: "  ".into(),
                                             content_base64: String::new(),
                                             content_type: None }).unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
    }
}
