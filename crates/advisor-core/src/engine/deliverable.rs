//! Síntesis del entregable a partir de la metadata del workflow y de los
//! pasos completados.
use crate::constants::{DELIVERABLE_TITLE_SUFFIX, MAX_RECOMMENDATIONS};
use crate::model::{Attachment, Deliverable, DocumentKind, ExecuteRequest, RunStep};

pub fn deliverable_title(workflow_title: &str) -> String {
    format!("{workflow_title}{DELIVERABLE_TITLE_SUFFIX}")
}

pub fn synthesize_deliverable(request: &ExecuteRequest, steps: &[RunStep]) -> Deliverable {
    let title = deliverable_title(&request.workflow_title);
    let documents = request.documents.as_deref().unwrap_or_default();

    let mut content = format!("# {title}\n");
    if !request.workflow_description.is_empty() {
        content.push_str(&format!("\n{}\n", request.workflow_description));
    }
    for step in steps {
        content.push_str(&format!("\n## {}\n\n{}\n", step.name, step.reasoning.as_deref().unwrap_or(&step.description)));
    }

    let project_count = documents.iter().filter(|d| d.kind == DocumentKind::Project).count();
    let file_count = documents.len() - project_count;
    let summary = format!("{} completed {} step(s) using {} file(s) and {} project folder(s).",
                          request.workflow_title,
                          steps.len(),
                          file_count,
                          project_count);

    let mut recommendations = Vec::new();
    if documents.is_empty() {
        recommendations.push("Attach supporting documents and run the workflow again".to_string());
    }
    if request.inputs.is_empty() {
        recommendations.push("Collect the outstanding questionnaire answers from the client".to_string());
    }
    for project in documents.iter().filter(|d| d.kind == DocumentKind::Project) {
        recommendations.push(format!("Confirm every document in '{}' belongs to this engagement", project.name));
    }
    recommendations.push("Review the findings with the client before filing".to_string());
    recommendations.truncate(MAX_RECOMMENDATIONS);

    let attachments = documents.iter()
                               .map(|d| match d.kind {
                                   DocumentKind::File => Attachment { name: d.name.clone(),
                                                                      kind: "file".into(),
                                                                      document_id: Some(d.id),
                                                                      project_id: None },
                                   DocumentKind::Project => Attachment { name: d.name.clone(),
                                                                         kind: "project".into(),
                                                                         document_id: None,
                                                                         project_id: Some(d.id) },
                               })
                               .collect();

    Deliverable { title,
                  content,
                  summary,
                  recommendations,
                  attachments }
}
