//! CatalogPlanner: planes por id de workflow.

use std::collections::HashMap;

use advisor_core::{ExecuteRequest, StandardPlanner, StepPlanner, StepTemplate, WorkflowPlan};

/// Planner con un catálogo `workflow_id -> pasos`. Los workflows que no están
/// en el catálogo usan `StandardPlanner`.
#[derive(Debug, Clone, Default)]
pub struct CatalogPlanner {
    plans: HashMap<String, Vec<StepTemplate>>,
}

impl CatalogPlanner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_plan(mut self, workflow_id: impl Into<String>, steps: Vec<StepTemplate>) -> Self {
        self.plans.insert(workflow_id.into(), steps);
        self
    }

    /// Catálogo de los servicios de asesoría fiscal habituales.
    pub fn tax_advisory() -> Self {
        Self::new().with_plan("tax-return-review",
                              vec![StepTemplate::new("document-review",
                                                     "Document Review",
                                                     "Check that every income and deduction form is present"),
                                   StepTemplate::new("input-analysis",
                                                     "Input Analysis",
                                                     "Reconcile questionnaire answers with the documents"),
                                   StepTemplate::new("deliverable-preparation",
                                                     "Deliverable Preparation",
                                                     "Draft the return review memo"),])
                   .with_plan("tax-planning",
                              vec![StepTemplate::new("input-analysis",
                                                     "Input Analysis",
                                                     "Project income and withholding for the year"),
                                   StepTemplate::new("document-review",
                                                     "Document Review",
                                                     "Compare against prior-year returns"),
                                   StepTemplate::new("deliverable-preparation",
                                                     "Deliverable Preparation",
                                                     "Summarize planning opportunities"),])
                   .with_plan("entity-formation",
                              vec![StepTemplate::new("input-analysis",
                                                     "Input Analysis",
                                                     "Review ownership and revenue answers"),
                                   StepTemplate::new("deliverable-preparation",
                                                     "Deliverable Preparation",
                                                     "Recommend an entity structure"),])
    }

    pub fn knows(&self, workflow_id: &str) -> bool {
        self.plans.contains_key(workflow_id)
    }
}

impl StepPlanner for CatalogPlanner {
    fn plan(&self, request: &ExecuteRequest) -> WorkflowPlan {
        match self.plans.get(&request.workflow_id) {
            Some(steps) => WorkflowPlan::new(steps.clone()),
            None => StandardPlanner.plan(request),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn request(workflow_id: &str) -> ExecuteRequest {
        ExecuteRequest { run_id: Uuid::new_v4(),
                         workflow_id: workflow_id.into(),
                         workflow_title: "T".into(),
                         workflow_description: String::new(),
                         inputs: serde_json::Map::new(),
                         documents: None }
    }

    #[test]
    fn catalog_plans_take_precedence() {
        let planner = CatalogPlanner::tax_advisory();
        let plan = planner.plan(&request("entity-formation"));
        assert_eq!(plan.len(), 2);
        assert_eq!(plan.steps[0].id, "input-analysis");
    }

    #[test]
    fn unknown_workflows_use_the_standard_plan() {
        let planner = CatalogPlanner::tax_advisory();
        assert!(!planner.knows("bookkeeping"));
        let plan = planner.plan(&request("bookkeeping"));
        assert_eq!(plan.steps.iter().map(|s| s.id.as_str()).collect::<Vec<_>>(),
                   vec!["document-review", "input-analysis", "deliverable-preparation"]);
    }
}
