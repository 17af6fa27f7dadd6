//! Builder para `RunLifecycleManager`.
//!
//! Los stores son obligatorios; narrador, planner y deadline por paso tienen
//! valores por defecto (`PlainNarrator`, `StandardPlanner`, sin deadline).
//!
//! ```ignore
//! let manager = RunLifecycleManager::builder(store, sink)
//!     .narrator(Arc::new(TemplateNarrator::default()))
//!     .step_deadline(Duration::from_secs(30))
//!     .build();
//! ```
use std::sync::Arc;
use std::time::Duration;

use crate::engine::RunLifecycleManager;
use crate::step::{PlainNarrator, StandardPlanner, StepNarrator, StepPlanner};
use crate::store::{DocumentSink, RunStore};

pub struct LifecycleBuilder {
    store: Arc<dyn RunStore>,
    sink: Arc<dyn DocumentSink>,
    narrator: Option<Arc<dyn StepNarrator>>,
    planner: Option<Arc<dyn StepPlanner>>,
    step_deadline: Option<Duration>,
}

impl LifecycleBuilder {
    pub(crate) fn new(store: Arc<dyn RunStore>, sink: Arc<dyn DocumentSink>) -> Self {
        Self { store,
               sink,
               narrator: None,
               planner: None,
               step_deadline: None }
    }

    #[inline]
    pub fn narrator(mut self, narrator: Arc<dyn StepNarrator>) -> Self {
        self.narrator = Some(narrator);
        self
    }

    #[inline]
    pub fn planner(mut self, planner: Arc<dyn StepPlanner>) -> Self {
        self.planner = Some(planner);
        self
    }

    /// Tiempo máximo de narración por paso. Un paso que lo excede falla el run.
    #[inline]
    pub fn step_deadline(mut self, deadline: Duration) -> Self {
        self.step_deadline = Some(deadline);
        self
    }

    pub fn build(self) -> RunLifecycleManager {
        RunLifecycleManager { store: self.store,
                              sink: self.sink,
                              narrator: self.narrator.unwrap_or_else(|| Arc::new(PlainNarrator)),
                              planner: self.planner.unwrap_or_else(|| Arc::new(StandardPlanner)),
                              step_deadline: self.step_deadline }
    }
}
