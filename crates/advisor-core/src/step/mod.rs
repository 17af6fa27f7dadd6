//! Pasos de un workflow.
//!
//! Un run ejecuta los pasos de su `WorkflowPlan` en orden estricto; cada paso
//! se narra con un `StepNarrator` (servicio externo de generación de texto
//! tratado como caja negra) y queda registrado como `RunStep`.

pub mod definition;
mod status;

pub use definition::{NarrationError, PlainNarrator, StandardPlanner, StepContext, StepNarrator, StepPlanner, StepTemplate,
                     WorkflowPlan};
pub use status::StepStatus;
