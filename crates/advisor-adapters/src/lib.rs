//! advisor-adapters: piezas concretas que el core consume por trait.
//!
//! - `TemplateNarrator`: narrador determinista que construye el `reasoning`
//!   de cada paso a partir del contexto (documentos, respuestas, pasos
//!   previos).
//! - `CatalogPlanner`: planes por workflow para los servicios de asesoría
//!   fiscal, con `StandardPlanner` como respaldo.
//! - `LogNotifier`: canal de notificaciones que escribe en el log.

pub mod narrator;
pub mod notifier;
pub mod planner;

pub use narrator::TemplateNarrator;
pub use notifier::LogNotifier;
pub use planner::CatalogPlanner;
