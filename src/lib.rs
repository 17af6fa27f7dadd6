//! advisorflow: servidor HTTP del back office.
//!
//! - `api`: rutas axum de creación, ejecución y consulta de runs.
//! - `config`: configuración del proceso desde el entorno.
//! - `errors`: errores de configuración y de la capa HTTP.
//! - `watchdog`: barrido periódico de runs colgados.

pub mod api;
pub mod config;
pub mod errors;
pub mod watchdog;

use std::sync::Arc;

use advisor_adapters::{CatalogPlanner, TemplateNarrator};
use advisor_core::{DocumentSink, RunLifecycleManager, RunStore};

pub use api::{router, AppState};
pub use config::AppConfig;

/// Manager con la narración por plantillas y el catálogo de workflows.
pub fn build_manager(store: Arc<dyn RunStore>, sink: Arc<dyn DocumentSink>, config: &AppConfig) -> RunLifecycleManager {
    let builder = RunLifecycleManager::builder(store, sink).narrator(Arc::new(TemplateNarrator::default()))
                                                           .planner(Arc::new(CatalogPlanner::tax_advisory()));
    match config.step_deadline {
        Some(deadline) => builder.step_deadline(deadline).build(),
        None => builder.build(),
    }
}
