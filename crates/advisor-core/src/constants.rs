//! Constantes del núcleo de ejecución.
//!
//! Valores estáticos compartidos por el manager, el planner por defecto y las
//! capas de persistencia. Cambiar `DELIVERABLE_TITLE_SUFFIX` altera el título
//! visible del entregable de todas las ejecuciones nuevas.

/// Sufijo que se añade al título del workflow para formar el título del
/// entregable (`"<workflowTitle> - Results"`).
pub const DELIVERABLE_TITLE_SUFFIX: &str = " - Results";

/// Límite superior de recomendaciones que el sintetizador copia al entregable.
pub const MAX_RECOMMENDATIONS: usize = 8;
