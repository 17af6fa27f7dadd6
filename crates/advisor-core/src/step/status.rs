use serde::{Deserialize, Serialize};

/// Estado de un paso dentro de un run.
///
/// Transiciones: `Pending` -> `Running` -> `Completed` | `Failed`. Los pasos
/// persistidos de un run completado están todos en `Completed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    /// El paso está pendiente de ejecución.
    Pending,
    /// El paso está en ejecución.
    Running,
    /// El paso finalizó correctamente.
    Completed,
    /// El paso falló.
    Failed,
}
