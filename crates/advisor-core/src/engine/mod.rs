//! Motor del ciclo de vida de runs: manager, builder y síntesis del
//! entregable.

pub mod builder;
pub mod core;
pub mod deliverable;

pub use builder::LifecycleBuilder;
pub use self::core::{ExecuteOutcome, InitializedRun, RunLifecycleManager, RunView};
pub use deliverable::{deliverable_title, synthesize_deliverable};
