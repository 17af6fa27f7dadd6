//! Almacenamiento de runs: traits y backend en memoria.

mod memory;
mod types;

pub use memory::{InMemoryRunStore, InMemoryUploadSink};
pub use types::{DocumentSink, RunStore};
