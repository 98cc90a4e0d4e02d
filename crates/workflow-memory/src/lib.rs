//! Batched, event-streaming workflow memory core for a pipeline execution backend.
//!
//! See `config`, `error`, `value`, `path`, `memory`, `event`, and `store` for
//! the individual components; `memory::WorkflowMemory` and `store::MemoryStore`
//! are the two public entry points the rest of a backend wires against.

pub mod config;
pub mod error;
pub mod event;
pub mod memory;
pub mod path;
pub mod store;
pub mod value;

pub use config::MemoryStoreConfig;
pub use error::{MemoryError, Result};
pub use event::{bus::EventBus, MemoryEvent, StatusTriple};
pub use memory::{ComponentDataTag, PipelineDataTag, Recipe, StatusFlag, WorkflowMemory};
pub use store::{DurableStore, MemoryStore};
pub use value::{Blob, Value};
