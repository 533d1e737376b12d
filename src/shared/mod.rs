//! Shared infrastructure between the engine thread and its consumers.

pub mod commands;
pub mod engine_thread;
pub mod snapshot;

pub use commands::{EngineCommand, EngineState};
pub use engine_thread::EngineHandle;
pub use snapshot::NetSnapshot;
