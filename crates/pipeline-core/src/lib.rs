//! Core library for the dealer/worker/farmer/outputter analysis pipeline:
//! the on-disk record format, the wire message format, the role-to-role
//! transport, the trigger reorder buffer, the tree-parameter event model,
//! the four role loops, and the job driver that wires them together.

pub mod error;
pub mod job;
pub mod message;
pub mod record;
pub mod reorder;
pub mod roles;
pub mod transport;
pub mod tree;
pub mod workflow;

pub use error::{PipelineError, Role};
pub use job::{JobConfig, WorkerLogic};
