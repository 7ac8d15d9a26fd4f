//! Node process lifecycle.
//!
//! - [`NodeCommand`] how the node is launched
//! - [`ProcessController`] spawn, exit watching, staged stop
//! - [`Stage`] termination stages of `stop`

mod command;
mod controller;

pub use command::{NODE_EXECUTABLE, NodeCommand};
pub use controller::{GenerationHook, ProcessController, Spawned, Stage};
