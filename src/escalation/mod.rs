//! Fault escalation: from node errors and process exits to one host notification.
//!
//! - [`NodeError`] / [`Severity`] the escalation currency
//! - [`PoolEvent`] / [`ExitEvent`] what the fault pipeline carries
//! - [`Escalator`] the pipeline's reducer and the fatal latch

mod decision;
mod escalator;
mod fault;
mod node_error;

pub use escalator::Escalator;
pub use fault::{ExitEvent, PoolEvent};
pub use node_error::{NodeError, Severity};
