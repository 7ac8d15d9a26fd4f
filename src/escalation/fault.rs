//! Units of the fault pipeline: what the [`DebouncePool`](crate::DebouncePool)
//! batches and the [`Escalator`](super::Escalator) reduces.

use std::fmt;

use super::node_error::NodeError;

/// Confirmed exit of one node process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExitEvent {
    /// Generation of the process that exited.
    pub generation: u64,
    /// Exit code, absent when a signal ended the process.
    pub code: Option<i32>,
    /// Name of the terminating signal, if any.
    pub signal: Option<String>,
}

impl ExitEvent {
    /// Exit code 0 without a signal: an expected shutdown.
    pub fn is_clean(&self) -> bool {
        self.code == Some(0) && self.signal.is_none()
    }
}

impl fmt::Display for ExitEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.signal, self.code) {
            (Some(sig), _) => write!(f, "terminated by {sig}"),
            (None, Some(code)) => write!(f, "exit code {code}"),
            (None, None) => f.write_str("exit status unknown"),
        }
    }
}

/// One item in the fault pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PoolEvent {
    /// Error reported by the node or another collaborator.
    Error(NodeError),
    /// The node process exited on its own.
    Exit(ExitEvent),
}

impl From<NodeError> for PoolEvent {
    fn from(err: NodeError) -> Self {
        PoolEvent::Error(err)
    }
}

impl From<ExitEvent> for PoolEvent {
    fn from(exit: ExitEvent) -> Self {
        PoolEvent::Exit(exit)
    }
}
