//! Error types used by the supervisor.
//!
//! - [`SupervisorError`]: failures of the command surface (`start`, `restart`, ...).
//! - [`ShutdownError`]: failures of a `stop` step; logged, never returned to the caller.
//! - [`ClientError`]: failures of the node API capability.
//!
//! Node-reported faults are not errors of the supervisor; they are
//! [`NodeError`](crate::NodeError) values flowing through the escalator.
//!
//! All enums provide `as_label` (stable snake_case label for logs).

use std::path::PathBuf;

use thiserror::Error;

use crate::escalation::NodeError;

/// # Errors of the node API capability.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ClientError {
    /// No connection to the node API (not connected or connection refused).
    #[error("node api unavailable")]
    Unavailable,

    /// The node answered with an error.
    #[error("node api call failed: {message}")]
    Rpc {
        /// The underlying error message.
        message: String,
    },

    /// An endpoint string could not be parsed.
    #[error("invalid node api endpoint '{input}': {reason}")]
    Endpoint { input: String, reason: String },
}

impl ClientError {
    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use nodevisor::ClientError;
    ///
    /// assert_eq!(ClientError::Unavailable.as_label(), "client_unavailable");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            ClientError::Unavailable => "client_unavailable",
            ClientError::Rpc { .. } => "client_rpc",
            ClientError::Endpoint { .. } => "client_endpoint",
        }
    }
}

/// # Errors produced by the supervisor's command surface.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum SupervisorError {
    /// `start` was called while a node process is running.
    #[error("node is already running (pid {pid})")]
    AlreadyRunning { pid: u32 },

    /// The node executable could not be started.
    #[error("failed to spawn {program:?}: {source}")]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The node log file could not be opened for append.
    #[error("failed to open node log {path:?}: {source}")]
    LogFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The client could not be pointed at the node API.
    #[error("failed to connect to node api: {0}")]
    Connect(#[source] ClientError),

    /// The node never answered within the responsiveness budget.
    #[error("node did not respond after {attempts} attempts")]
    Unresponsive { attempts: u32 },

    /// `restart` stopped the node but could not start it again.
    #[error("restart failed: {error}")]
    RestartFailed { error: NodeError },

    /// A node API call failed after its retries.
    #[error(transparent)]
    Client(#[from] ClientError),
}

impl SupervisorError {
    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use nodevisor::SupervisorError;
    ///
    /// let err = SupervisorError::Unresponsive { attempts: 15 };
    /// assert_eq!(err.as_label(), "supervisor_unresponsive");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            SupervisorError::AlreadyRunning { .. } => "supervisor_already_running",
            SupervisorError::Spawn { .. } => "supervisor_spawn",
            SupervisorError::LogFile { .. } => "supervisor_log_file",
            SupervisorError::Connect(_) => "supervisor_connect",
            SupervisorError::Unresponsive { .. } => "supervisor_unresponsive",
            SupervisorError::RestartFailed { .. } => "supervisor_restart_failed",
            SupervisorError::Client(_) => "supervisor_client",
        }
    }

    /// The fatal node error carried by [`SupervisorError::RestartFailed`].
    pub fn node_error(&self) -> Option<&NodeError> {
        match self {
            SupervisorError::RestartFailed { error } => Some(error),
            _ => None,
        }
    }
}

/// # Failures of one `stop` step.
///
/// `stop` is best-effort: these are logged and swallowed.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ShutdownError {
    /// The graceful shutdown request failed.
    #[error("shutdown request failed: {0}")]
    Rpc(#[source] ClientError),

    /// Delivering a termination signal failed.
    #[error("failed to send {stage} to pid {pid}: {source}")]
    Signal {
        stage: &'static str,
        pid: u32,
        #[source]
        source: std::io::Error,
    },
}

impl ShutdownError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            ShutdownError::Rpc(_) => "shutdown_rpc",
            ShutdownError::Signal { .. } => "shutdown_signal",
        }
    }
}
