//! # Severity-tagged node errors.
//!
//! [`NodeError`] is the escalation currency: everything the node reports on
//! its error streams, and every crash the process controller observes, ends
//! up as one. [`Severity`] is totally ordered; [`Severity::Critical`] is the
//! notification threshold.

use std::fmt;

/// Ordered severity of a [`NodeError`].
///
/// `Info < Warning < Error < Critical < Fatal`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Info,
    Warning,
    Error,
    Critical,
    Fatal,
}

impl Severity {
    /// Lowest severity that is surfaced to the collaborator without a liveness check.
    pub const THRESHOLD: Severity = Severity::Critical;

    /// True if this severity is surfaced without a liveness check.
    #[inline]
    pub fn is_critical(self) -> bool {
        self >= Self::THRESHOLD
    }

    /// Short stable label.
    pub fn as_label(self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Critical => "critical",
            Severity::Fatal => "fatal",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_label())
    }
}

/// Error reported by (or about) the supervised node.
///
/// Immutable once built; [`NodeError::escalated`] returns a new value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeError {
    message: String,
    stack_trace: String,
    severity: Severity,
    module: String,
}

impl NodeError {
    pub fn new(severity: Severity, module: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stack_trace: String::new(),
            severity,
            module: module.into(),
        }
    }

    /// Attaches a stack trace (or any diagnostic context).
    #[must_use]
    pub fn with_stack_trace(mut self, trace: impl Into<String>) -> Self {
        self.stack_trace = trace.into();
        self
    }

    /// The synthetic error used when the node process dies unexpectedly.
    pub fn crash(cause: Option<&dyn std::error::Error>) -> Self {
        let err = Self::new(
            Severity::Fatal,
            "supervisor",
            "The node software has unexpectedly quit. Restart the node to start it again.",
        );
        match cause {
            Some(cause) => err.with_stack_trace(cause.to_string()),
            None => err,
        }
    }

    /// Same error, raised to [`Severity::Fatal`].
    #[must_use]
    pub fn escalated(&self) -> Self {
        Self {
            severity: Severity::Fatal,
            ..self.clone()
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn stack_trace(&self) -> &str {
        &self.stack_trace
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn module(&self) -> &str {
        &self.module
    }
}

impl fmt::Display for NodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.severity, self.module, self.message)
    }
}

impl std::error::Error for NodeError {}
