//! # Escalation decision table.
//!
//! ```text
//! severity   │ probe     │ action
//! ───────────┼───────────┼──────────
//! ≥ Critical │ any       │ Notify
//! < Critical │ not run   │ Probe
//! < Critical │ alive     │ LogOnly
//! < Critical │ dead      │ Escalate  (re-decide once as Fatal → Notify)
//! ```
//!
//! The escalator walks this table at most three times per error (probe,
//! escalate, notify), so a decision always terminates.

use super::node_error::Severity;

/// Outcome of the liveness probe, as far as the table is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Probe {
    NotRun,
    Alive,
    Dead,
}

impl From<bool> for Probe {
    fn from(alive: bool) -> Self {
        if alive { Probe::Alive } else { Probe::Dead }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Action {
    /// Run the liveness probe, then decide again.
    Probe,
    /// Informational only.
    LogOnly,
    /// Raise to Fatal, then decide again.
    Escalate,
    /// Flip the latch and notify the collaborator.
    Notify,
}

pub(crate) fn decide(severity: Severity, probe: Probe) -> Action {
    match (severity.is_critical(), probe) {
        (true, _) => Action::Notify,
        (false, Probe::NotRun) => Action::Probe,
        (false, Probe::Alive) => Action::LogOnly,
        (false, Probe::Dead) => Action::Escalate,
    }
}
