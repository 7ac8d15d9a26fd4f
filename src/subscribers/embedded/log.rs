//! # LogWriter: events rendered through `tracing`
//!
//! A subscriber that turns every [`Event`] into one `tracing` record with
//! structured fields. Install any `tracing` subscriber to see them.
//!
//! ## Example output (fmt subscriber)
//! ```text
//! INFO  node spawned generation=1 pid=4242
//! INFO  node ready generation=1 attempt=3
//! WARN  node exited generation=1 pid=4242 exit_code=Some(2) signal=None
//! ERROR fatal latched generation=1 severity=Some(Fatal) reason=process unexpectedly quit
//! ```

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Event writer subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let generation = e.generation.unwrap_or_default();
        let reason = e.reason.as_deref().unwrap_or("");
        match e.kind {
            EventKind::NodeSpawned => info!(generation, pid = ?e.pid, "node spawned"),
            EventKind::SpawnFailed => error!(%reason, "node spawn failed"),
            EventKind::NodeExited => warn!(
                generation,
                pid = ?e.pid,
                exit_code = ?e.exit_code,
                signal = ?e.signal,
                "node exited"
            ),
            EventKind::StopRequested => info!(generation, pid = ?e.pid, "stop requested"),
            EventKind::InterruptSent => warn!(generation, pid = ?e.pid, "interrupt sent"),
            EventKind::KillSent => warn!(generation, pid = ?e.pid, "kill sent"),
            EventKind::NodeStopped => info!(generation, pid = ?e.pid, %reason, "node stopped"),
            EventKind::NodeReady => info!(generation, attempt = ?e.attempt, "node ready"),
            EventKind::NodeUnresponsive => {
                error!(generation, attempts = ?e.attempt, "node unresponsive")
            }
            EventKind::RemoteConnected => info!(endpoint = %reason, "remote node connected"),
            EventKind::ErrorLogged => {
                info!(generation, severity = ?e.severity, %reason, "node error (alive)")
            }
            EventKind::ErrorEscalated => {
                warn!(generation, severity = ?e.severity, %reason, "node error escalated")
            }
            EventKind::FatalLatched => {
                error!(generation, severity = ?e.severity, %reason, "fatal latched")
            }
            EventKind::ErrorSuppressed => {
                debug!(generation, dropped = ?e.attempt, "errors suppressed")
            }
            EventKind::SubscriberOverflow => warn!(%reason, "subscriber overflow"),
            EventKind::SubscriberPanicked => error!(%reason, "subscriber panicked"),
        }
    }

    fn name(&self) -> &'static str {
        "log-writer"
    }
}
