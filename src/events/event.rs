//! # Lifecycle events emitted by the supervisor.
//!
//! The [`EventKind`] enum classifies what happened to the supervised node:
//! - **Process events**: spawn, exit, staged termination
//! - **Readiness events**: responsiveness wait outcome, remote connection
//! - **Escalation events**: what the escalator decided for a batch
//! - **Subscriber events**: overflow / panic of an observer
//!
//! The [`Event`] struct carries the metadata (generation, pid, exit code,
//! severity, reason) relevant to its kind.
//!
//! ## Ordering guarantees
//! Each event has a globally unique, monotonically increasing `seq`.
//!
//! ## Example
//! ```rust
//! use nodevisor::{Event, EventKind, Severity};
//!
//! let ev = Event::new(EventKind::FatalLatched)
//!     .with_generation(3)
//!     .with_severity(Severity::Fatal)
//!     .with_reason("process unexpectedly quit");
//!
//! assert_eq!(ev.kind, EventKind::FatalLatched);
//! assert_eq!(ev.generation, Some(3));
//! assert_eq!(ev.reason.as_deref(), Some("process unexpectedly quit"));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::SystemTime;

use crate::escalation::Severity;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of supervisor events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Subscriber events ===
    /// Subscriber panicked during event processing.
    ///
    /// Sets: `reason` (subscriber name + panic info).
    SubscriberPanicked,

    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets: `reason`.
    SubscriberOverflow,

    // === Process events ===
    /// A node process was spawned.
    ///
    /// Sets: `generation`, `pid`.
    NodeSpawned,

    /// Spawning the node process failed.
    ///
    /// Sets: `reason`.
    SpawnFailed,

    /// The node process exited on its own (not during `stop`).
    ///
    /// Sets: `generation`, `pid`, `exit_code` and/or `signal`.
    NodeExited,

    /// `stop` began for a running process.
    ///
    /// Sets: `generation`, `pid`.
    StopRequested,

    /// Graceful shutdown did not finish in time; interrupt signal sent.
    ///
    /// Sets: `generation`, `pid`.
    InterruptSent,

    /// Interrupt did not finish in time; kill signal sent.
    ///
    /// Sets: `generation`, `pid`.
    KillSent,

    /// `stop` finished and the handle was dropped.
    ///
    /// Sets: `generation`, `pid`, `reason` (`exited` or `abandoned`).
    NodeStopped,

    // === Readiness events ===
    /// The node answered the responsiveness probe.
    ///
    /// Sets: `generation`, `attempt` (1-based attempt that succeeded).
    NodeReady,

    /// The node never answered within the responsiveness budget.
    ///
    /// Sets: `generation`, `attempt` (budget).
    NodeUnresponsive,

    /// The client was pointed at an externally managed node.
    ///
    /// Sets: `reason` (endpoint).
    RemoteConnected,

    // === Escalation events ===
    /// A low-severity error was seen while the node answered the probe.
    ///
    /// Sets: `generation`, `severity`, `reason`.
    ErrorLogged,

    /// A low-severity error was escalated to fatal (node did not answer).
    ///
    /// Sets: `generation`, `severity` (original), `reason`.
    ErrorEscalated,

    /// The fatal latch flipped and the collaborator was notified.
    ///
    /// Sets: `generation`, `severity`, `reason`.
    FatalLatched,

    /// A batch was dropped because the latch was already set.
    ///
    /// Sets: `generation`, `attempt` (number of dropped items).
    ErrorSuppressed,
}

/// Supervisor event with optional metadata.
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Process generation this event belongs to.
    pub generation: Option<u64>,
    /// OS process id.
    pub pid: Option<u32>,
    /// Attempt number or a count, depending on the kind.
    pub attempt: Option<u32>,
    /// Exit code of the node process.
    pub exit_code: Option<i32>,
    /// Name of the signal that terminated the node process.
    pub signal: Option<Arc<str>>,
    /// Severity of the error the event is about.
    pub severity: Option<Severity>,
    /// Human-readable reason.
    pub reason: Option<Arc<str>>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            generation: None,
            pid: None,
            attempt: None,
            exit_code: None,
            signal: None,
            severity: None,
            reason: None,
        }
    }

    #[inline]
    pub fn with_generation(mut self, generation: u64) -> Self {
        self.generation = Some(generation);
        self
    }

    #[inline]
    pub fn with_pid(mut self, pid: u32) -> Self {
        self.pid = Some(pid);
        self
    }

    #[inline]
    pub fn with_attempt(mut self, n: u32) -> Self {
        self.attempt = Some(n);
        self
    }

    /// Attaches exit code and signal (either may be absent).
    #[inline]
    pub fn with_exit(mut self, code: Option<i32>, signal: Option<&str>) -> Self {
        self.exit_code = code;
        self.signal = signal.map(Arc::from);
        self
    }

    #[inline]
    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = Some(severity);
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_reason(format!("subscriber={subscriber} reason={reason}"))
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_reason(format!("subscriber={subscriber} info={info}"))
    }
}
