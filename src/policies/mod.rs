//! Retry policies.
//!
//! Every wait in the supervisor is a bounded loop with a fixed delay; this
//! module holds the knobs that bound them.
//!
//! ## Quick wiring
//! ```text
//! Config { ready, probe, status_retry: RetryPolicy }
//!      ├─► Supervisor::try_start  ── ready.poll(echo)
//!      ├─► Escalator::probe       ── probe.poll(echo)
//!      └─► Supervisor::status     ── status_retry.run(client.status)
//! ```

mod retry;

pub use retry::RetryPolicy;
