//! # Supervisor configuration.
//!
//! Provides [`Config`], the explicit settings value handed to
//! [`Supervisor::builder`](crate::Supervisor::builder). Nothing is read from
//! globals or the environment.
//!
//! ## Sentinel values
//! - `exit_poll = 0s` → clamped to 1ms (never busy-loops)
//! - `bus_capacity = 0` → clamped to 1
//! - retry `attempts = 0` → one call

use std::path::PathBuf;
use std::time::Duration;

use crate::client::Endpoint;
use crate::policies::RetryPolicy;
use crate::process::NodeCommand;

/// Configuration of one supervisor.
///
/// ## Field semantics
/// - `node`: how to launch the node process
/// - `log_dir`, `network_id`: node output goes to `<log_dir>/node-log-<network_id>.txt`
/// - `endpoint`: node API of the locally spawned process
/// - `debounce`: quiet period of the fault pipeline
/// - `ready`: responsiveness wait after spawn
/// - `probe`: liveness probe used by the escalator
/// - `status_retry`: initial / on-demand status fetch
/// - `exit_timeout`, `exit_poll`: per-stage budget and poll interval of `stop`
/// - `bus_capacity`: event bus ring buffer size
#[derive(Clone, Debug)]
pub struct Config {
    pub node: NodeCommand,

    /// Directory of the node log file; created on spawn if missing.
    pub log_dir: PathBuf,

    /// Network the node joins; part of the log file name.
    pub network_id: String,

    pub endpoint: Endpoint,

    /// Quiet period after which buffered faults are reduced.
    pub debounce: Duration,

    /// Responsiveness wait after spawn.
    ///
    /// The node may need a long time to open its API (database migrations,
    /// first sync). Default: 16 attempts, 5s apart (75s of waiting).
    pub ready: RetryPolicy,

    /// Liveness probe for errors below the notification threshold.
    pub probe: RetryPolicy,

    /// Status fetch right after start and on demand.
    pub status_retry: RetryPolicy,

    /// Budget for each waiting stage of `stop` (after the shutdown request and
    /// after the interrupt).
    pub exit_timeout: Duration,

    /// How often `stop` checks whether the process is gone.
    pub exit_poll: Duration,

    /// Capacity of the event bus broadcast channel.
    pub bus_capacity: usize,
}

impl Config {
    /// Log file of the spawned node.
    pub fn log_file(&self) -> PathBuf {
        self.log_dir
            .join(format!("node-log-{}.txt", self.network_id))
    }

    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }

    #[inline]
    pub fn exit_poll_clamped(&self) -> Duration {
        self.exit_poll.max(Duration::from_millis(1))
    }
}

impl Default for Config {
    /// Defaults tuned for a desktop-hosted node:
    ///
    /// - `debounce = 100ms`
    /// - `ready = 16 × 5s`
    /// - `probe = 4 × 200ms`
    /// - `status_retry = 6 × 200ms`
    /// - `exit_timeout = 20s`, `exit_poll = 1s`
    /// - `bus_capacity = 1024`
    fn default() -> Self {
        Self {
            node: NodeCommand::local("node", "node-config.json", "node-data"),
            log_dir: PathBuf::from("."),
            network_id: "0".to_string(),
            endpoint: Endpoint::local(),
            debounce: Duration::from_millis(100),
            ready: RetryPolicy::constant(16, Duration::from_secs(5)),
            probe: RetryPolicy::constant(4, Duration::from_millis(200)),
            status_retry: RetryPolicy::constant(6, Duration::from_millis(200)),
            exit_timeout: Duration::from_secs(20),
            exit_poll: Duration::from_secs(1),
            bus_capacity: 1024,
        }
    }
}
