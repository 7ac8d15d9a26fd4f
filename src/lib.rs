//! # nodevisor
//!
//! **Nodevisor** supervises a long-running blockchain full node on behalf of a
//! host application. It spawns the node, waits until its API answers, forwards
//! its status, and turns the noise of node errors and process exits into at
//! most one fatal notification per process generation.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!            host (UI / daemon)
//!       commands │        ▲ Notify: on_status / on_fatal_error / on_ready
//!                ▼        │
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Supervisor                                                       │
//! │  - ProcessController (spawn, exit watching, staged stop)          │
//! │  - NodeClient        (echo, status, streams, shutdown)            │
//! │  - DebouncePool      (100ms quiet window)                         │
//! │  - Escalator         (decision table + fatal latch)               │
//! └──────┬──────────────────┬───────────────────┬─────────────────────┘
//!        │ exit             │ error_stream      │ status_stream Err
//!        ▼                  ▼                   ▼
//!     ┌─────────────────────────────────────────────┐
//!     │ DebouncePool ──► Batch ──► Escalator        │
//!     │   latched? drop                             │
//!     │   exit?    clean → nothing, else FATAL      │
//!     │   errors:  most severe                      │
//!     │            < Critical → probe → log / FATAL │
//!     │            ≥ Critical → latch + notify      │
//!     └─────────────────────────────────────────────┘
//!
//! Every component publishes lifecycle Events:
//!   ── publish ──► Bus ──► listener ──► SubscriberSet ──► Subscribe::on_event
//!                                            └──► LogWriter (tracing)
//! ```
//!
//! ### Lifecycle
//! ```text
//! start():  spawn (generation g, latch open) ─► connect ─► echo × 16 ─► status
//!           ─► status/error streams ─► on_ready
//! stop():   cancel streams ─► shutdown RPC ─► wait 20s ─► SIGINT ─► wait 20s ─► kill
//! restart(): stop ─► start; failure ─► RestartFailed(FATAL)
//! ```
//!
//! ## Features
//! | Area              | Description                                              | Key types / traits                        |
//! |-------------------|----------------------------------------------------------|-------------------------------------------|
//! | **Supervision**   | Node process lifecycle and command surface.              | [`Supervisor`], [`ProcessController`]     |
//! | **Escalation**    | Severity-ordered faults, at most one notification.       | [`Escalator`], [`NodeError`], [`Severity`]|
//! | **Batching**      | Debounced batching of bursty events.                     | [`DebouncePool`], [`Reduce`]              |
//! | **Node API**      | Capability the supervisor drives; endpoint parsing.      | [`NodeClient`], [`Endpoint`]              |
//! | **Host callbacks**| What the host must act on.                               | [`Notify`]                                |
//! | **Subscriber API**| Observe every lifecycle event.                           | [`Subscribe`], [`LogWriter`]              |
//! | **Policies**      | Bounded retries with a fixed delay between attempts.     | [`RetryPolicy`]                           |
//! | **Configuration** | Explicit settings value.                                 | [`Config`], [`NodeCommand`]               |
//! | **Errors**        | Typed errors of the command surface.                     | [`SupervisorError`], [`ClientError`]      |
//!
//! ## Example
//! ```rust,no_run
//! use std::sync::Arc;
//! use nodevisor::{Config, LogWriter, NodeClient, NodeCommand, Notify, Supervisor};
//!
//! async fn run(client: Arc<dyn NodeClient>, ui: Arc<dyn Notify>) -> Result<(), Box<dyn std::error::Error>> {
//!     let cfg = Config {
//!         node: NodeCommand::local("/opt/app/node", "/home/me/node-config.json", "/home/me/node-data"),
//!         log_dir: "/home/me".into(),
//!         network_id: "7".into(),
//!         ..Config::default()
//!     };
//!
//!     let sup = Supervisor::builder(cfg, client, ui)
//!         .with_subscribers(vec![Arc::new(LogWriter::new())])
//!         .build();
//!
//!     if !sup.start().await? {
//!         eprintln!("node did not come up");
//!     }
//!     sup.shutdown().await;
//!     Ok(())
//! }
//! ```
mod client;
mod core;
mod error;
mod escalation;
mod events;
mod notify;
mod policies;
mod pool;
mod process;
mod subscribers;

#[cfg(test)]
mod testing;

// ---- Public re-exports ----

pub use client::{Endpoint, ErrorStream, NodeClient, NodeStatus, Scheme, StatusStream, VersionInfo};
pub use crate::core::{Config, Supervisor, SupervisorBuilder};
pub use error::{ClientError, ShutdownError, SupervisorError};
pub use escalation::{Escalator, ExitEvent, NodeError, PoolEvent, Severity};
pub use events::{Bus, Event, EventKind};
pub use notify::Notify;
pub use policies::RetryPolicy;
pub use pool::{Batch, DebouncePool, Reduce, ReduceFn};
pub use process::{GenerationHook, NODE_EXECUTABLE, NodeCommand, ProcessController, Spawned, Stage};
pub use subscribers::{LogWriter, Subscribe, SubscriberSet};
