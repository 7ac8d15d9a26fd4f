//! # Collaborator push surface.
//!
//! [`Notify`] is how the supervisor talks back to whoever hosts it (a UI, a
//! daemon). Unlike [`Subscribe`](crate::Subscribe), which observes every
//! lifecycle event, `Notify` only receives what the host must act on.
//!
//! ## Guarantees
//! - `on_fatal_error` is called at most once per process generation.
//! - `on_status` is called for every status the supervisor fetches or the node
//!   pushes on its status stream.
//!
//! ## Example
//! ```rust
//! use async_trait::async_trait;
//! use nodevisor::{NodeError, NodeStatus, Notify};
//!
//! struct Ui;
//!
//! #[async_trait]
//! impl Notify for Ui {
//!     async fn on_status(&self, status: &NodeStatus) {
//!         println!("peers: {}", status.connected_peers);
//!     }
//!
//!     async fn on_fatal_error(&self, err: &NodeError) {
//!         eprintln!("node failed: {err}");
//!     }
//! }
//! ```

use async_trait::async_trait;

use crate::client::NodeStatus;
use crate::escalation::NodeError;

/// Host callbacks.
#[async_trait]
pub trait Notify: Send + Sync + 'static {
    async fn on_status(&self, status: &NodeStatus);

    /// The node failed; restarting is the host's decision.
    async fn on_fatal_error(&self, err: &NodeError);

    /// The node answered its first probe and the streams are live.
    async fn on_ready(&self) {}
}
