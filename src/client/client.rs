//! # Node control-surface capability.
//!
//! [`NodeClient`] is everything the supervisor needs from the node's API. The
//! wire protocol stays behind the trait; the supervisor only relies on this
//! usage contract:
//!
//! ```text
//! connect(endpoint)          once per start / connect_remote, before any call
//! echo()                     cheap liveness round-trip; never errors, false = no answer
//! status()                   may fail transiently right after start → retried
//! status_stream()            pushed statuses; errors inside go to the fault pipeline
//! error_stream()             pushed node errors → fault pipeline
//! shutdown()                 graceful stop request; does not wait for exit
//! version() / build()        informational
//! ```
//!
//! Streams end when the connection drops; the supervisor does not resubscribe
//! within a generation.

use async_trait::async_trait;
use futures::stream::BoxStream;

use super::endpoint::Endpoint;
use super::status::NodeStatus;
use crate::error::ClientError;
use crate::escalation::NodeError;

/// Statuses pushed by the node; an `Err` item is a node-reported error.
pub type StatusStream = BoxStream<'static, Result<NodeStatus, NodeError>>;

/// Errors pushed by the node.
pub type ErrorStream = BoxStream<'static, NodeError>;

/// Capability interface to the node's control API.
#[async_trait]
pub trait NodeClient: Send + Sync + 'static {
    /// Points the client at `endpoint`, replacing any previous connection.
    async fn connect(&self, endpoint: &Endpoint) -> Result<(), ClientError>;

    /// Liveness round-trip.
    async fn echo(&self) -> bool;

    async fn status(&self) -> Result<NodeStatus, ClientError>;

    /// Asks the node to shut down gracefully.
    async fn shutdown(&self) -> Result<(), ClientError>;

    async fn version(&self) -> Result<String, ClientError>;

    async fn build(&self) -> Result<String, ClientError>;

    async fn status_stream(&self) -> Result<StatusStream, ClientError>;

    async fn error_stream(&self) -> Result<ErrorStream, ClientError>;
}
