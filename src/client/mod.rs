//! Node API capability and addressing.
//!
//! - [`NodeClient`] the control surface the supervisor drives
//! - [`Endpoint`] where that surface lives (local node or remote)
//! - [`NodeStatus`], [`VersionInfo`] pass-through values

mod client;
mod endpoint;
mod status;

pub use client::{ErrorStream, NodeClient, StatusStream};
pub use endpoint::{Endpoint, Scheme};
pub use status::{NodeStatus, VersionInfo};
