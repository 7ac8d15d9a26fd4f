//! Supervisor core: configuration, construction and the command surface.
//!
//! The only public API from this module is [`Supervisor`] (built through
//! [`SupervisorBuilder`]) and its [`Config`].
//!
//! Internal modules:
//! - [`config`]: timings, paths and capacities;
//! - [`builder`]: wires bus, subscribers, fault pipeline and process controller;
//! - [`supervisor`]: start / stop / restart / status and stream forwarding.

mod builder;
mod config;
mod supervisor;

pub use builder::SupervisorBuilder;
pub use config::Config;
pub use supervisor::Supervisor;
