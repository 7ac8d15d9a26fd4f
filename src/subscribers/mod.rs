//! # Event subscribers.
//!
//! This module provides the [`Subscribe`] trait, the [`SubscriberSet`] fan-out
//! and the built-in [`LogWriter`].
//!
//! ```text
//! Bus ──► Supervisor listener ──► SubscriberSet::emit(&Event)
//!                                      ├──► LogWriter  (tracing)
//!                                      ├──► Metrics    (user)
//!                                      └──► ...
//! ```

mod embedded;
mod subscribe;
mod subscriber_set;

pub use embedded::LogWriter;
pub use subscribe::Subscribe;
pub use subscriber_set::SubscriberSet;
