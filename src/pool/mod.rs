//! Time-windowed event batching.
//!
//! - [`DebouncePool`] push handle + worker
//! - [`Reduce`] / [`ReduceFn`] batch consumers
//! - [`Batch`] one flushed window

mod debounce;

pub use debounce::{Batch, DebouncePool, Reduce, ReduceFn};
