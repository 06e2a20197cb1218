//! Session runtime: many sources, one handler, one lifecycle.
//!
//! ## Contents
//! - [`Session`] / [`SourceSpec`] — builds and drives connector/worker
//!   pairs, merges their output, owns ordered teardown
//! - [`Handler`] / [`HandlerFn`] / [`Verdict`] — the consumer-side contract
//! - [`shutdown_signal`] — Ctrl-C/SIGTERM future for embedding callers

mod handler;
mod runtime;
mod signal;

pub use handler::{Handler, HandlerFn, Verdict};
pub use runtime::{Session, SourceSpec};
pub use signal::shutdown_signal;
