//! Per-connection workers: what runs on a live transport.
//!
//! ## Contents
//! - [`Worker`] / [`ReconnectAction`] — the connector-facing contract
//! - [`TapWorker`] — transient queues bound to exchanges, observation only
//! - [`SubscribeWorker`] — consumption from one existing queue
//!
//! Both workers funnel everything they see into an envelope channel and run
//! the shared message loop from [`consume`], so taps and subscriptions are
//! indistinguishable downstream.

pub(crate) mod consume;
mod subscribe;
mod tap;
mod worker;

pub use subscribe::SubscribeWorker;
pub use tap::TapWorker;
pub use worker::{ReconnectAction, Worker};
