//! Error types used by the tap runtime and its sessions.
//!
//! This module defines two error enums:
//!
//! - [`TapError`] — failures on a single connection (dial, consume setup,
//!   delivery stream). These travel to the consumer *as data*, inside an
//!   [`Envelope`](crate::Envelope), never across task boundaries.
//! - [`SessionError`] — errors raised by the session runtime itself, such as
//!   a shutdown sequence exceeding its grace period.
//!
//! Both types provide `as_label` for stable log/metric tags.

use std::time::Duration;
use thiserror::Error;

/// Errors produced while driving a single broker connection.
///
/// Every variant carries the underlying [`lapin::Error`]. The variant tells
/// the runtime how to react: a first-attempt [`TapError::Connect`] and any
/// [`TapError::Setup`] are fatal for their connector, while
/// [`TapError::Stream`] is reconnect-eligible.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum TapError {
    /// The transport to the broker could not be established.
    #[error("connection to {uri} failed: {source}")]
    Connect {
        /// Target AMQP URI.
        uri: String,
        /// The underlying transport/protocol error.
        #[source]
        source: lapin::Error,
    },

    /// The broker rejected consume setup (channel open, queue declare,
    /// bind, or the consume request itself). Retrying the same request
    /// will not succeed, so this is fatal for the worker.
    #[error("consume setup for {target} failed: {source}")]
    Setup {
        /// The queue or exchange the setup was for.
        target: String,
        /// The underlying protocol error.
        #[source]
        source: lapin::Error,
    },

    /// The delivery stream broke mid-flight (broker dropped, channel
    /// closed). Reconnect-eligible.
    #[error("delivery stream failed: {0}")]
    Stream(#[source] lapin::Error),
}

impl TapError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            TapError::Connect { .. } => "tap_connect",
            TapError::Setup { .. } => "tap_setup",
            TapError::Stream(_) => "tap_stream",
        }
    }

    /// Indicates whether the connection may recover by redialing.
    ///
    /// Setup rejections are permanent: the broker refused the request, not
    /// the connection.
    pub fn is_retryable(&self) -> bool {
        matches!(self, TapError::Connect { .. } | TapError::Stream(_))
    }
}

/// Errors produced by the session runtime.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum SessionError {
    /// Shutdown grace period was exceeded; some connectors were still
    /// closing and had to be aborted.
    #[error("shutdown grace {grace:?} exceeded; {pending} connection(s) aborted")]
    GraceExceeded {
        /// The configured grace duration.
        grace: Duration,
        /// Number of connector tasks that did not finish in time.
        pending: usize,
    },
}

impl SessionError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            SessionError::GraceExceeded { .. } => "session_grace_exceeded",
        }
    }
}
