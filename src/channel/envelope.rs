//! The normalized unit pushed from a worker toward the consumer.
//!
//! An [`Envelope`] carries either a raw broker delivery or a [`TapError`],
//! never both and never neither, plus the local receipt timestamp. Errors
//! reach the consumer the same way messages do — as data on the envelope
//! channel — so the receive loop is the single place that sees everything.

use std::time::SystemTime;

use lapin::message::Delivery;
use tokio::sync::mpsc;

use crate::error::TapError;

/// Sending half of an envelope channel (held by workers and connectors).
pub type EnvelopeSender = mpsc::Sender<Envelope>;
/// Receiving half of an envelope channel (held by the session).
pub type EnvelopeReceiver = mpsc::Receiver<Envelope>;

/// One observed message or one terminal failure, timestamped on receipt.
///
/// Immutable once constructed; exactly one of delivery/error is present.
pub struct Envelope {
    received_at: SystemTime,
    inner: Result<Delivery, TapError>,
}

impl Envelope {
    /// Wraps a broker delivery, stamping the current time.
    pub fn delivery(delivery: Delivery) -> Self {
        Self {
            received_at: SystemTime::now(),
            inner: Ok(delivery),
        }
    }

    /// Wraps a terminal failure, stamping the current time.
    pub fn failure(error: TapError) -> Self {
        Self {
            received_at: SystemTime::now(),
            inner: Err(error),
        }
    }

    /// Local wall-clock time at which this envelope was constructed.
    pub fn received_at(&self) -> SystemTime {
        self.received_at
    }

    /// The delivery, if this envelope carries one.
    pub fn message(&self) -> Option<&Delivery> {
        self.inner.as_ref().ok()
    }

    /// The error, if this envelope carries one.
    pub fn error(&self) -> Option<&TapError> {
        self.inner.as_ref().err()
    }

    /// True if this envelope carries an error rather than a delivery.
    pub fn is_error(&self) -> bool {
        self.inner.is_err()
    }

    /// Unwraps into the underlying result.
    pub fn into_result(self) -> Result<Delivery, TapError> {
        self.inner
    }
}
