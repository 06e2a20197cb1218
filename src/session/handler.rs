//! The consumer-side contract: what the session calls per envelope.

use std::future::Future;

use async_trait::async_trait;

use crate::channel::Envelope;

/// Whether the session keeps receiving after an envelope was handled.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verdict {
    /// Keep the session running.
    Continue,
    /// Begin session shutdown.
    Stop,
}

/// Receives every merged envelope, one at a time, in arrival order.
///
/// The handler runs on the session's receive loop: while it is busy the
/// merged channel fills up and backpressure propagates to the sources.
#[async_trait]
pub trait Handler: Send {
    /// Handles one envelope (a delivery or a source failure).
    async fn handle(&mut self, envelope: Envelope) -> Verdict;
}

/// Adapter turning an async closure into a [`Handler`].
///
/// ```no_run
/// use amqptap::{HandlerFn, Verdict};
///
/// let handler = HandlerFn::new(|envelope| async move {
///     match envelope.message() {
///         Some(delivery) => println!("{} bytes", delivery.data.len()),
///         None => eprintln!("source failed"),
///     }
///     Verdict::Continue
/// });
/// # let _ = handler;
/// ```
pub struct HandlerFn<F> {
    f: F,
}

impl<F, Fut> HandlerFn<F>
where
    F: FnMut(Envelope) -> Fut + Send,
    Fut: Future<Output = Verdict> + Send,
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F, Fut> Handler for HandlerFn<F>
where
    F: FnMut(Envelope) -> Fut + Send,
    Fut: Future<Output = Verdict> + Send,
{
    async fn handle(&mut self, envelope: Envelope) -> Verdict {
        (self.f)(envelope).await
    }
}
