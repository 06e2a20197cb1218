//! Configuration for taps, subscriptions, and the session runtime.
//!
//! Two kinds of values live here:
//!
//! 1. **Source descriptions** — [`TapConfig`] / [`SubscribeConfig`], immutable
//!    values describing what to observe on which broker. One source becomes
//!    one supervised connection.
//! 2. **Runtime settings** — [`SessionConfig`], knobs of the session that
//!    drives all sources (channel capacity, reconnect backoff, shutdown
//!    grace).
//!
//! ## Defaults
//! - Tap binding key: `#` (match everything). No discovery of existing
//!   bindings takes place; an explicit key must be supplied to narrow it.
//! - Taps auto-acknowledge: observation must not leave unacked deliveries
//!   piling up on the transient queue.

use std::time::Duration;

use crate::connect::BackoffPolicy;

/// Flags applied to every consume request of a source.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ConsumeOptions {
    /// Request exclusive consumption (broker rejects competing consumers).
    pub exclusive: bool,
    /// Let the broker consider deliveries acknowledged on send.
    pub auto_ack: bool,
}

/// One exchange to tap, with the binding key for the transient queue.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TapBinding {
    /// Name of the exchange to observe.
    pub exchange: String,
    /// Binding key for the transient queue bound to the exchange.
    pub binding_key: String,
}

impl TapBinding {
    /// Binds with an explicit key.
    pub fn new(exchange: impl Into<String>, binding_key: impl Into<String>) -> Self {
        Self {
            exchange: exchange.into(),
            binding_key: binding_key.into(),
        }
    }

    /// Binds with the wildcard key `#`, observing every routed message.
    pub fn wildcard(exchange: impl Into<String>) -> Self {
        Self::new(exchange, "#")
    }
}

/// Describes one tap source: a broker URI and the exchanges to observe.
#[derive(Clone, Debug)]
pub struct TapConfig {
    /// AMQP URI of the broker.
    pub uri: String,
    /// Exchanges to tap on this connection.
    pub bindings: Vec<TapBinding>,
    /// Consume flags for the transient tap queues.
    pub options: ConsumeOptions,
}

impl TapConfig {
    /// Creates a tap source with tap-appropriate defaults (`auto_ack = true`).
    pub fn new(uri: impl Into<String>, bindings: Vec<TapBinding>) -> Self {
        Self {
            uri: uri.into(),
            bindings,
            options: ConsumeOptions {
                exclusive: false,
                auto_ack: true,
            },
        }
    }
}

/// Describes one subscribe source: a broker URI and a pre-existing queue.
#[derive(Clone, Debug)]
pub struct SubscribeConfig {
    /// AMQP URI of the broker.
    pub uri: String,
    /// Name of the queue to consume from.
    pub queue: String,
    /// Consume flags for the subscription.
    pub options: ConsumeOptions,
}

impl SubscribeConfig {
    /// Creates a subscribe source with default (manual-ack, shared) flags.
    pub fn new(uri: impl Into<String>, queue: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            queue: queue.into(),
            options: ConsumeOptions::default(),
        }
    }
}

/// Settings of the session runtime that supervises all sources.
#[derive(Clone, Debug)]
pub struct SessionConfig {
    /// Capacity of each bounded envelope channel (per source, and of the
    /// merged output). A slow consumer stalls delivery dispatch through
    /// these; that backpressure is accepted, not mitigated.
    pub channel_capacity: usize,
    /// Delay policy applied between reconnect attempts.
    pub backoff: BackoffPolicy,
    /// Maximum time to wait for connectors to close during teardown before
    /// aborting them and returning
    /// [`SessionError::GraceExceeded`](crate::SessionError::GraceExceeded).
    pub grace: Duration,
}

impl Default for SessionConfig {
    /// Defaults: `channel_capacity = 64`, default backoff, `grace = 10s`.
    fn default() -> Self {
        Self {
            channel_capacity: 64,
            backoff: BackoffPolicy::default(),
            grace: Duration::from_secs(10),
        }
    }
}

impl SessionConfig {
    /// Returns the channel capacity clamped to a minimum of 1.
    #[inline]
    pub fn capacity_clamped(&self) -> usize {
        self.channel_capacity.max(1)
    }
}
