//! Shared consume plumbing: consumer tags, the consume request, and the
//! message loop both worker kinds drive.
//!
//! The message loop is where the data plane and the control plane meet: it
//! multiplexes the merged delivery stream against the connector's control
//! channel and translates every outcome into a [`ReconnectAction`].

use lapin::message::Delivery;
use lapin::options::BasicConsumeOptions;
use lapin::types::FieldTable;
use lapin::{Channel, Consumer};
use rand::distr::Alphanumeric;
use rand::Rng;
use tracing::{debug, warn};

use crate::channel::{Envelope, EnvelopeSender, Fanin};
use crate::config::ConsumeOptions;
use crate::connect::{ControlMessage, ControlReceiver};
use crate::error::TapError;
use crate::workers::ReconnectAction;

/// Buffer between the raw consumer streams and the message loop. Small on
/// purpose: real backpressure lives on the envelope channel.
pub(crate) const DELIVERY_BUFFER: usize = 16;

/// Builds a unique consumer tag from a prefix and a random suffix, so that
/// concurrent sources on one broker stay distinguishable in management UIs.
pub(crate) fn consumer_tag(prefix: &str) -> String {
    let suffix: String = rand::rng()
        .sample_iter(Alphanumeric)
        .take(12)
        .map(char::from)
        .collect();
    format!("{prefix}-{suffix}")
}

/// Issues a consume request for `queue` on the given channel.
pub(crate) async fn start_consumer(
    channel: &Channel,
    queue: &str,
    tag_prefix: &str,
    options: ConsumeOptions,
) -> Result<Consumer, TapError> {
    channel
        .basic_consume(
            queue,
            &consumer_tag(tag_prefix),
            BasicConsumeOptions {
                no_ack: options.auto_ack,
                exclusive: options.exclusive,
                ..Default::default()
            },
            FieldTable::default(),
        )
        .await
        .map_err(|source| TapError::Setup {
            target: queue.to_string(),
            source,
        })
}

/// Pumps merged deliveries into the envelope channel until something ends
/// the connection's useful life.
///
/// Outcomes:
/// - delivery → forwarded as an [`Envelope`]; if the envelope channel is
///   closed the consumer is gone and the worker stops
/// - stream error or end of stream → the transport is no longer delivering,
///   ask for a reconnect
/// - control `Shutdown` (or all handles dropped) → stop
/// - control `ForceReconnect` → reconnect
pub(crate) async fn message_loop(
    mut deliveries: Fanin<Result<Delivery, lapin::Error>>,
    out: &EnvelopeSender,
    control: &mut ControlReceiver,
) -> ReconnectAction {
    loop {
        tokio::select! {
            item = deliveries.recv() => match item {
                Some(Ok(delivery)) => {
                    if out.send(Envelope::delivery(delivery)).await.is_err() {
                        debug!("envelope channel closed, stopping consume");
                        return ReconnectAction::DoNotReconnect;
                    }
                }
                Some(Err(err)) => {
                    warn!(error = %err, "delivery stream failed");
                    return ReconnectAction::Reconnect;
                }
                None => {
                    debug!("all consumers ended");
                    return ReconnectAction::Reconnect;
                }
            },
            msg = control.recv() => match msg {
                Some(ControlMessage::ForceReconnect) => return ReconnectAction::Reconnect,
                Some(ControlMessage::Shutdown) | None => return ReconnectAction::DoNotReconnect,
            },
        }
    }
}
