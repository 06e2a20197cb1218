//! Subscribing: consuming from an existing, named queue.
//!
//! Unlike a tap, a subscription declares nothing. The queue must already
//! exist; the worker only opens a channel and issues the consume request,
//! leaving acknowledgment discipline to [`ConsumeOptions`] and the
//! downstream handler.
//!
//! [`ConsumeOptions`]: crate::ConsumeOptions

use async_trait::async_trait;
use lapin::{Channel, Connection, Consumer};
use tracing::warn;

use crate::channel::{Envelope, EnvelopeSender, Fanin};
use crate::config::SubscribeConfig;
use crate::connect::ControlReceiver;
use crate::error::TapError;
use crate::workers::consume::{message_loop, start_consumer, DELIVERY_BUFFER};
use crate::workers::{ReconnectAction, Worker};

/// Consumes from one pre-existing queue.
pub struct SubscribeWorker {
    config: SubscribeConfig,
    out: EnvelopeSender,
}

impl SubscribeWorker {
    pub fn new(config: SubscribeConfig, out: EnvelopeSender) -> Self {
        Self { config, out }
    }

    async fn setup(&self, conn: &Connection) -> Result<(Channel, Consumer), TapError> {
        let channel = conn
            .create_channel()
            .await
            .map_err(|source| TapError::Setup {
                target: self.config.queue.clone(),
                source,
            })?;
        let consumer = start_consumer(
            &channel,
            &self.config.queue,
            "amqptap-sub",
            self.config.options,
        )
        .await?;
        Ok((channel, consumer))
    }
}

#[async_trait]
impl Worker<Connection> for SubscribeWorker {
    fn name(&self) -> &str {
        "subscribe"
    }

    async fn run(&self, conn: &Connection, control: &mut ControlReceiver) -> ReconnectAction {
        let (_channel, consumer) = match self.setup(conn).await {
            Ok(pair) => pair,
            Err(err) => {
                warn!(queue = %self.config.queue, error = %err, "subscribe setup failed");
                let _ = self.out.send(Envelope::failure(err)).await;
                return ReconnectAction::DoNotReconnect;
            }
        };

        let deliveries = Fanin::new(vec![consumer], DELIVERY_BUFFER);
        message_loop(deliveries, &self.out, control).await
    }
}
