//! Tapping: non-intrusive observation of messages flowing through
//! exchanges.
//!
//! Per connection the tap worker declares one exclusive, auto-delete queue
//! per configured exchange, binds it with the configured binding key, and
//! consumes all of them into the shared envelope channel. The queues are
//! server-named and vanish with the connection, so tapping leaves no trace
//! on the broker topology.

use async_trait::async_trait;
use lapin::options::{QueueBindOptions, QueueDeclareOptions};
use lapin::types::FieldTable;
use lapin::{Channel, Connection, Consumer};
use tracing::{debug, warn};

use crate::channel::{Envelope, EnvelopeSender, Fanin};
use crate::config::TapConfig;
use crate::connect::ControlReceiver;
use crate::error::TapError;
use crate::workers::consume::{message_loop, start_consumer, DELIVERY_BUFFER};
use crate::workers::{ReconnectAction, Worker};

/// Consumes from transient queues bound to the configured exchanges.
pub struct TapWorker {
    config: TapConfig,
    out: EnvelopeSender,
}

impl TapWorker {
    pub fn new(config: TapConfig, out: EnvelopeSender) -> Self {
        Self { config, out }
    }

    /// Declares and binds one transient queue per configured exchange and
    /// starts a consumer on each.
    async fn setup(&self, conn: &Connection) -> Result<(Channel, Vec<Consumer>), TapError> {
        let channel = conn
            .create_channel()
            .await
            .map_err(|source| TapError::Setup {
                target: self.config.uri.clone(),
                source,
            })?;

        let mut consumers = Vec::with_capacity(self.config.bindings.len());
        for binding in &self.config.bindings {
            // Server-named, exclusive, auto-delete: gone when we are.
            let queue = channel
                .queue_declare(
                    "",
                    QueueDeclareOptions {
                        exclusive: true,
                        auto_delete: true,
                        ..Default::default()
                    },
                    FieldTable::default(),
                )
                .await
                .map_err(|source| TapError::Setup {
                    target: binding.exchange.clone(),
                    source,
                })?;
            let queue_name = queue.name().as_str().to_string();

            channel
                .queue_bind(
                    &queue_name,
                    &binding.exchange,
                    &binding.binding_key,
                    QueueBindOptions::default(),
                    FieldTable::default(),
                )
                .await
                .map_err(|source| TapError::Setup {
                    target: binding.exchange.clone(),
                    source,
                })?;
            debug!(
                exchange = %binding.exchange,
                key = %binding.binding_key,
                queue = %queue_name,
                "tap queue bound"
            );

            let consumer =
                start_consumer(&channel, &queue_name, "amqptap-tap", self.config.options).await?;
            consumers.push(consumer);
        }
        Ok((channel, consumers))
    }
}

#[async_trait]
impl Worker<Connection> for TapWorker {
    fn name(&self) -> &str {
        "tap"
    }

    async fn run(&self, conn: &Connection, control: &mut ControlReceiver) -> ReconnectAction {
        // Setup rejections are permanent (bad exchange name, permissions):
        // report once and stop instead of redialing into the same refusal.
        let (_channel, consumers) = match self.setup(conn).await {
            Ok(pair) => pair,
            Err(err) => {
                warn!(error = %err, "tap setup failed");
                let _ = self.out.send(Envelope::failure(err)).await;
                return ReconnectAction::DoNotReconnect;
            }
        };

        let deliveries = Fanin::new(consumers, DELIVERY_BUFFER);
        message_loop(deliveries, &self.out, control).await
    }
}
