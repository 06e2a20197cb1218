//! The contract between a connector and the code it runs per connection.

use async_trait::async_trait;

use crate::connect::ControlReceiver;

/// What the connector should do after a worker invocation returns.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReconnectAction {
    /// Close the transport and dial again (after the backoff delay).
    Reconnect,
    /// Close the transport and stop the connector for good.
    DoNotReconnect,
}

/// One invocation of broker-side work on a live transport.
///
/// A connector calls [`Worker::run`] once per successful dial, lending the
/// transport and the connector's control receiver for the duration of the
/// call. The worker must return promptly once a `Shutdown` arrives on the
/// control channel; it must not close the transport itself (the connector
/// does that on return).
#[async_trait]
pub trait Worker<C>: Send + Sync + 'static
where
    C: Send + Sync + 'static,
{
    /// Short name used in connection logs.
    fn name(&self) -> &str;

    /// Performs the per-connection work until the stream ends, an error
    /// occurs, or a control message arrives.
    async fn run(&self, conn: &C, control: &mut ControlReceiver) -> ReconnectAction;
}
