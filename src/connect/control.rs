//! Out-of-band control signaling for a single connector.
//!
//! Control messages flow opposite to the data plane: from whoever holds a
//! [`ConnectorHandle`](crate::ConnectorHandle) down to the connector's
//! current worker invocation. Each message is consumed exactly once.

use tokio::sync::mpsc;

/// Instruction delivered to a connector and its active worker.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ControlMessage {
    /// Stop permanently: the worker returns
    /// [`DoNotReconnect`](crate::ReconnectAction::DoNotReconnect) and the
    /// connector releases its transport without retrying.
    Shutdown,
    /// Tear the current transport down and redial. A deliberate transient
    /// restart, not an error.
    ForceReconnect,
}

/// Sending half of a control channel.
pub type ControlSender = mpsc::Sender<ControlMessage>;
/// Receiving half of a control channel.
pub type ControlReceiver = mpsc::Receiver<ControlMessage>;

/// Control channels are small and buffered so that handles can signal with
/// a non-blocking `try_send` even when no worker is currently draining.
pub(crate) const CONTROL_CAPACITY: usize = 4;

/// Creates a bounded control channel.
pub(crate) fn control_channel() -> (ControlSender, ControlReceiver) {
    mpsc::channel(CONTROL_CAPACITY)
}
