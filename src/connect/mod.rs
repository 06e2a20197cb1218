//! Connection supervision: dialing, reconnect backoff, control signaling.
//!
//! ## Contents
//! - [`Dial`] / [`Transport`] — the seams between supervision and the
//!   concrete client library, plus the `lapin`-backed [`AmqpDialer`]
//! - [`Connector`] / [`ConnectorHandle`] — the supervised reconnect loop
//!   and its observe/signal handle
//! - [`ControlMessage`] — the out-of-band instruction set
//! - [`BackoffPolicy`] — exponential redial delays

mod backoff;
mod connector;
mod control;
mod dial;

pub use backoff::BackoffPolicy;
pub use connector::{Connector, ConnectorHandle, ConnectorStatus};
pub use control::{ControlMessage, ControlReceiver, ControlSender};
pub use dial::{AmqpDialer, Dial, Transport};

pub(crate) use dial::clone_tls;
