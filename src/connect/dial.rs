//! Transport establishment: the [`Dial`]/[`Transport`] seams and the AMQP
//! implementation backed by `lapin`.
//!
//! The connector never names a concrete client library; it dials through
//! [`Dial`] and releases through [`Transport::close`]. Production code uses
//! [`AmqpDialer`]; tests script fakes against the same two traits.

use async_trait::async_trait;
use lapin::tcp::{OwnedIdentity, OwnedTLSConfig};
use lapin::{Connection, ConnectionProperties};

use crate::error::TapError;

/// A live transport handle, exclusively owned by its connector.
#[async_trait]
pub trait Transport: Send + Sync + Sized + 'static {
    /// Closes the transport, releasing all broker-side resources.
    async fn close(self) -> Result<(), TapError>;
}

/// Establishes transports to one fixed target.
#[async_trait]
pub trait Dial: Send + Sync + 'static {
    /// The transport type this dialer produces.
    type Conn: Transport;

    /// Human-readable target, used in logs only.
    fn target(&self) -> &str;

    /// Performs one dial + handshake attempt.
    async fn dial(&self) -> Result<Self::Conn, TapError>;
}

#[async_trait]
impl Transport for Connection {
    async fn close(self) -> Result<(), TapError> {
        // 200 = reply-success: a clean, client-initiated close.
        Connection::close(&self, 200, "amqptap closing")
            .await
            .map_err(TapError::Stream)
    }
}

/// Dials one AMQP broker URI, passing the TLS settings through unchanged.
pub struct AmqpDialer {
    uri: String,
    tls: OwnedTLSConfig,
}

impl AmqpDialer {
    /// Dialer for a plain (or URI-configured) endpoint.
    pub fn new(uri: impl Into<String>) -> Self {
        Self::with_tls(uri, OwnedTLSConfig::default())
    }

    /// Dialer with explicit TLS settings (client identity / CA chain).
    pub fn with_tls(uri: impl Into<String>, tls: OwnedTLSConfig) -> Self {
        Self {
            uri: uri.into(),
            tls,
        }
    }
}

#[async_trait]
impl Dial for AmqpDialer {
    type Conn = Connection;

    fn target(&self) -> &str {
        &self.uri
    }

    async fn dial(&self) -> Result<Connection, TapError> {
        let properties = ConnectionProperties::default()
            .with_executor(tokio_executor_trait::Tokio::current())
            .with_reactor(tokio_reactor_trait::Tokio);

        Connection::connect_with_config(&self.uri, properties, clone_tls(&self.tls))
            .await
            .map_err(|source| TapError::Connect {
                uri: self.uri.clone(),
                source,
            })
    }
}

/// `OwnedTLSConfig` is consumed by every connect call; rebuild it per
/// attempt so one shared settings value can serve many dials.
pub(crate) fn clone_tls(tls: &OwnedTLSConfig) -> OwnedTLSConfig {
    OwnedTLSConfig {
        identity: tls.identity.as_ref().map(|identity| OwnedIdentity {
            der: identity.der.clone(),
            password: identity.password.clone(),
        }),
        cert_chain: tls.cert_chain.clone(),
    }
}
