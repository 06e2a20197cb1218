//! # Session: N supervised sources, one receive loop.
//!
//! A [`Session`] turns a set of source descriptions into running
//! connector/worker pairs, merges their envelope channels, and feeds the
//! merged stream to a single [`Handler`]. It owns the whole lifecycle:
//!
//! ```text
//!   TapConfig ──► Connector(AmqpDialer) + TapWorker ──┐
//!   SubConfig ──► Connector(AmqpDialer) + SubWorker ──┼─► Fanin ─► Handler
//!   TapConfig ──► Connector(AmqpDialer) + TapWorker ──┘
//! ```
//!
//! ## Termination
//! The receive loop ends when the handler returns [`Verdict::Stop`], the
//! cancellation token fires (signal or programmatic), or every source has
//! ended on its own. Teardown is always the same ordered sequence: signal
//! every connector to shut down, then drain their tasks within the
//! configured grace period. Connectors still alive past the grace are
//! aborted and reported via [`SessionError::GraceExceeded`].

use lapin::tcp::OwnedTLSConfig;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::channel::Fanin;
use crate::config::{SessionConfig, SubscribeConfig, TapConfig};
use crate::connect::{clone_tls, AmqpDialer, Connector, ConnectorHandle};
use crate::error::SessionError;
use crate::session::handler::{Handler, Verdict};
use crate::session::signal::cancel_on_shutdown;
use crate::workers::{SubscribeWorker, TapWorker};

/// One source to run: an observation tap or a queue subscription.
#[derive(Clone, Debug)]
pub enum SourceSpec {
    Tap(TapConfig),
    Subscribe(SubscribeConfig),
}

/// Owns a set of sources and drives them to completion.
pub struct Session {
    sources: Vec<SourceSpec>,
    config: SessionConfig,
    tls: OwnedTLSConfig,
    cancel: CancellationToken,
}

impl Session {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            sources: Vec::new(),
            config,
            tls: OwnedTLSConfig::default(),
            cancel: CancellationToken::new(),
        }
    }

    /// Sets the TLS settings shared by every source connection.
    pub fn with_tls(mut self, tls: OwnedTLSConfig) -> Self {
        self.tls = tls;
        self
    }

    /// Adds a tap source.
    pub fn add_tap(mut self, config: TapConfig) -> Self {
        self.sources.push(SourceSpec::Tap(config));
        self
    }

    /// Adds a subscribe source.
    pub fn add_subscribe(mut self, config: SubscribeConfig) -> Self {
        self.sources.push(SourceSpec::Subscribe(config));
        self
    }

    /// Adds an already-built source description.
    pub fn add_source(mut self, source: SourceSpec) -> Self {
        self.sources.push(source);
        self
    }

    /// Token that stops the session when cancelled. Clone it before calling
    /// [`Session::run`] to retain a programmatic stop switch.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Runs like [`Session::run`], additionally stopping on Ctrl-C/SIGTERM.
    pub async fn run_until_signal<H: Handler>(self, handler: H) -> Result<(), SessionError> {
        cancel_on_shutdown(&self.cancel);
        self.run(handler).await
    }

    /// Starts every source and receives until the session ends.
    ///
    /// Returns `Ok(())` after a clean teardown, including the case where
    /// every source failed fast (their errors were delivered as envelopes).
    pub async fn run<H: Handler>(mut self, mut handler: H) -> Result<(), SessionError> {
        let capacity = self.config.capacity_clamped();
        let mut tasks: JoinSet<()> = JoinSet::new();
        let mut handles: Vec<ConnectorHandle> = Vec::new();
        let mut outputs = Vec::with_capacity(self.sources.len());

        for source in self.sources.drain(..) {
            let (tx, rx) = mpsc::channel(capacity);
            outputs.push(rx);
            match source {
                SourceSpec::Tap(config) => {
                    let dialer = AmqpDialer::with_tls(config.uri.clone(), clone_tls(&self.tls));
                    let (connector, handle) =
                        Connector::new(dialer, self.config.backoff, tx.clone());
                    handles.push(handle);
                    tasks.spawn(connector.run(TapWorker::new(config, tx)));
                }
                SourceSpec::Subscribe(config) => {
                    let dialer = AmqpDialer::with_tls(config.uri.clone(), clone_tls(&self.tls));
                    let (connector, handle) =
                        Connector::new(dialer, self.config.backoff, tx.clone());
                    handles.push(handle);
                    tasks.spawn(connector.run(SubscribeWorker::new(config, tx)));
                }
            }
        }

        let mut merged = Fanin::from_receivers(outputs, capacity);
        info!(sources = handles.len(), "session started");

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    debug!("session cancelled");
                    break;
                }
                item = merged.recv() => match item {
                    Some(envelope) => {
                        if handler.handle(envelope).await == Verdict::Stop {
                            debug!("handler requested stop");
                            break;
                        }
                    }
                    None => {
                        debug!("all sources ended");
                        break;
                    }
                },
            }
        }

        self.teardown(handles, tasks).await
    }

    /// Ordered teardown: signal every connector, then drain their tasks
    /// within the grace period.
    async fn teardown(
        &self,
        handles: Vec<ConnectorHandle>,
        mut tasks: JoinSet<()>,
    ) -> Result<(), SessionError> {
        for handle in &handles {
            handle.shutdown();
        }

        let grace = self.config.grace;
        let drained = time::timeout(grace, async {
            while tasks.join_next().await.is_some() {}
        })
        .await;

        match drained {
            Ok(()) => {
                debug!("session stopped");
                Ok(())
            }
            Err(_) => {
                let pending = tasks.len();
                tasks.abort_all();
                warn!(?grace, pending, "shutdown grace exceeded, aborting connections");
                Err(SessionError::GraceExceeded { grace, pending })
            }
        }
    }
}
