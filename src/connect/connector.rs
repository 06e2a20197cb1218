//! # Connector: the supervised reconnect loop for one broker connection.
//!
//! A [`Connector`] owns one logical connection to a broker endpoint. It
//! dials through its [`Dial`] implementation, hands the live transport to a
//! caller-supplied [`Worker`], and decides from the worker's
//! [`ReconnectAction`] whether to redial or stop. The paired
//! [`ConnectorHandle`] is the only way to influence a running loop, and it
//! does so exclusively through the control channel.
//!
//! ## Loop shape
//! ```text
//! loop {
//!   ├─► drain control (pending Shutdown → exit)
//!   ├─► status = Connecting; dial (cancellable by Shutdown)
//!   │     ├─ Err, never connected  → one error envelope, exit   (fail fast)
//!   │     └─ Err, connected before → backoff (cancellable), retry
//!   ├─► status = Connected; action = worker.run(conn, control)
//!   ├─► status = ShuttingDown; close transport (errors logged only)
//!   └─► match action:
//!         ├─ DoNotReconnect → exit
//!         └─ Reconnect      → backoff (cancellable), retry
//! }
//! status = Disconnected        (published exactly once, at exit)
//! ```
//!
//! ## Rules
//! - At most one live transport per connector; the old handle is closed
//!   before any redial begins.
//! - A dial failure on the *first* attempt is fatal: a malformed target
//!   must surface within one attempt, not loop silently.
//! - The backoff attempt counter resets after every successful connection.
//! - Dropping every [`ConnectorHandle`] closes the control channel, which
//!   the loop treats as `Shutdown` — no orphaned reconnect loops.

use tokio::sync::{mpsc, watch};
use tokio::time;
use tracing::{debug, info, warn};

use crate::channel::{Envelope, EnvelopeSender};
use crate::connect::backoff::BackoffPolicy;
use crate::connect::control::{control_channel, ControlMessage, ControlReceiver, ControlSender};
use crate::connect::dial::{Dial, Transport};
use crate::workers::{ReconnectAction, Worker};

/// Lifecycle status of a connector, published through a watch channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectorStatus {
    /// No loop running, or the loop has exited and released everything.
    Disconnected,
    /// Dialing, or waiting out a backoff delay before the next dial.
    Connecting,
    /// A worker invocation is running on a live transport.
    Connected,
    /// The transport is being closed.
    ShuttingDown,
}

/// Supervises one logical broker connection.
///
/// Constructed together with its [`ConnectorHandle`]; consumed by
/// [`Connector::run`], which the caller typically spawns as a task.
pub struct Connector<D: Dial> {
    dialer: D,
    backoff: BackoffPolicy,
    control_rx: ControlReceiver,
    status_tx: watch::Sender<ConnectorStatus>,
    out: EnvelopeSender,
}

/// Cloneable handle for observing and signaling a [`Connector`].
#[derive(Clone)]
pub struct ConnectorHandle {
    control: ControlSender,
    status: watch::Receiver<ConnectorStatus>,
}

impl<D: Dial> Connector<D> {
    /// Creates a connector and its control handle.
    ///
    /// `out` receives one error envelope for every terminal failure the
    /// loop encounters (fail-fast dial errors; workers report their own
    /// setup failures through their copy of the sender).
    pub fn new(dialer: D, backoff: BackoffPolicy, out: EnvelopeSender) -> (Self, ConnectorHandle) {
        let (control_tx, control_rx) = control_channel();
        let (status_tx, status_rx) = watch::channel(ConnectorStatus::Disconnected);

        let connector = Self {
            dialer,
            backoff,
            control_rx,
            status_tx,
            out,
        };
        let handle = ConnectorHandle {
            control: control_tx,
            status: status_rx,
        };
        (connector, handle)
    }

    /// Runs the supervised loop until a fatal outcome or shutdown.
    ///
    /// Returns only when the loop has exited and the transport (if any) has
    /// been closed; the final status is always
    /// [`ConnectorStatus::Disconnected`].
    pub async fn run<W>(mut self, worker: W)
    where
        W: Worker<D::Conn>,
    {
        let mut ever_connected = false;
        let mut attempt: u32 = 0;

        loop {
            if drain_pending_shutdown(&mut self.control_rx) {
                break;
            }
            self.status_tx.send_replace(ConnectorStatus::Connecting);

            let dialer = &self.dialer;
            let control = &mut self.control_rx;
            let dialed = tokio::select! {
                res = dialer.dial() => Some(res),
                msg = control.recv() => match msg {
                    // Already mid-connect; nothing to tear down.
                    Some(ControlMessage::ForceReconnect) => None,
                    Some(ControlMessage::Shutdown) | None => break,
                },
            };
            let Some(dialed) = dialed else { continue };

            let conn = match dialed {
                Ok(conn) => conn,
                Err(err) => {
                    if !ever_connected {
                        warn!(endpoint = %self.dialer.target(), error = %err, "initial connection failed");
                        let _ = self.out.send(Envelope::failure(err)).await;
                        break;
                    }
                    let delay = self.backoff.next(attempt);
                    attempt = attempt.saturating_add(1);
                    warn!(endpoint = %self.dialer.target(), error = %err, ?delay, "redial failed, backing off");
                    if !self.backoff_pause(delay).await {
                        break;
                    }
                    continue;
                }
            };

            ever_connected = true;
            attempt = 0;
            self.status_tx.send_replace(ConnectorStatus::Connected);
            info!(endpoint = %self.dialer.target(), worker = worker.name(), "connected");

            let action = worker.run(&conn, &mut self.control_rx).await;

            self.status_tx.send_replace(ConnectorStatus::ShuttingDown);
            if let Err(err) = conn.close().await {
                warn!(endpoint = %self.dialer.target(), error = %err, "error closing transport");
            }

            match action {
                ReconnectAction::DoNotReconnect => break,
                ReconnectAction::Reconnect => {
                    let delay = self.backoff.next(attempt);
                    attempt = attempt.saturating_add(1);
                    debug!(endpoint = %self.dialer.target(), ?delay, "worker requested reconnect");
                    if !self.backoff_pause(delay).await {
                        break;
                    }
                }
            }
        }

        self.status_tx.send_replace(ConnectorStatus::Disconnected);
        debug!(endpoint = %self.dialer.target(), "connector stopped");
    }

    /// Sleeps for `delay` unless interrupted. Returns `false` when the loop
    /// must exit (shutdown request or all handles dropped); a
    /// `ForceReconnect` merely skips the remaining delay.
    async fn backoff_pause(&mut self, delay: std::time::Duration) -> bool {
        let sleep = time::sleep(delay);
        tokio::pin!(sleep);
        tokio::select! {
            _ = &mut sleep => true,
            msg = self.control_rx.recv() => match msg {
                Some(ControlMessage::ForceReconnect) => true,
                Some(ControlMessage::Shutdown) | None => false,
            },
        }
    }
}

/// Drains control messages that arrived between connections without
/// blocking. Returns `true` when a shutdown was requested (or every handle
/// is gone).
fn drain_pending_shutdown(control: &mut ControlReceiver) -> bool {
    loop {
        match control.try_recv() {
            Ok(ControlMessage::Shutdown) => return true,
            // About to (re)connect anyway.
            Ok(ControlMessage::ForceReconnect) => {}
            Err(mpsc::error::TryRecvError::Empty) => return false,
            Err(mpsc::error::TryRecvError::Disconnected) => return true,
        }
    }
}

impl ConnectorHandle {
    /// Requests permanent shutdown. Non-blocking and safe against an
    /// already-terminated connector (the send is simply dropped).
    pub fn shutdown(&self) {
        let _ = self.control.try_send(ControlMessage::Shutdown);
    }

    /// Requests a deliberate teardown-and-redial of the current transport.
    pub fn force_reconnect(&self) {
        let _ = self.control.try_send(ControlMessage::ForceReconnect);
    }

    /// Current lifecycle status; safe to call concurrently with the loop.
    pub fn status(&self) -> ConnectorStatus {
        *self.status.borrow()
    }

    /// True while a worker invocation holds a live transport.
    pub fn connected(&self) -> bool {
        self.status() == ConnectorStatus::Connected
    }

    /// Requests shutdown and waits until the loop has exited and released
    /// its transport. Idempotent: on an already-stopped connector this
    /// returns immediately.
    pub async fn close(&mut self) {
        self.shutdown();
        let _ = self
            .status
            .wait_for(|status| *status == ConnectorStatus::Disconnected)
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tokio::sync::mpsc;
    use tokio::time::timeout;

    use crate::error::TapError;

    struct FakeTransport {
        closes: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Transport for FakeTransport {
        async fn close(self) -> Result<(), TapError> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    /// Dialer driven by a script of outcomes (`true` = success). An empty
    /// script keeps succeeding.
    struct FakeDialer {
        dials: Arc<AtomicUsize>,
        closes: Arc<AtomicUsize>,
        script: Mutex<VecDeque<bool>>,
    }

    impl FakeDialer {
        fn new(script: Vec<bool>) -> (Self, Arc<AtomicUsize>, Arc<AtomicUsize>) {
            let dials = Arc::new(AtomicUsize::new(0));
            let closes = Arc::new(AtomicUsize::new(0));
            let dialer = Self {
                dials: dials.clone(),
                closes: closes.clone(),
                script: Mutex::new(script.into()),
            };
            (dialer, dials, closes)
        }

        fn refused() -> TapError {
            TapError::Connect {
                uri: "fake://broker".into(),
                source: lapin::Error::InvalidConnectionState(lapin::ConnectionState::Error),
            }
        }
    }

    #[async_trait]
    impl Dial for FakeDialer {
        type Conn = FakeTransport;

        fn target(&self) -> &str {
            "fake://broker"
        }

        async fn dial(&self) -> Result<FakeTransport, TapError> {
            self.dials.fetch_add(1, Ordering::SeqCst);
            let ok = self.script.lock().unwrap().pop_front().unwrap_or(true);
            if ok {
                Ok(FakeTransport {
                    closes: self.closes.clone(),
                })
            } else {
                Err(Self::refused())
            }
        }
    }

    /// Worker driven by a script of actions; an exhausted script stops.
    struct ScriptedWorker {
        actions: Mutex<VecDeque<ReconnectAction>>,
    }

    impl ScriptedWorker {
        fn new(actions: Vec<ReconnectAction>) -> Self {
            Self {
                actions: Mutex::new(actions.into()),
            }
        }
    }

    #[async_trait]
    impl Worker<FakeTransport> for ScriptedWorker {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn run(&self, _conn: &FakeTransport, _control: &mut ControlReceiver) -> ReconnectAction {
            self.actions
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(ReconnectAction::DoNotReconnect)
        }
    }

    /// Worker that blocks on the control channel, like a real message loop
    /// with a silent broker.
    struct ControlWaitWorker;

    #[async_trait]
    impl Worker<FakeTransport> for ControlWaitWorker {
        fn name(&self) -> &str {
            "control-wait"
        }

        async fn run(&self, _conn: &FakeTransport, control: &mut ControlReceiver) -> ReconnectAction {
            match control.recv().await {
                Some(ControlMessage::ForceReconnect) => ReconnectAction::Reconnect,
                Some(ControlMessage::Shutdown) | None => ReconnectAction::DoNotReconnect,
            }
        }
    }

    fn quick_backoff() -> BackoffPolicy {
        BackoffPolicy {
            first: Duration::from_millis(1),
            max: Duration::from_millis(5),
            factor: 2.0,
        }
    }

    async fn wait_for<F: Fn() -> bool>(cond: F) {
        timeout(Duration::from_secs(2), async {
            while !cond() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("condition not reached in time");
    }

    #[tokio::test]
    async fn test_do_not_reconnect_stops_after_one_dial() {
        let (dialer, dials, closes) = FakeDialer::new(vec![]);
        let (tx, mut rx) = mpsc::channel(8);
        let (connector, handle) = Connector::new(dialer, quick_backoff(), tx);

        connector
            .run(ScriptedWorker::new(vec![ReconnectAction::DoNotReconnect]))
            .await;

        assert_eq!(dials.load(Ordering::SeqCst), 1);
        assert_eq!(closes.load(Ordering::SeqCst), 1);
        assert_eq!(handle.status(), ConnectorStatus::Disconnected);
        // Connector dropped its sender; no envelopes were produced.
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_first_dial_failure_fails_fast() {
        let (dialer, dials, _closes) = FakeDialer::new(vec![false]);
        let (tx, mut rx) = mpsc::channel(8);
        let (connector, handle) = Connector::new(dialer, quick_backoff(), tx);

        timeout(Duration::from_secs(2), connector.run(ControlWaitWorker))
            .await
            .expect("fail-fast path looped instead of exiting");

        // Exactly one error envelope, exactly one attempt.
        let envelope = rx.recv().await.expect("missing error envelope");
        assert!(envelope.is_error());
        assert_eq!(envelope.error().unwrap().as_label(), "tap_connect");
        assert!(rx.recv().await.is_none());
        assert_eq!(dials.load(Ordering::SeqCst), 1);
        assert_eq!(handle.status(), ConnectorStatus::Disconnected);
    }

    #[tokio::test]
    async fn test_reconnect_action_redials_and_closes_old_transport() {
        let (dialer, dials, closes) = FakeDialer::new(vec![]);
        let (tx, _rx) = mpsc::channel(8);
        let (connector, _handle) = Connector::new(dialer, quick_backoff(), tx);

        connector
            .run(ScriptedWorker::new(vec![
                ReconnectAction::Reconnect,
                ReconnectAction::DoNotReconnect,
            ]))
            .await;

        assert_eq!(dials.load(Ordering::SeqCst), 2);
        // Every transport was closed before the loop moved on.
        assert_eq!(closes.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_dial_failure_after_success_is_retried_silently() {
        let (dialer, dials, _closes) = FakeDialer::new(vec![true, false, true]);
        let (tx, mut rx) = mpsc::channel(8);
        let (connector, _handle) = Connector::new(dialer, quick_backoff(), tx);

        connector
            .run(ScriptedWorker::new(vec![
                ReconnectAction::Reconnect,
                ReconnectAction::DoNotReconnect,
            ]))
            .await;

        // ok → worker Reconnect → fail (retried) → ok → worker stop
        assert_eq!(dials.load(Ordering::SeqCst), 3);
        // Transient redial failures are not surfaced per attempt.
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_shutdown_interrupts_backoff() {
        // Backoff long enough that only the control channel can end the test.
        let slow = BackoffPolicy {
            first: Duration::from_secs(3600),
            max: Duration::from_secs(3600),
            factor: 1.0,
        };
        let (dialer, dials, _closes) = FakeDialer::new(vec![]);
        let (tx, _rx) = mpsc::channel(8);
        let (connector, mut handle) = Connector::new(dialer, slow, tx);

        let task = tokio::spawn(connector.run(ScriptedWorker::new(vec![ReconnectAction::Reconnect])));
        {
            let dials = dials.clone();
            wait_for(move || dials.load(Ordering::SeqCst) == 1).await;
        }
        tokio::time::sleep(Duration::from_millis(20)).await; // let it enter the backoff sleep

        timeout(Duration::from_secs(2), handle.close())
            .await
            .expect("close blocked during backoff");
        timeout(Duration::from_secs(2), task)
            .await
            .expect("loop did not exit")
            .unwrap();
        assert_eq!(handle.status(), ConnectorStatus::Disconnected);
    }

    #[tokio::test]
    async fn test_shutdown_reaches_active_worker() {
        let (dialer, _dials, closes) = FakeDialer::new(vec![]);
        let (tx, _rx) = mpsc::channel(8);
        let (connector, mut handle) = Connector::new(dialer, quick_backoff(), tx);

        let task = tokio::spawn(connector.run(ControlWaitWorker));
        {
            let probe = handle.clone();
            wait_for(move || probe.connected()).await;
        }

        timeout(Duration::from_secs(2), handle.close())
            .await
            .expect("close did not complete");
        timeout(Duration::from_secs(2), task).await.unwrap().unwrap();
        assert_eq!(handle.status(), ConnectorStatus::Disconnected);
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let (dialer, _dials, _closes) = FakeDialer::new(vec![]);
        let (tx, _rx) = mpsc::channel(8);
        let (connector, mut handle) = Connector::new(dialer, quick_backoff(), tx);

        connector
            .run(ScriptedWorker::new(vec![ReconnectAction::DoNotReconnect]))
            .await;

        timeout(Duration::from_secs(1), handle.close())
            .await
            .expect("first close blocked");
        timeout(Duration::from_secs(1), handle.close())
            .await
            .expect("second close blocked");
    }

    #[tokio::test]
    async fn test_force_reconnect_cycles_the_transport() {
        let (dialer, dials, closes) = FakeDialer::new(vec![]);
        let (tx, _rx) = mpsc::channel(8);
        let (connector, mut handle) = Connector::new(dialer, quick_backoff(), tx);

        let task = tokio::spawn(connector.run(ControlWaitWorker));
        {
            let probe = handle.clone();
            wait_for(move || probe.connected()).await;
        }

        handle.force_reconnect();
        {
            let dials = dials.clone();
            wait_for(move || dials.load(Ordering::SeqCst) >= 2).await;
        }

        timeout(Duration::from_secs(2), handle.close())
            .await
            .expect("close did not complete");
        timeout(Duration::from_secs(2), task).await.unwrap().unwrap();
        assert_eq!(closes.load(Ordering::SeqCst), dials.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_dropping_all_handles_stops_the_loop() {
        let (dialer, _dials, _closes) = FakeDialer::new(vec![]);
        let (tx, _rx) = mpsc::channel(8);
        let (connector, handle) = Connector::new(dialer, quick_backoff(), tx);

        let task = tokio::spawn(connector.run(ControlWaitWorker));
        {
            let probe = handle.clone();
            wait_for(move || probe.connected()).await;
        }
        drop(handle);

        timeout(Duration::from_secs(2), task)
            .await
            .expect("loop survived handle drop")
            .unwrap();
    }
}
