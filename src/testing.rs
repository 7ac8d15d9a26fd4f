//! In-memory test doubles for the node API and the host callbacks.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use async_trait::async_trait;
use futures::StreamExt;
use tokio::sync::mpsc;

use crate::client::{Endpoint, ErrorStream, NodeClient, NodeStatus, StatusStream};
use crate::error::ClientError;
use crate::escalation::NodeError;
use crate::notify::Notify;

/// Scripted [`NodeClient`].
///
/// `echo` answers from the script first, then falls back to `alive`.
pub(crate) struct MockClient {
    alive: AtomicBool,
    script: Mutex<VecDeque<bool>>,
    status_failures: AtomicU32,

    pub connects: AtomicU32,
    pub echoes: AtomicU32,
    pub statuses: AtomicU32,
    pub shutdowns: AtomicU32,
    pub status_streams: AtomicU32,
    pub error_streams: AtomicU32,

    errors_tx: mpsc::UnboundedSender<NodeError>,
    errors_rx: Mutex<Option<mpsc::UnboundedReceiver<NodeError>>>,
    statuses_tx: mpsc::UnboundedSender<Result<NodeStatus, NodeError>>,
    statuses_rx: Mutex<Option<mpsc::UnboundedReceiver<Result<NodeStatus, NodeError>>>>,
}

impl MockClient {
    fn with_alive(alive: bool) -> Self {
        let (errors_tx, errors_rx) = mpsc::unbounded_channel();
        let (statuses_tx, statuses_rx) = mpsc::unbounded_channel();
        Self {
            alive: AtomicBool::new(alive),
            script: Mutex::new(VecDeque::new()),
            status_failures: AtomicU32::new(0),
            connects: AtomicU32::new(0),
            echoes: AtomicU32::new(0),
            statuses: AtomicU32::new(0),
            shutdowns: AtomicU32::new(0),
            status_streams: AtomicU32::new(0),
            error_streams: AtomicU32::new(0),
            errors_tx,
            errors_rx: Mutex::new(Some(errors_rx)),
            statuses_tx,
            statuses_rx: Mutex::new(Some(statuses_rx)),
        }
    }

    /// Answers every echo.
    pub fn alive() -> Self {
        Self::with_alive(true)
    }

    /// Never answers.
    pub fn dead() -> Self {
        Self::with_alive(false)
    }

    /// Answers the next echoes from `script`, in order.
    pub fn with_script(self, script: impl IntoIterator<Item = bool>) -> Self {
        self.script.lock().unwrap().extend(script);
        self
    }

    /// Fails the next `n` status calls.
    pub fn with_status_failures(self, n: u32) -> Self {
        self.status_failures.store(n, Ordering::SeqCst);
        self
    }

    pub fn set_alive(&self, alive: bool) {
        self.alive.store(alive, Ordering::SeqCst);
    }

    /// Pushes an error on the error stream.
    pub fn emit_error(&self, err: NodeError) {
        let _ = self.errors_tx.send(err);
    }

    /// Pushes an item on the status stream.
    pub fn emit_status(&self, item: Result<NodeStatus, NodeError>) {
        let _ = self.statuses_tx.send(item);
    }

    pub fn count(counter: &AtomicU32) -> u32 {
        counter.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NodeClient for MockClient {
    async fn connect(&self, _endpoint: &Endpoint) -> Result<(), ClientError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn echo(&self) -> bool {
        self.echoes.fetch_add(1, Ordering::SeqCst);
        let scripted = self.script.lock().unwrap().pop_front();
        scripted.unwrap_or_else(|| self.alive.load(Ordering::SeqCst))
    }

    async fn status(&self) -> Result<NodeStatus, ClientError> {
        self.statuses.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .status_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(ClientError::Unavailable);
        }
        Ok(NodeStatus {
            connected_peers: 8,
            is_synced: true,
            ..NodeStatus::default()
        })
    }

    async fn shutdown(&self) -> Result<(), ClientError> {
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn version(&self) -> Result<String, ClientError> {
        Ok("v1.2.3".into())
    }

    async fn build(&self) -> Result<String, ClientError> {
        Ok("abc123".into())
    }

    async fn status_stream(&self) -> Result<StatusStream, ClientError> {
        self.status_streams.fetch_add(1, Ordering::SeqCst);
        Ok(match self.statuses_rx.lock().unwrap().take() {
            Some(rx) => channel_stream(rx),
            None => futures::stream::pending().boxed(),
        })
    }

    async fn error_stream(&self) -> Result<ErrorStream, ClientError> {
        self.error_streams.fetch_add(1, Ordering::SeqCst);
        Ok(match self.errors_rx.lock().unwrap().take() {
            Some(rx) => channel_stream(rx),
            None => futures::stream::pending().boxed(),
        })
    }
}

fn channel_stream<T: Send + 'static>(
    rx: mpsc::UnboundedReceiver<T>,
) -> futures::stream::BoxStream<'static, T> {
    futures::stream::unfold(rx, |mut rx| async move { rx.recv().await.map(|item| (item, rx)) })
        .boxed()
}

/// [`Notify`] that records every call.
#[derive(Default)]
pub(crate) struct Recorder {
    fatals: Mutex<Vec<NodeError>>,
    statuses: Mutex<Vec<NodeStatus>>,
    ready: AtomicU32,
}

impl Recorder {
    pub fn fatals(&self) -> Vec<NodeError> {
        self.fatals.lock().unwrap().clone()
    }

    pub fn statuses(&self) -> Vec<NodeStatus> {
        self.statuses.lock().unwrap().clone()
    }

    pub fn ready(&self) -> u32 {
        self.ready.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Notify for Recorder {
    async fn on_status(&self, status: &NodeStatus) {
        self.statuses.lock().unwrap().push(status.clone());
    }

    async fn on_fatal_error(&self, err: &NodeError) {
        self.fatals.lock().unwrap().push(err.clone());
    }

    async fn on_ready(&self) {
        self.ready.fetch_add(1, Ordering::SeqCst);
    }
}
