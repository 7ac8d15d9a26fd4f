//! # Supervisor: the node's lifecycle and fault surface.
//!
//! The [`Supervisor`] owns the node process, the fault pipeline and the event
//! bus. The host drives it with commands and hears back through
//! [`Notify`](crate::Notify).
//!
//! ## Key responsibilities
//! - spawn the node and wait until its API answers
//! - forward status and error streams of the current generation
//! - route every fault through the debounce pool into the [`Escalator`]
//! - stop the node gracefully, escalating to signals
//!
//! ## High-level architecture
//! ```text
//! start():
//!   ProcessController::spawn ──► generation g ──► Escalator::begin_generation(g) ──► exit watcher
//!   client.connect(endpoint)
//!   ready: echo × 16 (5s apart) ── none answered ──► Ok(false) / Unresponsive
//!   status (6 × 200ms) ──► Notify::on_status
//!   streams (per-generation token):
//!       status_stream ── Ok ──► Notify::on_status
//!                     └─ Err ─┐
//!       error_stream  ────────┼──► DebouncePool ──(100ms quiet)──► Escalator ──► Notify::on_fatal_error
//!   process exit ─────────────┘                                     (≤ 1 per generation)
//!   Notify::on_ready, Bus(NodeReady)
//!
//! Event flow:
//!   ProcessController / Escalator / Supervisor ── publish ──► Bus ──► listener ──► SubscriberSet
//! ```
//!
//! ## Example
//! ```rust,no_run
//! use std::sync::Arc;
//! use nodevisor::{Config, NodeClient, Notify, Supervisor, LogWriter};
//!
//! async fn run(client: Arc<dyn NodeClient>, ui: Arc<dyn Notify>) -> Result<(), nodevisor::SupervisorError> {
//!     let sup = Supervisor::builder(Config::default(), client, ui)
//!         .with_subscribers(vec![Arc::new(LogWriter::new())])
//!         .build();
//!
//!     if sup.start().await? {
//!         let status = sup.status().await?;
//!         println!("synced: {}", status.is_synced);
//!     }
//!     sup.shutdown().await;
//!     Ok(())
//! }
//! ```

use std::sync::{Arc, Mutex, PoisonError};

use futures::StreamExt;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::builder::SupervisorBuilder;
use super::config::Config;
use crate::client::{Endpoint, NodeClient, NodeStatus, VersionInfo};
use crate::error::SupervisorError;
use crate::escalation::{Escalator, NodeError, PoolEvent, Severity};
use crate::events::{Bus, Event, EventKind};
use crate::notify::Notify;
use crate::pool::DebouncePool;
use crate::process::ProcessController;
use crate::subscribers::SubscriberSet;

/// Background tasks owned by the supervisor.
pub(super) struct Workers {
    pub pool: JoinHandle<()>,
    pub listener: JoinHandle<()>,
    pub listener_token: CancellationToken,
}

/// Supervises one node process on behalf of a host.
pub struct Supervisor {
    cfg: Config,
    client: Arc<dyn NodeClient>,
    notifier: Arc<dyn Notify>,
    bus: Bus,
    process: ProcessController,
    escalator: Arc<Escalator>,
    faults: DebouncePool<PoolEvent>,
    runtime_token: CancellationToken,
    streams: Mutex<Option<CancellationToken>>,
    workers: Mutex<Option<Workers>>,
}

impl Supervisor {
    /// Starts building a supervisor.
    pub fn builder(
        cfg: Config,
        client: Arc<dyn NodeClient>,
        notifier: Arc<dyn Notify>,
    ) -> SupervisorBuilder {
        SupervisorBuilder::new(cfg, client, notifier)
    }

    #[allow(clippy::too_many_arguments)]
    pub(super) fn new_internal(
        cfg: Config,
        client: Arc<dyn NodeClient>,
        notifier: Arc<dyn Notify>,
        bus: Bus,
        process: ProcessController,
        escalator: Arc<Escalator>,
        faults: DebouncePool<PoolEvent>,
        runtime_token: CancellationToken,
        workers: Workers,
    ) -> Self {
        Self {
            cfg,
            client,
            notifier,
            bus,
            process,
            escalator,
            faults,
            runtime_token,
            streams: Mutex::new(None),
            workers: Mutex::new(Some(workers)),
        }
    }

    /// Forwards bus events to the subscriber set until cancelled.
    pub(super) fn subscriber_listener(
        bus: &Bus,
        set: SubscriberSet,
        token: CancellationToken,
    ) -> JoinHandle<()> {
        let mut rx = bus.subscribe();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    ev = rx.recv() => match ev {
                        Ok(ev) => set.emit(&ev),
                        Err(RecvError::Lagged(n)) => {
                            tracing::debug!(skipped = n, "event listener lagged");
                        }
                        Err(RecvError::Closed) => break,
                    },
                    _ = token.cancelled() => break,
                }
            }
            while let Ok(ev) = rx.try_recv() {
                set.emit(&ev);
            }
            set.shutdown().await;
        })
    }

    pub fn config(&self) -> &Config {
        &self.cfg
    }

    /// Event bus; subscribe for raw lifecycle events.
    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    pub fn is_running(&self) -> bool {
        self.process.is_running()
    }

    pub fn pid(&self) -> Option<u32> {
        self.process.pid()
    }

    /// Generation of the running process.
    pub fn generation(&self) -> Option<u64> {
        self.process.generation()
    }

    /// True once a fatal error was delivered for the current generation.
    pub fn is_latched(&self) -> bool {
        self.escalator.is_latched()
    }

    /// Spawns the node and waits until it is ready.
    ///
    /// `Ok(false)` if the node could not be spawned or never answered; the
    /// failure is logged and published. A node that never answered is left
    /// running: [`is_running`](Self::is_running) stays true and a further
    /// `start` fails with `AlreadyRunning`. Use [`restart`](Self::restart) to
    /// replace it. Fails with
    /// [`SupervisorError::AlreadyRunning`] while a node is running, and with
    /// [`SupervisorError::Client`] if the initial status cannot be fetched.
    pub async fn start(&self) -> Result<bool, SupervisorError> {
        match self.try_start().await {
            Ok(()) => Ok(true),
            Err(e @ (SupervisorError::AlreadyRunning { .. } | SupervisorError::Client(_))) => Err(e),
            Err(e) => {
                tracing::warn!(error = %e, label = e.as_label(), "node start failed");
                Ok(false)
            }
        }
    }

    /// Like [`start`](Self::start), but every failure is an error.
    pub async fn try_start(&self) -> Result<(), SupervisorError> {
        if let Some(pid) = self.process.pid() {
            return Err(SupervisorError::AlreadyRunning { pid });
        }

        let spawned = match self.process.spawn(&self.cfg.node, &self.cfg.log_file()).await {
            Ok(s) => s,
            Err(e) => {
                if !matches!(e, SupervisorError::AlreadyRunning { .. }) {
                    self.bus
                        .publish(Event::new(EventKind::SpawnFailed).with_reason(e.to_string()));
                }
                return Err(e);
            }
        };
        let generation = spawned.generation;

        self.client
            .connect(&self.cfg.endpoint)
            .await
            .map_err(SupervisorError::Connect)?;

        let attempts = self.cfg.ready.attempts_clamped();
        let ready = self
            .cfg
            .ready
            .run("responsiveness wait", |attempt| async move {
                if self.client.echo().await {
                    Ok(attempt + 1)
                } else {
                    Err(())
                }
            })
            .await;
        let Ok(answered_at) = ready else {
            tracing::warn!(generation, attempts, "node did not answer");
            self.bus.publish(
                Event::new(EventKind::NodeUnresponsive)
                    .with_generation(generation)
                    .with_attempt(attempts),
            );
            return Err(SupervisorError::Unresponsive { attempts });
        };

        let token = self.renew_streams();
        self.fetch_status().await?;
        self.activate_status_stream(&token).await;
        self.activate_error_stream(&token).await;

        self.notifier.on_ready().await;
        tracing::info!(generation, pid = spawned.pid, attempt = answered_at, "node ready");
        self.bus.publish(
            Event::new(EventKind::NodeReady)
                .with_generation(generation)
                .with_pid(spawned.pid)
                .with_attempt(answered_at),
        );
        Ok(())
    }

    /// Stops the node; never fails.
    pub async fn stop(&self) {
        self.cancel_streams();
        self.process
            .stop(
                self.client.as_ref(),
                self.cfg.exit_timeout,
                self.cfg.exit_poll_clamped(),
            )
            .await;
    }

    /// Stops, then starts the node.
    ///
    /// A start that does not succeed becomes [`SupervisorError::RestartFailed`]
    /// carrying a fatal [`NodeError`].
    pub async fn restart(&self) -> Result<bool, SupervisorError> {
        tracing::info!("restarting node");
        self.stop().await;
        if self.start().await? {
            return Ok(true);
        }
        Err(SupervisorError::RestartFailed {
            error: NodeError::new(Severity::Fatal, "supervisor", "Cannot restart the node"),
        })
    }

    /// Fetches the node status with retry and forwards it to the host.
    pub async fn status(&self) -> Result<NodeStatus, SupervisorError> {
        self.fetch_status().await
    }

    /// Attaches to a node managed elsewhere; nothing is spawned.
    pub async fn connect_remote(&self, endpoint: Endpoint) -> Result<NodeStatus, SupervisorError> {
        self.client
            .connect(&endpoint)
            .await
            .map_err(SupervisorError::Connect)?;

        let token = self.renew_streams();
        let status = self.fetch_status().await?;
        self.activate_status_stream(&token).await;

        tracing::info!(%endpoint, "connected to remote node");
        self.bus
            .publish(Event::new(EventKind::RemoteConnected).with_reason(endpoint.to_string()));
        Ok(status)
    }

    pub async fn version_and_build(&self) -> Result<VersionInfo, SupervisorError> {
        let version = self.client.version().await?;
        let build = self.client.build().await?;
        Ok(VersionInfo { version, build })
    }

    /// Reports an error found by another collaborator; it is escalated like
    /// errors the node pushes.
    pub fn push_error(&self, err: NodeError) {
        self.faults.push(err.into());
    }

    /// Stops the node and the background workers.
    ///
    /// Pending faults are reduced before the workers exit. Idempotent.
    pub async fn shutdown(&self) {
        self.stop().await;
        self.runtime_token.cancel();

        let workers = self
            .workers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(w) = workers {
            let _ = w.pool.await;
            w.listener_token.cancel();
            let _ = w.listener.await;
        }
    }

    async fn fetch_status(&self) -> Result<NodeStatus, SupervisorError> {
        let status = self
            .cfg
            .status_retry
            .run("status", |_| self.client.status())
            .await?;
        self.notifier.on_status(&status).await;
        Ok(status)
    }

    /// Cancels the previous generation's streams and returns a fresh token.
    fn renew_streams(&self) -> CancellationToken {
        let token = self.runtime_token.child_token();
        let prev = self
            .streams
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(token.clone());
        if let Some(prev) = prev {
            prev.cancel();
        }
        token
    }

    fn cancel_streams(&self) {
        let prev = self
            .streams
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(prev) = prev {
            prev.cancel();
        }
    }

    async fn activate_status_stream(&self, token: &CancellationToken) {
        let mut stream = match self.client.status_stream().await {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!(error = %e, label = e.as_label(), "status stream unavailable");
                return;
            }
        };
        let notifier = Arc::clone(&self.notifier);
        let faults = self.faults.clone();
        let token = token.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    item = stream.next() => match item {
                        Some(Ok(status)) => notifier.on_status(&status).await,
                        Some(Err(err)) => faults.push(err.into()),
                        None => {
                            tracing::debug!("status stream ended");
                            break;
                        }
                    },
                }
            }
        });
    }

    async fn activate_error_stream(&self, token: &CancellationToken) {
        let mut stream = match self.client.error_stream().await {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!(error = %e, label = e.as_label(), "error stream unavailable");
                return;
            }
        };
        let faults = self.faults.clone();
        let token = token.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    item = stream.next() => match item {
                        Some(err) => faults.push(err.into()),
                        None => {
                            tracing::debug!("error stream ended");
                            break;
                        }
                    },
                }
            }
        });
    }
}
