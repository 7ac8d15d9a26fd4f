//! # Node process lifecycle.
//!
//! [`ProcessController`] owns at most one node process at a time. Each spawn
//! gets a new generation number; everything the process later reports (exit,
//! crash) is tagged with it so stale reports can be told apart.
//!
//! ## Architecture
//! ```text
//! spawn(cmd, log) ──► slot = ProcessHandle{pid, generation} ──► on_generation(g)
//!        │
//!        ├──► copy stdout ─┐
//!        ├──► copy stderr ─┴──► <log file> (append)
//!        │
//!        └──► watcher: select! { child.wait(), kill request }
//!                 │ exit
//!                 ├─► exited = true, clear slot (same generation)
//!                 └─► stopping?  yes → log only
//!                                no  → Bus(NodeExited) + pool.push(Exit)
//! ```
//!
//! ## Stop sequence
//! ```text
//! shutdown RPC ─► await_exit(20s) ─► SIGINT ─► await_exit(20s) ─► kill ─► drop handle
//!                      └ exited ──────────────────┴ exited ───────────────┘
//! ```
//!
//! ## Rules
//! - The slot lock is never held across an `.await`.
//! - `stop` is best-effort; step failures are logged and swallowed.
//! - Signals are only sent while the process is still running.

use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncRead;
use tokio::process::Child;
use tokio::sync::{Notify, watch};
use tokio::time::{self, Instant};

use super::command::NodeCommand;
use crate::client::NodeClient;
use crate::error::{ShutdownError, SupervisorError};
use crate::escalation::{ExitEvent, NodeError, PoolEvent};
use crate::events::{Bus, Event, EventKind};
use crate::pool::DebouncePool;

/// Termination stage of `stop`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// SIGINT on unix; forceful kill elsewhere.
    Interrupt,
    /// Unconditional kill.
    Kill,
}

impl Stage {
    pub fn as_label(self) -> &'static str {
        match self {
            Stage::Interrupt => "interrupt",
            Stage::Kill => "kill",
        }
    }
}

/// Identity of a freshly spawned process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Spawned {
    pub pid: u32,
    pub generation: u64,
}

/// Shared view of one running process.
#[derive(Clone)]
struct ProcessHandle {
    pid: u32,
    generation: u64,
    exited: watch::Receiver<bool>,
    kill: Arc<Notify>,
    stopping: Arc<AtomicBool>,
}

impl ProcessHandle {
    fn has_exited(&self) -> bool {
        *self.exited.borrow()
    }
}

type Slot = Arc<Mutex<Option<ProcessHandle>>>;

/// Called with each new generation before its exit can be reported.
pub type GenerationHook = Arc<dyn Fn(u64) + Send + Sync>;

fn lock(slot: &Mutex<Option<ProcessHandle>>) -> MutexGuard<'_, Option<ProcessHandle>> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Spawns, watches and stops the node process.
pub struct ProcessController {
    slot: Slot,
    generations: AtomicU64,
    faults: DebouncePool<PoolEvent>,
    bus: Bus,
    on_generation: Option<GenerationHook>,
}

impl ProcessController {
    pub fn new(faults: DebouncePool<PoolEvent>, bus: Bus) -> Self {
        Self {
            slot: Arc::new(Mutex::new(None)),
            generations: AtomicU64::new(0),
            faults,
            bus,
            on_generation: None,
        }
    }

    /// Registers `hook`, run once per spawn with the new generation, before
    /// the exit watcher starts.
    pub fn with_generation_hook(mut self, hook: GenerationHook) -> Self {
        self.on_generation = Some(hook);
        self
    }

    /// Starts the node; its stdout and stderr are appended to `log_file`.
    ///
    /// Fails with [`SupervisorError::AlreadyRunning`] while a process is held.
    pub async fn spawn(
        &self,
        command: &NodeCommand,
        log_file: &Path,
    ) -> Result<Spawned, SupervisorError> {
        if let Some(h) = lock(&self.slot).as_ref() {
            return Err(SupervisorError::AlreadyRunning { pid: h.pid });
        }

        let log = open_log(log_file)
            .await
            .map_err(|source| SupervisorError::LogFile {
                path: log_file.to_path_buf(),
                source,
            })?;

        let (mut child, handle, exited_tx) = {
            let mut slot = lock(&self.slot);
            if let Some(h) = slot.as_ref() {
                return Err(SupervisorError::AlreadyRunning { pid: h.pid });
            }
            let child = command
                .to_command()
                .spawn()
                .map_err(|source| SupervisorError::Spawn {
                    program: command.program().to_path_buf(),
                    source,
                })?;
            let generation = self.generations.fetch_add(1, Ordering::SeqCst) + 1;
            let (exited_tx, exited) = watch::channel(false);
            let handle = ProcessHandle {
                pid: child.id().unwrap_or_default(),
                generation,
                exited,
                kill: Arc::new(Notify::new()),
                stopping: Arc::new(AtomicBool::new(false)),
            };
            *slot = Some(handle.clone());
            (child, handle, exited_tx)
        };
        if let Some(hook) = &self.on_generation {
            hook(handle.generation);
        }

        if let Some(out) = child.stdout.take() {
            copy_output(out, &log, "stdout").await;
        }
        if let Some(err) = child.stderr.take() {
            copy_output(err, &log, "stderr").await;
        }

        tracing::info!(pid = handle.pid, generation = handle.generation, program = ?command.program(), "node spawned");
        self.bus.publish(
            Event::new(EventKind::NodeSpawned)
                .with_generation(handle.generation)
                .with_pid(handle.pid),
        );

        let spawned = Spawned {
            pid: handle.pid,
            generation: handle.generation,
        };
        tokio::spawn(watch_exit(
            child,
            handle,
            exited_tx,
            self.slot.clone(),
            self.faults.clone(),
            self.bus.clone(),
        ));
        Ok(spawned)
    }

    pub fn is_running(&self) -> bool {
        lock(&self.slot).is_some()
    }

    pub fn pid(&self) -> Option<u32> {
        lock(&self.slot).as_ref().map(|h| h.pid)
    }

    pub fn generation(&self) -> Option<u64> {
        lock(&self.slot).as_ref().map(|h| h.generation)
    }

    fn current(&self) -> Option<ProcessHandle> {
        lock(&self.slot).clone()
    }

    /// Asks the node to shut down through its API; does not wait.
    pub async fn request_graceful_shutdown(
        &self,
        client: &dyn NodeClient,
    ) -> Result<(), ShutdownError> {
        client.shutdown().await.map_err(ShutdownError::Rpc)
    }

    /// Waits up to `budget` for the current process to exit, checking every
    /// `poll`. True if it exited (or there is none).
    pub async fn await_exit(&self, budget: Duration, poll: Duration) -> bool {
        match self.current() {
            Some(h) => wait_for_exit(&h, budget, poll).await,
            None => true,
        }
    }

    /// Sends the given stage's signal to the current process.
    pub fn terminate(&self, stage: Stage) -> Result<(), ShutdownError> {
        match self.current() {
            Some(h) => signal(&h, stage),
            None => Ok(()),
        }
    }

    /// Stops the current process, escalating from a graceful request to a kill.
    ///
    /// Never fails; each failed step is logged. The handle is dropped at the
    /// end whatever the outcome, and the exit is not reported as a fault.
    pub async fn stop(&self, client: &dyn NodeClient, budget: Duration, poll: Duration) {
        let Some(h) = self.current() else {
            tracing::debug!("stop: no node process");
            return;
        };
        h.stopping.store(true, Ordering::SeqCst);

        tracing::info!(pid = h.pid, generation = h.generation, "stopping node");
        self.bus.publish(
            Event::new(EventKind::StopRequested)
                .with_generation(h.generation)
                .with_pid(h.pid),
        );

        if let Err(e) = self.request_graceful_shutdown(client).await {
            tracing::warn!(pid = h.pid, error = %e, label = e.as_label(), "graceful shutdown request failed");
        }

        let mut exited = wait_for_exit(&h, budget, poll).await;
        for (stage, kind) in [
            (Stage::Interrupt, EventKind::InterruptSent),
            (Stage::Kill, EventKind::KillSent),
        ] {
            if exited {
                break;
            }
            match signal(&h, stage) {
                Ok(()) => {
                    tracing::warn!(pid = h.pid, stage = stage.as_label(), "node still running; signal sent");
                    self.bus.publish(
                        Event::new(kind)
                            .with_generation(h.generation)
                            .with_pid(h.pid),
                    );
                }
                Err(e) => {
                    tracing::warn!(pid = h.pid, error = %e, label = e.as_label(), "signal failed");
                }
            }
            if stage == Stage::Interrupt {
                exited = wait_for_exit(&h, budget, poll).await;
            }
        }

        {
            let mut slot = lock(&self.slot);
            if slot.as_ref().is_some_and(|cur| cur.generation == h.generation) {
                *slot = None;
            }
        }

        let outcome = if exited { "exited" } else { "abandoned" };
        tracing::info!(pid = h.pid, generation = h.generation, outcome, "node stopped");
        self.bus.publish(
            Event::new(EventKind::NodeStopped)
                .with_generation(h.generation)
                .with_pid(h.pid)
                .with_reason(outcome),
        );
    }
}

async fn open_log(path: &Path) -> std::io::Result<File> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).await?;
    }
    OpenOptions::new().create(true).append(true).open(path).await
}

/// Appends one output pipe to the log until EOF.
async fn copy_output<R>(mut reader: R, log: &File, stream: &'static str)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let mut file = match log.try_clone().await {
        Ok(f) => f,
        Err(e) => {
            tracing::warn!(stream, error = %e, "cannot attach node output to log");
            return;
        }
    };
    tokio::spawn(async move {
        if let Err(e) = tokio::io::copy(&mut reader, &mut file).await {
            tracing::debug!(stream, error = %e, "node output copy ended");
        }
    });
}

async fn wait_for_exit(h: &ProcessHandle, budget: Duration, poll: Duration) -> bool {
    let poll = poll.max(Duration::from_millis(1));
    let deadline = Instant::now() + budget;
    loop {
        if h.has_exited() {
            return true;
        }
        let now = Instant::now();
        if now >= deadline {
            return false;
        }
        time::sleep(poll.min(deadline - now)).await;
    }
}

fn signal(h: &ProcessHandle, stage: Stage) -> Result<(), ShutdownError> {
    if h.has_exited() {
        return Ok(());
    }
    match stage {
        #[cfg(unix)]
        Stage::Interrupt => {
            let pid = libc::pid_t::try_from(h.pid).map_err(|_| ShutdownError::Signal {
                stage: stage.as_label(),
                pid: h.pid,
                source: std::io::Error::from(std::io::ErrorKind::InvalidInput),
            })?;
            // SAFETY: plain syscall on a pid we spawned and have not reaped.
            let rc = unsafe { libc::kill(pid, libc::SIGINT) };
            if rc != 0 {
                return Err(ShutdownError::Signal {
                    stage: stage.as_label(),
                    pid: h.pid,
                    source: std::io::Error::last_os_error(),
                });
            }
            Ok(())
        }
        _ => {
            h.kill.notify_one();
            Ok(())
        }
    }
}

/// Owns the child until it exits; reports the exit.
async fn watch_exit(
    mut child: Child,
    h: ProcessHandle,
    exited_tx: watch::Sender<bool>,
    slot: Slot,
    faults: DebouncePool<PoolEvent>,
    bus: Bus,
) {
    let status = loop {
        tokio::select! {
            status = child.wait() => break status,
            _ = h.kill.notified() => {
                if let Err(e) = child.start_kill() {
                    tracing::warn!(pid = h.pid, error = %e, "kill failed");
                }
            }
        }
    };

    let _ = exited_tx.send(true);
    {
        let mut slot = lock(&slot);
        if slot.as_ref().is_some_and(|cur| cur.generation == h.generation) {
            *slot = None;
        }
    }

    let stopping = h.stopping.load(Ordering::SeqCst);
    let status = match status {
        Ok(status) => status,
        Err(e) => {
            tracing::error!(pid = h.pid, generation = h.generation, error = %e, "waiting on node failed");
            if !stopping {
                faults.push(NodeError::crash(Some(&e)).into());
            }
            return;
        }
    };

    let exit = ExitEvent {
        generation: h.generation,
        code: status.code(),
        signal: exit_signal(&status),
    };
    if stopping {
        tracing::debug!(pid = h.pid, generation = h.generation, %exit, "node exited during stop");
        return;
    }

    tracing::info!(pid = h.pid, generation = h.generation, %exit, "node exited");
    bus.publish(
        Event::new(EventKind::NodeExited)
            .with_generation(h.generation)
            .with_pid(h.pid)
            .with_exit(exit.code, exit.signal.as_deref()),
    );
    faults.push(exit.into());
}

#[cfg(unix)]
fn exit_signal(status: &std::process::ExitStatus) -> Option<String> {
    use std::os::unix::process::ExitStatusExt;

    status.signal().map(|sig| match sig {
        libc::SIGINT => "SIGINT".to_string(),
        libc::SIGKILL => "SIGKILL".to_string(),
        libc::SIGTERM => "SIGTERM".to_string(),
        libc::SIGSEGV => "SIGSEGV".to_string(),
        libc::SIGABRT => "SIGABRT".to_string(),
        other => format!("signal {other}"),
    })
}

#[cfg(not(unix))]
fn exit_signal(_status: &std::process::ExitStatus) -> Option<String> {
    None
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::escalation::PoolEvent;
    use crate::pool::{Batch, ReduceFn};
    use crate::testing::MockClient;
    use tokio::sync::mpsc;
    use tokio_util::sync::CancellationToken;

    struct Fixture {
        ctl: ProcessController,
        faults: mpsc::UnboundedReceiver<Batch<PoolEvent>>,
        events: tokio::sync::broadcast::Receiver<Event>,
        dir: tempfile::TempDir,
    }

    fn fixture() -> Fixture {
        let (tx, faults) = mpsc::unbounded_channel();
        let reducer = ReduceFn::arc(move |batch: Batch<PoolEvent>| {
            let tx = tx.clone();
            async move {
                let _ = tx.send(batch);
            }
        });
        let (pool, _worker) = DebouncePool::spawn(
            Duration::from_millis(20),
            reducer,
            CancellationToken::new(),
        );
        let bus = Bus::new(64);
        let events = bus.subscribe();
        Fixture {
            ctl: ProcessController::new(pool, bus),
            faults,
            events,
            dir: tempfile::tempdir().expect("tempdir"),
        }
    }

    fn sh(script: &str) -> NodeCommand {
        NodeCommand::new("/bin/sh").arg("-c").arg(script)
    }

    async fn next_kind(rx: &mut tokio::sync::broadcast::Receiver<Event>, kind: EventKind) -> Event {
        loop {
            let ev = rx.recv().await.expect("event");
            if ev.kind == kind {
                return ev;
            }
        }
    }

    #[tokio::test]
    async fn output_is_appended_to_log() {
        let mut fx = fixture();
        let log = fx.dir.path().join("logs").join("node-log-1.txt");
        std::fs::create_dir_all(log.parent().unwrap()).unwrap();
        std::fs::write(&log, "previous run\n").unwrap();

        fx.ctl
            .spawn(&sh("echo out; echo err 1>&2"), &log)
            .await
            .expect("spawn");
        next_kind(&mut fx.events, EventKind::NodeExited).await;
        time::sleep(Duration::from_millis(100)).await;

        let text = std::fs::read_to_string(&log).unwrap();
        assert!(text.starts_with("previous run\n"));
        assert!(text.contains("out\n"));
        assert!(text.contains("err\n"));
    }

    #[tokio::test]
    async fn second_spawn_is_rejected_while_running() {
        let fx = fixture();
        let log = fx.dir.path().join("node.txt");

        let first = fx.ctl.spawn(&sh("sleep 5"), &log).await.expect("spawn");
        let err = fx.ctl.spawn(&sh("sleep 5"), &log).await.unwrap_err();

        assert!(matches!(err, SupervisorError::AlreadyRunning { pid } if pid == first.pid));
        assert_eq!(fx.ctl.generation(), Some(first.generation));
        fx.ctl
            .stop(&MockClient::alive(), Duration::from_millis(50), Duration::from_millis(10))
            .await;
    }

    #[tokio::test]
    async fn missing_executable_is_a_spawn_error() {
        let fx = fixture();
        let err = fx
            .ctl
            .spawn(&NodeCommand::new("/nonexistent/node-bin"), &fx.dir.path().join("n.txt"))
            .await
            .unwrap_err();

        assert!(matches!(err, SupervisorError::Spawn { .. }));
        assert!(!fx.ctl.is_running());
    }

    #[tokio::test]
    async fn crash_is_pushed_with_its_generation() {
        let mut fx = fixture();
        let log = fx.dir.path().join("node.txt");

        let spawned = fx.ctl.spawn(&sh("exit 3"), &log).await.expect("spawn");
        let batch = fx.faults.recv().await.expect("batch");

        match batch.events.as_slice() {
            [PoolEvent::Exit(exit)] => {
                assert_eq!(exit.generation, spawned.generation);
                assert_eq!(exit.code, Some(3));
                assert!(!exit.is_clean());
            }
            other => panic!("unexpected batch: {other:?}"),
        }
        assert!(!fx.ctl.is_running());
    }

    #[tokio::test]
    async fn generation_hook_runs_before_an_instant_exit_is_reduced() {
        let (tx, mut faults) = mpsc::unbounded_channel();
        let opened = Arc::new(AtomicU64::new(0));
        let seen = Arc::clone(&opened);
        let reducer = ReduceFn::arc(move |batch: Batch<PoolEvent>| {
            let tx = tx.clone();
            let current = seen.load(Ordering::SeqCst);
            async move {
                let _ = tx.send((current, batch));
            }
        });
        let (pool, _worker) =
            DebouncePool::spawn(Duration::ZERO, reducer, CancellationToken::new());
        let hooked = Arc::clone(&opened);
        let ctl = ProcessController::new(pool, Bus::new(16))
            .with_generation_hook(Arc::new(move |g| hooked.store(g, Ordering::SeqCst)));
        let dir = tempfile::tempdir().expect("tempdir");

        let spawned = ctl.spawn(&sh("exit 1"), &dir.path().join("node.txt")).await.expect("spawn");
        let (current, batch) = faults.recv().await.expect("batch");

        assert_eq!(current, spawned.generation);
        assert!(matches!(
            batch.events.as_slice(),
            [PoolEvent::Exit(exit)] if exit.generation == spawned.generation
        ));
    }

    #[tokio::test]
    async fn generations_increase_per_spawn() {
        let mut fx = fixture();
        let log = fx.dir.path().join("node.txt");

        let a = fx.ctl.spawn(&sh("exit 0"), &log).await.expect("spawn");
        next_kind(&mut fx.events, EventKind::NodeExited).await;
        let b = fx.ctl.spawn(&sh("exit 0"), &log).await.expect("spawn");

        assert!(b.generation > a.generation);
    }

    #[tokio::test]
    async fn interrupt_stops_a_node_ignoring_the_rpc() {
        let mut fx = fixture();
        let log = fx.dir.path().join("node.txt");
        fx.ctl.spawn(&sh("exec sleep 30"), &log).await.expect("spawn");

        fx.ctl
            .stop(&MockClient::alive(), Duration::from_millis(200), Duration::from_millis(20))
            .await;

        assert!(!fx.ctl.is_running());
        next_kind(&mut fx.events, EventKind::InterruptSent).await;
        let stopped = next_kind(&mut fx.events, EventKind::NodeStopped).await;
        assert_eq!(stopped.reason.as_deref(), Some("exited"));

        time::sleep(Duration::from_millis(100)).await;
        assert!(fx.faults.try_recv().is_err());
    }

    #[tokio::test]
    async fn kill_follows_an_ignored_interrupt() {
        let mut fx = fixture();
        let log = fx.dir.path().join("node.txt");
        fx.ctl
            .spawn(&sh("trap '' INT; sleep 30"), &log)
            .await
            .expect("spawn");
        time::sleep(Duration::from_millis(100)).await;

        fx.ctl
            .stop(&MockClient::alive(), Duration::from_millis(200), Duration::from_millis(20))
            .await;

        assert!(!fx.ctl.is_running());
        next_kind(&mut fx.events, EventKind::KillSent).await;
        time::sleep(Duration::from_millis(200)).await;
        assert!(fx.faults.try_recv().is_err());
    }

    #[tokio::test]
    async fn stop_without_process_is_a_noop() {
        let fx = fixture();
        let client = MockClient::alive();

        fx.ctl
            .stop(&client, Duration::from_millis(50), Duration::from_millis(10))
            .await;

        assert_eq!(MockClient::count(&client.shutdowns), 0);
        assert!(fx.ctl.await_exit(Duration::ZERO, Duration::ZERO).await);
        assert!(fx.ctl.terminate(Stage::Kill).is_ok());
    }
}
