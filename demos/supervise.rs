//! # Example: supervise
//!
//! Supervises a stand-in "node" (a shell script) that crashes after a couple
//! of seconds, and shows the host side of the contract.
//!
//! Shows how to:
//! - Implement [`NodeClient`] (here: an in-process stub that answers while the
//!   script runs).
//! - Implement [`Notify`] to receive status and the fatal notification.
//! - Attach a custom [`Subscribe`] next to the built-in [`LogWriter`].
//!
//! ## Flow
//! ```text
//! Supervisor::start()
//!     ├─► spawn sh -c "..."            ── NodeSpawned
//!     ├─► echo ✓                      ── NodeReady, on_ready, on_status
//!     ├─► push_error(WARNING)          ── probe ✓ → ErrorLogged
//!     └─► script exits with 3          ── NodeExited → FATAL → on_fatal_error
//! Supervisor::restart()                ── new generation, latch open again
//! Supervisor::shutdown()               ── staged stop, workers drained
//! ```
//!
//! ## Run
//! ```bash
//! RUST_LOG=nodevisor=debug cargo run --example supervise
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use nodevisor::{
    ClientError, Config, Endpoint, ErrorStream, Event, EventKind, LogWriter, NodeClient,
    NodeCommand, NodeError, NodeStatus, Notify, RetryPolicy, Severity, StatusStream, Subscribe,
    Supervisor,
};

/// Answers while `up` is set.
#[derive(Default)]
struct StubClient {
    up: AtomicBool,
}

#[async_trait]
impl NodeClient for StubClient {
    async fn connect(&self, endpoint: &Endpoint) -> Result<(), ClientError> {
        println!("[client] connect {endpoint}");
        self.up.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn echo(&self) -> bool {
        self.up.load(Ordering::SeqCst)
    }

    async fn status(&self) -> Result<NodeStatus, ClientError> {
        Ok(NodeStatus {
            connected_peers: 3,
            ..NodeStatus::default()
        })
    }

    async fn shutdown(&self) -> Result<(), ClientError> {
        self.up.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn version(&self) -> Result<String, ClientError> {
        Ok("v0.0.0-demo".into())
    }

    async fn build(&self) -> Result<String, ClientError> {
        Ok("demo".into())
    }

    async fn status_stream(&self) -> Result<StatusStream, ClientError> {
        Ok(futures::stream::pending().boxed())
    }

    async fn error_stream(&self) -> Result<ErrorStream, ClientError> {
        Ok(futures::stream::pending().boxed())
    }
}

struct ConsoleHost;

#[async_trait]
impl Notify for ConsoleHost {
    async fn on_status(&self, status: &NodeStatus) {
        println!("[host] status: peers={}", status.connected_peers);
    }

    async fn on_fatal_error(&self, err: &NodeError) {
        println!("[host] FATAL: {err} ({})", err.stack_trace());
    }

    async fn on_ready(&self) {
        println!("[host] node ready");
    }
}

/// Prints process lifecycle events only.
struct ProcessEvents;

#[async_trait]
impl Subscribe for ProcessEvents {
    async fn on_event(&self, ev: &Event) {
        match ev.kind {
            EventKind::NodeSpawned => println!(
                "[sub] spawned: gen={} pid={}",
                ev.generation.unwrap_or(0),
                ev.pid.unwrap_or(0)
            ),
            EventKind::NodeExited => println!(
                "[sub] exited:  gen={} code={:?} signal={}",
                ev.generation.unwrap_or(0),
                ev.exit_code,
                ev.signal.as_deref().unwrap_or("-")
            ),
            EventKind::NodeStopped => println!(
                "[sub] stopped: gen={} ({})",
                ev.generation.unwrap_or(0),
                ev.reason.as_deref().unwrap_or("-")
            ),
            _ => {}
        }
    }

    fn name(&self) -> &'static str {
        "process-events"
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "nodevisor=info".into()),
        )
        .init();

    let log_dir = tempfile::tempdir()?;
    let cfg = Config {
        node: NodeCommand::new("/bin/sh")
            .arg("-c")
            .arg("echo node booting; sleep 2; echo node crashing 1>&2; exit 3"),
        log_dir: log_dir.path().to_path_buf(),
        network_id: "demo".into(),
        ready: RetryPolicy::constant(5, Duration::from_millis(200)),
        exit_timeout: Duration::from_secs(2),
        exit_poll: Duration::from_millis(100),
        ..Config::default()
    };

    let client = Arc::new(StubClient::default());
    let sup = Supervisor::builder(cfg, client, Arc::new(ConsoleHost))
        .with_subscribers(vec![Arc::new(LogWriter::new()), Arc::new(ProcessEvents)])
        .build();

    if !sup.start().await? {
        anyhow::bail!("node did not come up");
    }
    let info = sup.version_and_build().await?;
    println!("[main] node {} ({})", info.version, info.build);

    sup.push_error(NodeError::new(Severity::Warning, "demo", "peer dropped"));
    tokio::time::sleep(Duration::from_secs(3)).await;
    println!("[main] latched after crash: {}", sup.is_latched());

    sup.restart().await?;
    println!("[main] restarted, latched: {}", sup.is_latched());
    tokio::time::sleep(Duration::from_millis(500)).await;

    sup.shutdown().await;
    let log = std::fs::read_to_string(sup.config().log_file())?;
    println!("[main] node log:\n{log}");
    Ok(())
}
