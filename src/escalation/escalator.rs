//! # Fault escalation.
//!
//! [`Escalator`] is the reducer of the fault pipeline. Each flushed batch of
//! [`PoolEvent`]s collapses into at most one decision, and at most one
//! fatal notification reaches the host per process generation.
//!
//! ## State
//! ```text
//!            begin_generation(g)
//!   ┌──────────────────────────────────┐
//!   ▼                                  │
//! OPEN ── Notify (CAS, same gen) ──► LATCHED ── batches dropped
//! ```
//!
//! ## Batch reduction
//! ```text
//! latched?                        → drop (ErrorSuppressed)
//! exit of current generation?     → clean: nothing; else crash error → Notify
//! otherwise                       → most severe error (first wins ties)
//!                                    └─► decide(severity, probe) loop
//! ```
//!
//! A stale generation can never latch: the compare-and-set checks the
//! generation the batch was reduced under.

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;

use super::decision::{Action, Probe, decide};
use super::fault::{ExitEvent, PoolEvent};
use super::node_error::NodeError;
use crate::client::NodeClient;
use crate::events::{Bus, Event, EventKind};
use crate::notify::Notify;
use crate::policies::RetryPolicy;
use crate::pool::{Batch, Reduce};

#[derive(Debug, Default)]
struct Latch {
    generation: u64,
    latched: bool,
}

/// Turns batches of faults into at most one host notification per generation.
pub struct Escalator {
    client: Arc<dyn NodeClient>,
    notifier: Arc<dyn Notify>,
    bus: Bus,
    probe: RetryPolicy,
    state: Mutex<Latch>,
}

impl Escalator {
    pub fn new(
        client: Arc<dyn NodeClient>,
        notifier: Arc<dyn Notify>,
        bus: Bus,
        probe: RetryPolicy,
    ) -> Self {
        Self {
            client,
            notifier,
            bus,
            probe,
            state: Mutex::new(Latch::default()),
        }
    }

    /// Opens the latch for a freshly spawned process.
    pub fn begin_generation(&self, generation: u64) {
        let mut st = self.lock();
        st.generation = generation;
        st.latched = false;
    }

    pub fn generation(&self) -> u64 {
        self.lock().generation
    }

    pub fn is_latched(&self) -> bool {
        self.lock().latched
    }

    /// Liveness probe: echo until answered or the probe budget is spent.
    pub async fn is_alive(&self) -> bool {
        self.probe.poll("liveness probe", |_| self.client.echo()).await
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Latch> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Walks the decision table for one error.
    async fn settle(&self, mut err: NodeError, generation: u64) {
        let mut probe = Probe::NotRun;
        loop {
            match decide(err.severity(), probe) {
                Action::Probe => probe = Probe::from(self.is_alive().await),
                Action::LogOnly => {
                    tracing::info!(generation, severity = %err.severity(), error = %err, "node error (node alive)");
                    self.bus.publish(
                        Event::new(EventKind::ErrorLogged)
                            .with_generation(generation)
                            .with_severity(err.severity())
                            .with_reason(err.to_string()),
                    );
                    return;
                }
                Action::Escalate => {
                    tracing::warn!(generation, severity = %err.severity(), error = %err, "node not answering; escalating");
                    self.bus.publish(
                        Event::new(EventKind::ErrorEscalated)
                            .with_generation(generation)
                            .with_severity(err.severity())
                            .with_reason(err.to_string()),
                    );
                    err = err.escalated();
                }
                Action::Notify => {
                    self.latch(err, generation).await;
                    return;
                }
            }
        }
    }

    /// Flips the latch and notifies the host; false if already latched or the
    /// generation moved on.
    async fn latch(&self, err: NodeError, generation: u64) -> bool {
        {
            let mut st = self.lock();
            if st.latched || st.generation != generation {
                tracing::debug!(generation, current = st.generation, error = %err, "latch lost");
                return false;
            }
            st.latched = true;
        }

        tracing::error!(generation, severity = %err.severity(), error = %err, "node fault");
        self.bus.publish(
            Event::new(EventKind::FatalLatched)
                .with_generation(generation)
                .with_severity(err.severity())
                .with_reason(err.to_string()),
        );
        self.notifier.on_fatal_error(&err).await;
        true
    }
}

#[async_trait]
impl Reduce<PoolEvent> for Escalator {
    async fn reduce(&self, batch: Batch<PoolEvent>) {
        let (generation, latched) = {
            let st = self.lock();
            (st.generation, st.latched)
        };

        if latched {
            tracing::debug!(generation, batch = batch.seq, dropped = batch.events.len(), "latched; batch dropped");
            self.bus.publish(
                Event::new(EventKind::ErrorSuppressed)
                    .with_generation(generation)
                    .with_attempt(u32::try_from(batch.events.len()).unwrap_or(u32::MAX)),
            );
            return;
        }

        let mut exit: Option<ExitEvent> = None;
        let mut worst: Option<NodeError> = None;
        for ev in batch.events {
            match ev {
                PoolEvent::Exit(e) if e.generation != generation => {
                    tracing::debug!(generation, stale = e.generation, "stale exit ignored");
                }
                PoolEvent::Exit(e) => {
                    exit.get_or_insert(e);
                }
                PoolEvent::Error(err) => {
                    if worst.as_ref().is_none_or(|w| err.severity() > w.severity()) {
                        worst = Some(err);
                    }
                }
            }
        }

        if let Some(exit) = exit {
            if exit.is_clean() {
                tracing::debug!(generation, "node exited cleanly");
                return;
            }
            let err = NodeError::crash(None).with_stack_trace(exit.to_string());
            self.settle(err, generation).await;
            return;
        }

        if let Some(err) = worst {
            self.settle(err, generation).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Config;
    use crate::escalation::Severity;
    use crate::testing::{MockClient, Recorder};
    use std::time::Duration;

    fn escalator(client: MockClient) -> (Escalator, Arc<MockClient>, Arc<Recorder>) {
        let client = Arc::new(client);
        let rec = Arc::new(Recorder::default());
        let esc = Escalator::new(
            client.clone(),
            rec.clone(),
            Bus::new(64),
            Config::default().probe,
        );
        esc.begin_generation(1);
        (esc, client, rec)
    }

    fn batch(events: Vec<PoolEvent>) -> Batch<PoolEvent> {
        Batch { seq: 1, events }
    }

    fn err(sev: Severity, msg: &str) -> PoolEvent {
        NodeError::new(sev, "test", msg).into()
    }

    fn exit(generation: u64, code: Option<i32>) -> PoolEvent {
        ExitEvent {
            generation,
            code,
            signal: None,
        }
        .into()
    }

    #[tokio::test(start_paused = true)]
    async fn most_severe_error_of_a_batch_notifies_once() {
        let (esc, client, rec) = escalator(MockClient::alive());

        esc.reduce(batch(vec![
            err(Severity::Info, "a"),
            err(Severity::Critical, "b"),
            err(Severity::Warning, "c"),
        ]))
        .await;

        let fatals = rec.fatals();
        assert_eq!(fatals.len(), 1);
        assert_eq!(fatals[0].severity(), Severity::Critical);
        assert_eq!(fatals[0].message(), "b");
        assert_eq!(MockClient::count(&client.echoes), 0);
        assert!(esc.is_latched());
    }

    #[tokio::test(start_paused = true)]
    async fn equal_severities_keep_the_first_seen() {
        let (esc, _client, rec) = escalator(MockClient::alive());

        esc.reduce(batch(vec![err(Severity::Fatal, "first"), err(Severity::Fatal, "second")]))
            .await;

        assert_eq!(rec.fatals()[0].message(), "first");
    }

    #[tokio::test(start_paused = true)]
    async fn latched_generation_drops_later_batches() {
        let (esc, _client, rec) = escalator(MockClient::alive());

        esc.reduce(batch(vec![err(Severity::Fatal, "one")])).await;
        esc.reduce(batch(vec![err(Severity::Fatal, "two"), exit(1, Some(1))]))
            .await;

        assert_eq!(rec.fatals().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn latched_generation_ignores_low_severity_with_dead_node() {
        let (esc, client, rec) = escalator(MockClient::alive());
        esc.reduce(batch(vec![err(Severity::Critical, "disk")])).await;
        client.set_alive(false);
        let started = tokio::time::Instant::now();

        esc.reduce(batch(vec![err(Severity::Info, "a"), err(Severity::Warning, "b")]))
            .await;

        assert_eq!(rec.fatals().len(), 1);
        assert_eq!(MockClient::count(&client.echoes), 0);
        assert_eq!(started.elapsed(), Duration::ZERO);
        assert!(esc.is_latched());
    }

    #[tokio::test(start_paused = true)]
    async fn new_generation_reopens_the_latch() {
        let (esc, _client, rec) = escalator(MockClient::alive());

        esc.reduce(batch(vec![err(Severity::Fatal, "one")])).await;
        esc.begin_generation(2);
        assert!(!esc.is_latched());
        esc.reduce(batch(vec![err(Severity::Critical, "two")])).await;

        assert_eq!(rec.fatals().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn clean_exit_is_suppressed() {
        let (esc, client, rec) = escalator(MockClient::dead());

        esc.reduce(batch(vec![exit(1, Some(0))])).await;

        assert!(rec.fatals().is_empty());
        assert!(!esc.is_latched());
        assert_eq!(MockClient::count(&client.echoes), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn crash_exit_notifies_fatal_without_probe() {
        let (esc, client, rec) = escalator(MockClient::alive());

        esc.reduce(batch(vec![exit(1, Some(1))])).await;

        let fatals = rec.fatals();
        assert_eq!(fatals.len(), 1);
        assert_eq!(fatals[0].severity(), Severity::Fatal);
        assert_eq!(fatals[0].stack_trace(), "exit code 1");
        assert_eq!(MockClient::count(&client.echoes), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn exit_decides_the_batch_over_errors() {
        let (esc, _client, rec) = escalator(MockClient::alive());

        esc.reduce(batch(vec![err(Severity::Critical, "io"), exit(1, Some(0))]))
            .await;

        assert!(rec.fatals().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn stale_exit_is_ignored() {
        let (esc, _client, rec) = escalator(MockClient::alive());
        esc.begin_generation(2);

        esc.reduce(batch(vec![exit(1, Some(137))])).await;

        assert!(rec.fatals().is_empty());
        assert!(!esc.is_latched());
    }

    #[tokio::test(start_paused = true)]
    async fn warning_with_live_node_is_logged_only() {
        let (esc, client, rec) = escalator(MockClient::alive());

        esc.reduce(batch(vec![err(Severity::Warning, "slow peer")])).await;

        assert!(rec.fatals().is_empty());
        assert!(!esc.is_latched());
        assert_eq!(MockClient::count(&client.echoes), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn warning_with_dead_node_escalates_to_fatal() {
        let (esc, client, rec) = escalator(MockClient::dead());
        let started = tokio::time::Instant::now();

        esc.reduce(batch(vec![err(Severity::Warning, "slow peer")])).await;

        let fatals = rec.fatals();
        assert_eq!(fatals.len(), 1);
        assert_eq!(fatals[0].severity(), Severity::Fatal);
        assert_eq!(fatals[0].message(), "slow peer");
        assert_eq!(MockClient::count(&client.echoes), 4);
        assert_eq!(started.elapsed(), Duration::from_millis(600));
    }

    #[tokio::test(start_paused = true)]
    async fn late_answer_within_probe_budget_counts_as_alive() {
        let (esc, client, rec) = escalator(MockClient::dead().with_script([false, true]));

        esc.reduce(batch(vec![err(Severity::Error, "hiccup")])).await;

        assert!(rec.fatals().is_empty());
        assert_eq!(MockClient::count(&client.echoes), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn generation_change_during_probe_prevents_notification() {
        let (esc, _client, rec) = escalator(MockClient::dead());
        let esc = Arc::new(esc);

        let reducing = {
            let esc = esc.clone();
            tokio::spawn(async move {
                esc.reduce(batch(vec![err(Severity::Warning, "x")])).await;
            })
        };
        tokio::time::sleep(Duration::from_millis(100)).await;
        esc.begin_generation(2);
        reducing.await.unwrap();

        assert!(rec.fatals().is_empty());
        assert!(!esc.is_latched());
    }
}
