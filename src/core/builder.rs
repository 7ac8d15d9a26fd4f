use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::config::Config;
use super::supervisor::{Supervisor, Workers};
use crate::client::NodeClient;
use crate::escalation::Escalator;
use crate::events::Bus;
use crate::notify::Notify;
use crate::pool::DebouncePool;
use crate::process::ProcessController;
use crate::subscribers::{Subscribe, SubscriberSet};

/// Builder for a [`Supervisor`].
pub struct SupervisorBuilder {
    cfg: Config,
    client: Arc<dyn NodeClient>,
    notifier: Arc<dyn Notify>,
    subscribers: Vec<Arc<dyn Subscribe>>,
}

impl SupervisorBuilder {
    pub fn new(cfg: Config, client: Arc<dyn NodeClient>, notifier: Arc<dyn Notify>) -> Self {
        Self {
            cfg,
            client,
            notifier,
            subscribers: Vec::new(),
        }
    }

    /// Sets event subscribers for observability.
    ///
    /// Subscribers receive lifecycle events (spawn, exit, escalation, ...)
    /// through dedicated workers with bounded queues.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Builds the supervisor and starts its background workers.
    ///
    /// Must be called inside a tokio runtime.
    pub fn build(self) -> Arc<Supervisor> {
        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        let runtime_token = CancellationToken::new();

        let listener_token = CancellationToken::new();
        let subs = SubscriberSet::new(self.subscribers, bus.clone());
        let listener = Supervisor::subscriber_listener(&bus, subs, listener_token.clone());

        let escalator = Arc::new(Escalator::new(
            Arc::clone(&self.client),
            Arc::clone(&self.notifier),
            bus.clone(),
            self.cfg.probe,
        ));
        let (faults, pool) =
            DebouncePool::spawn(self.cfg.debounce, Arc::clone(&escalator), runtime_token.clone());
        let opener = Arc::clone(&escalator);
        let process = ProcessController::new(faults.clone(), bus.clone())
            .with_generation_hook(Arc::new(move |g| opener.begin_generation(g)));

        Arc::new(Supervisor::new_internal(
            self.cfg,
            self.client,
            self.notifier,
            bus,
            process,
            escalator,
            faults,
            runtime_token,
            Workers {
                pool,
                listener,
                listener_token,
            },
        ))
    }
}
