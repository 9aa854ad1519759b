//! Main Coordinator task implementation

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};
use volumestore::KvStore;

use crate::delivery::{DeliveryConfig, DeliveryQueue, TabPort};
use crate::domain::{TabId, TabPhase};
use crate::state::{HydrateSummary, Persister, StateCache};

use super::config::CoordinatorConfig;
use super::handle::CoordinatorHandle;
use super::messages::{CoordEvent, CoordRequest, CoordinatorError, CoordinatorMetrics};

/// What the coordinator knows about one open tab
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(super) struct TrackedTab {
    pub phase: TabPhase,
    /// Normalized page address, when the page has one worth remembering
    pub address: Option<String>,
}

/// Owns all volume state and mediates between the browser and its pages
///
/// Every request, lifecycle notification and timer tick is processed by one
/// task in arrival order.
pub struct Coordinator {
    pub(super) config: CoordinatorConfig,
    pub(super) delivery: DeliveryConfig,
    tx: mpsc::Sender<CoordRequest>,
    rx: mpsc::Receiver<CoordRequest>,
    store: Arc<dyn KvStore>,
    pub(super) port: Arc<dyn TabPort>,
    pub(super) cache: StateCache,
    pub(super) queue: DeliveryQueue,
    pub(super) tabs: HashMap<TabId, TrackedTab>,
    events: broadcast::Sender<CoordEvent>,
    pub(super) metrics: CoordinatorMetrics,
}

impl Coordinator {
    /// Create a coordinator over an injected store and tab port
    pub fn new(
        config: CoordinatorConfig,
        delivery: DeliveryConfig,
        store: Arc<dyn KvStore>,
        port: Arc<dyn TabPort>,
    ) -> Self {
        debug!(?config, ?delivery, "Coordinator::new: called");
        let (tx, rx) = mpsc::channel(config.channel_buffer.max(1));
        let (events, _) = broadcast::channel(config.event_buffer.max(1));
        let cache = StateCache::new(Persister::spawn(store.clone()));
        let queue = DeliveryQueue::new(delivery.policy());
        Self {
            config,
            delivery,
            tx,
            rx,
            store,
            port,
            cache,
            queue,
            tabs: HashMap::new(),
            events,
            metrics: CoordinatorMetrics::default(),
        }
    }

    /// Hydrate the cache from the durable store
    pub async fn init(&mut self) -> Result<HydrateSummary, CoordinatorError> {
        debug!("Coordinator::init: called");
        let summary = self.cache.hydrate(self.store.as_ref()).await?;
        Ok(summary)
    }

    /// Create a handle for feeding this coordinator
    pub fn handle(&self) -> CoordinatorHandle {
        CoordinatorHandle::new(self.tx.clone(), self.events.clone())
    }

    /// Run on a new task, returning its handle and join handle
    pub fn spawn(self) -> (CoordinatorHandle, JoinHandle<()>) {
        let handle = self.handle();
        let join = tokio::spawn(self.run());
        (handle, join)
    }

    /// Run the Coordinator task
    ///
    /// This consumes the Coordinator and runs until shutdown is requested.
    /// Pending durable writes are flushed before returning.
    pub async fn run(mut self) {
        info!(
            extension_id = %self.config.extension_id,
            sweep_interval = ?self.delivery.sweep_interval(),
            "Coordinator started"
        );

        let mut sweep = tokio::time::interval(self.delivery.sweep_interval());
        sweep.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // first tick completes immediately
        sweep.tick().await;

        loop {
            tokio::select! {
                req = self.rx.recv() => match req {
                    Some(CoordRequest::Shutdown) | None => {
                        debug!("Coordinator::run: shutdown requested");
                        break;
                    }
                    Some(req) => self.dispatch(req).await,
                },
                _ = sweep.tick() => self.sweep().await,
            }
        }

        self.cache.persister().flush().await;
        info!(metrics = ?self.snapshot_metrics(), "Coordinator stopped");
    }

    async fn dispatch(&mut self, req: CoordRequest) {
        match req {
            CoordRequest::Message { sender, message, reply } => {
                let response = self.handle_message(sender, message).await;
                let _ = reply.send(response.map(|r| r.to_value()));
            }

            CoordRequest::TabEvent { event } => {
                self.handle_tab_event(event).await;
            }

            CoordRequest::SettleElapsed { tab_id } => {
                self.settle_elapsed(tab_id).await;
            }

            CoordRequest::Sweep => {
                self.sweep().await;
            }

            CoordRequest::GetMetrics { reply } => {
                let _ = reply.send(self.snapshot_metrics());
            }

            CoordRequest::Snapshot { tab_id, reply } => {
                let _ = reply.send(self.cache.lookup(tab_id).cloned());
            }

            CoordRequest::Shutdown => {}
        }
    }

    /// Broadcast a popup notification; having no listeners is fine
    pub(super) fn emit(&self, event: CoordEvent) {
        debug!(?event, "Coordinator::emit: called");
        let _ = self.events.send(event);
    }

    /// Sender for internal follow-ups such as settle timers
    pub(super) fn sender(&self) -> mpsc::Sender<CoordRequest> {
        self.tx.clone()
    }

    fn snapshot_metrics(&self) -> CoordinatorMetrics {
        let mut metrics = self.metrics.clone();
        metrics.persistence_failures = self.cache.persister().failures();
        metrics.tracked_tabs = self.tabs.len();
        metrics.audible_tabs = self.tabs.values().filter(|t| t.phase == TabPhase::Audible).count();
        metrics.pending_deliveries = self.queue.total_pending();
        metrics
    }
}
