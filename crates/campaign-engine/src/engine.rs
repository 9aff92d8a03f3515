//! The operator-facing engine: start/stop/show/delete over the bounded
//! registry, plus the event pump that reconciles telephony notifications
//! back into campaign and destination state.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::definitions::CampaignDefinitions;
use crate::error::{DialerError, Result};
use crate::events::{CallDirection, EventReceiver, TelephonyEvent};
use crate::originate::CallOriginator;
use crate::planner::DurationPlanner;
use crate::registry::{CampaignRegistry, CampaignSnapshot};
use crate::store::DestinationStore;
use crate::worker::CampaignWorker;

/// Outbound campaign engine.
///
/// Owns the campaign registry and the collaborator handles, spawns one
/// worker task per started campaign, and runs one background pump that
/// consumes telephony events and applies them to the registry and the
/// destination store. Clone-free sharing: wrap it in an `Arc` if multiple
/// control surfaces need it.
pub struct CampaignEngine {
    config: EngineConfig,
    registry: Arc<CampaignRegistry>,
    definitions: Arc<dyn CampaignDefinitions>,
    store: Arc<dyn DestinationStore>,
    originator: Arc<dyn CallOriginator>,
    pump_handle: Mutex<Option<JoinHandle<()>>>,
}

impl CampaignEngine {
    /// Build the engine and start consuming `events`.
    pub fn new(
        config: EngineConfig,
        definitions: Arc<dyn CampaignDefinitions>,
        store: Arc<dyn DestinationStore>,
        originator: Arc<dyn CallOriginator>,
        events: EventReceiver,
    ) -> Result<Self> {
        config.validate().map_err(DialerError::invalid_config)?;
        let registry = Arc::new(CampaignRegistry::new(config.max_campaigns));

        let pump = tokio::spawn(Self::event_pump(
            events,
            registry.clone(),
            store.clone(),
        ));
        info!(
            "campaign engine ready: {} slot(s), drain poll {}s",
            config.max_campaigns, config.drain_poll_secs
        );

        Ok(Self {
            config,
            registry,
            definitions,
            store,
            originator,
            pump_handle: Mutex::new(Some(pump)),
        })
    }

    /// Start the named campaign.
    ///
    /// The Load phase runs here, synchronously: definition lookup, range
    /// validation, and the idempotent store schema check all fail the start
    /// itself (`ConfigNotFound`/`CampaignNotFound`/`IncompleteConfig`/
    /// `InvalidConfig`/`Store`), releasing the slot before returning. On
    /// success the worker task is spawned and the campaign's correlation id
    /// is returned.
    pub async fn start(&self, requested_name: &str) -> Result<Uuid> {
        let (slot, correlation_id) = self.registry.allocate(requested_name)?;

        let config = match self.load_campaign(requested_name).await {
            Ok(config) => config,
            Err(e) => {
                // Failed Load absorbs straight into Terminated.
                self.registry.finish(slot);
                warn!("campaign '{}' failed to start: {}", requested_name, e);
                return Err(e);
            }
        };
        let config = Arc::new(config);
        self.registry.install_config(slot, config.clone());
        info!(
            "campaign '{}' loaded: display name '{}', starts at {}, {} max concurrent",
            requested_name, config.name, config.start_at, config.max_concurrent_calls
        );

        let planner = match self.config.rng_seed {
            Some(seed) => DurationPlanner::with_seed(seed.wrapping_add(slot as u64)),
            None => DurationPlanner::new(),
        };
        let worker = CampaignWorker {
            slot,
            requested_name: requested_name.to_string(),
            correlation_id,
            config,
            registry: self.registry.clone(),
            store: self.store.clone(),
            originator: self.originator.clone(),
            planner,
            drain_poll: Duration::from_secs(self.config.drain_poll_secs),
        };
        tokio::spawn(worker.run());
        Ok(correlation_id)
    }

    async fn load_campaign(&self, requested_name: &str) -> Result<crate::config::CampaignConfig> {
        let config = self.definitions.load(requested_name).await?;
        config.validate().map_err(DialerError::invalid_config)?;
        self.store.ensure_schema(&config.destination_table).await?;
        Ok(config)
    }

    /// Ask the named campaign to stop. Returns once the request is recorded;
    /// the worker drains and frees the slot on its own schedule.
    pub fn stop(&self, requested_name: &str) -> Result<()> {
        self.registry.request_stop(requested_name)?;
        info!("campaign '{}' asked to stop", requested_name);
        Ok(())
    }

    /// Snapshot one campaign.
    pub fn show(&self, requested_name: &str) -> Result<CampaignSnapshot> {
        self.registry
            .snapshot_by_name(requested_name)
            .ok_or_else(|| DialerError::not_found(requested_name))
    }

    /// Snapshot every occupied slot.
    pub fn show_all(&self) -> Vec<CampaignSnapshot> {
        self.registry.snapshot_all()
    }

    /// Remove a stopped campaign's slot. Fails with `Running` while the
    /// worker is still live; workers free their own slot on exit, so this
    /// mostly matters for slots an embedder keeps around after inspection.
    pub fn delete(&self, requested_name: &str) -> Result<()> {
        self.registry.delete(requested_name)
    }

    /// Number of occupied registry slots.
    pub fn active_campaigns(&self) -> usize {
        self.registry.occupied()
    }

    /// Request stop on every campaign and wait (bounded) for the workers to
    /// drain and exit, then stop the event pump.
    pub async fn shutdown(&self) {
        let asked = self.registry.request_stop_all();
        info!("engine shutdown: asked {} campaign(s) to stop", asked);

        let poll = Duration::from_secs(self.config.shutdown_poll_secs);
        let deadline =
            tokio::time::Instant::now() + Duration::from_secs(self.config.shutdown_timeout_secs);
        while self.registry.occupied() > 0 {
            if tokio::time::Instant::now() >= deadline {
                warn!(
                    "engine shutdown timed out with {} campaign(s) still occupied",
                    self.registry.occupied()
                );
                break;
            }
            sleep(poll).await;
        }

        if let Some(handle) = self.pump_handle.lock().take() {
            handle.abort();
            let _ = handle.await;
        }
        info!("campaign engine stopped");
    }

    /// Consume telephony events until the channel closes.
    async fn event_pump(
        mut events: EventReceiver,
        registry: Arc<CampaignRegistry>,
        store: Arc<dyn DestinationStore>,
    ) {
        while let Some(event) = events.recv().await {
            Self::reconcile(&registry, store.as_ref(), event).await;
        }
        debug!("event channel closed, reconciler pump exiting");
    }

    /// Apply one notification. Events that match no campaign, or hangups of
    /// inbound legs, are dropped without effect.
    async fn reconcile(
        registry: &CampaignRegistry,
        store: &dyn DestinationStore,
        event: TelephonyEvent,
    ) {
        match event {
            TelephonyEvent::Answered { correlation_id } => {
                if registry.note_answered(correlation_id) {
                    debug!("answer reconciled for campaign {}", correlation_id);
                } else {
                    debug!("answer for unknown campaign {}, ignored", correlation_id);
                }
            }
            TelephonyEvent::HangupComplete {
                correlation_id,
                direction,
                callee_number,
                duration_seconds,
            } => {
                if direction != CallDirection::Outbound {
                    return;
                }
                let Some(table) = registry.destination_table(correlation_id) else {
                    debug!("hangup for unknown campaign {}, ignored", correlation_id);
                    return;
                };
                // The row must be released before the counters move: the
                // worker's drain exits on `current_calls == 0`, and a slot
                // freed with this release still pending could be torn down
                // mid-flight by shutdown, stranding the number as in-use.
                if let Err(e) = store.release(&table, &callee_number, false).await {
                    error!("failed to release {} in {}: {}", callee_number, table, e);
                }
                registry.apply_hangup(correlation_id, duration_seconds);
                debug!(
                    "hangup reconciled: {} talked {}s (campaign {})",
                    callee_number, duration_seconds, correlation_id
                );
            }
        }
    }
}
