//! Per-campaign worker task: the lifecycle state machine and the
//! pacing/admission loop.
//!
//! One worker runs per occupied registry slot. The engine performs the Load
//! phase before spawning (so `start` can report config and store failures
//! synchronously); the worker owns everything after that: Running, Draining,
//! and the final slot release. Stop is cooperative: the worker polls the
//! slot's `stop_requested` flag at the top of each cycle and between
//! admissions, and never preempts an admitted call.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::CampaignConfig;
use crate::originate::{CallOriginator, DialRequest};
use crate::planner::DurationPlanner;
use crate::registry::{CampaignPhase, CampaignRegistry};
use crate::store::DestinationStore;

/// Why the pacing loop ended; determines logging only, every exit drains.
enum PacingEnd {
    StopRequested,
    FinishCountReached,
    Exhausted,
    StoreFailed,
    SlotGone,
}

pub(crate) struct CampaignWorker {
    pub(crate) slot: usize,
    pub(crate) requested_name: String,
    pub(crate) correlation_id: Uuid,
    pub(crate) config: Arc<CampaignConfig>,
    pub(crate) registry: Arc<CampaignRegistry>,
    pub(crate) store: Arc<dyn DestinationStore>,
    pub(crate) originator: Arc<dyn CallOriginator>,
    pub(crate) planner: DurationPlanner,
    pub(crate) drain_poll: Duration,
}

impl CampaignWorker {
    /// Run the campaign to completion and free the slot. The slot is
    /// released on every exit path; this is the only place that does it.
    pub(crate) async fn run(mut self) {
        self.registry.set_phase(self.slot, CampaignPhase::Running);
        info!(
            "campaign '{}' running ({}): table={} strategy={:?} max_concurrent={}",
            self.requested_name,
            self.correlation_id,
            self.config.destination_table,
            self.config.strategy,
            self.config.max_concurrent_calls
        );

        let end = self.pace().await;
        match end {
            PacingEnd::StopRequested => {
                info!("campaign '{}' stop requested, draining", self.requested_name)
            }
            PacingEnd::FinishCountReached => info!(
                "campaign '{}' reached its finish count of {}, draining",
                self.requested_name, self.config.finish_on_call_count
            ),
            PacingEnd::Exhausted => info!(
                "campaign '{}' has no more eligible destinations, draining",
                self.requested_name
            ),
            PacingEnd::StoreFailed => warn!(
                "campaign '{}' aborting on a destination store failure, draining",
                self.requested_name
            ),
            PacingEnd::SlotGone => {}
        }

        if !matches!(end, PacingEnd::SlotGone) {
            self.drain().await;
        }
        self.registry.finish(self.slot);
    }

    /// The admission loop. Returns when the campaign should drain.
    async fn pace(&mut self) -> PacingEnd {
        let between_calls = Duration::from_secs(self.config.time_between_calls);
        loop {
            let Some(view) = self.registry.pacing_view(self.slot) else {
                return PacingEnd::SlotGone;
            };
            if view.stop_requested {
                return PacingEnd::StopRequested;
            }
            if self.config.finish_on_call_count > 0
                && view.calls_made >= self.config.finish_on_call_count
            {
                return PacingEnd::FinishCountReached;
            }

            if view.current_calls < self.config.max_concurrent_calls {
                match self.admit_one().await {
                    Admission::Placed | Admission::AttemptFailed => {}
                    Admission::Exhausted => return PacingEnd::Exhausted,
                    Admission::StoreFailed => return PacingEnd::StoreFailed,
                }
            }
            // One pacing sleep per cycle, whatever the cycle did.
            sleep(between_calls).await;
        }
    }

    /// Claim, plan, and hand off a single call.
    async fn admit_one(&mut self) -> Admission {
        let table = &self.config.destination_table;
        let record = match self
            .store
            .select_and_claim(
                table,
                self.config.strategy,
                self.config.attempts_per_number,
                Duration::from_secs(self.config.time_between_retries),
            )
            .await
        {
            Ok(Some(record)) => record,
            Ok(None) => return Admission::Exhausted,
            Err(e) => {
                error!("campaign '{}' claim failed: {}", self.requested_name, e);
                return Admission::StoreFailed;
            }
        };

        let duration = match self.planner.plan(&self.config, &record) {
            Ok(duration) => duration,
            Err(e) => {
                warn!(
                    "campaign '{}' cannot plan a duration for {}: {}",
                    self.requested_name, record.number, e
                );
                self.rollback(&record.number).await;
                return Admission::AttemptFailed;
            }
        };

        let request = DialRequest::assemble(&self.config, &record, duration, self.correlation_id);
        debug!(
            "campaign '{}' dialing {} as {} ({})",
            self.requested_name, request.number, request.caller_id, request.duration
        );

        match self.originator.dial(request).await {
            Ok(handle) => {
                // Counters move only once the originator has the call.
                self.registry.record_admission(self.slot);
                if let Err(e) = self.store.bump_call_count(table, &record.number).await {
                    error!(
                        "campaign '{}' could not record the attempt on {}: {}",
                        self.requested_name, record.number, e
                    );
                    return Admission::StoreFailed;
                }
                debug!(
                    "campaign '{}' placed {} ({:?})",
                    self.requested_name, record.number, handle
                );
                Admission::Placed
            }
            Err(e) => {
                warn!(
                    "campaign '{}' origination to {} rejected: {}",
                    self.requested_name, record.number, e
                );
                self.rollback(&record.number).await;
                Admission::AttemptFailed
            }
        }
    }

    /// Put a claimed number back after a failed attempt. The release stamps
    /// `last_call_time`, so the number sits out the retry cooldown instead
    /// of being re-claimed in the very next cycle.
    async fn rollback(&self, number: &str) {
        if let Err(e) = self
            .store
            .release(&self.config.destination_table, number, false)
            .await
        {
            error!(
                "campaign '{}' failed to roll back claim on {}: {}",
                self.requested_name, number, e
            );
        }
    }

    /// No new admissions; wait for in-flight calls to complete.
    async fn drain(&self) {
        self.registry.set_phase(self.slot, CampaignPhase::Draining);
        loop {
            match self.registry.current_calls(self.slot) {
                Some(0) | None => break,
                Some(in_flight) => {
                    debug!(
                        "campaign '{}' draining, {} call(s) in flight",
                        self.requested_name, in_flight
                    );
                    sleep(self.drain_poll).await;
                }
            }
        }
        info!("campaign '{}' drained", self.requested_name);
    }
}

enum Admission {
    /// Hand-off accepted; counters moved.
    Placed,
    /// Claim rolled back; nothing counted.
    AttemptFailed,
    /// No eligible destination remains.
    Exhausted,
    /// The store itself failed; the campaign cannot continue.
    StoreFailed,
}
