//! Bounded campaign registry.
//!
//! A fixed-size slot table guarded by one registry-wide lock. Every mutation
//! of campaign state (allocation, lifecycle flags, counters) goes through a
//! method on [`CampaignRegistry`]; nothing else can reach slot fields. The
//! lock is coarse on purpose: campaign start/stop is rare and admission is
//! paced at human dialing speeds, so there is nothing to shard.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::CampaignConfig;
use crate::error::{DialerError, Result};

/// Where a campaign is in its lifecycle. Termination is represented by the
/// slot being freed, not by a phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CampaignPhase {
    /// Definition being read and validated, store being prepared
    Loading,
    /// Pacing loop admitting calls
    Running,
    /// No new admissions; waiting for in-flight calls to finish
    Draining,
}

impl fmt::Display for CampaignPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Loading => write!(f, "loading"),
            Self::Running => write!(f, "running"),
            Self::Draining => write!(f, "draining"),
        }
    }
}

#[derive(Debug)]
struct CampaignSlot {
    requested_name: String,
    correlation_id: Uuid,
    phase: CampaignPhase,
    running: bool,
    stop_requested: bool,
    current_calls: u32,
    calls_made: u64,
    answered: u64,
    total_seconds: u64,
    config: Option<Arc<CampaignConfig>>,
}

/// Pacing-loop view of a slot: just what the admission cycle re-reads.
#[derive(Debug, Clone, Copy)]
pub(crate) struct PacingView {
    pub(crate) stop_requested: bool,
    pub(crate) current_calls: u32,
    pub(crate) calls_made: u64,
}

/// Point-in-time copy of one occupied slot, as returned by `show`.
#[derive(Debug, Clone)]
pub struct CampaignSnapshot {
    pub slot: usize,
    pub requested_name: String,
    pub correlation_id: Uuid,
    pub phase: CampaignPhase,
    pub running: bool,
    pub stop_requested: bool,
    pub current_calls: u32,
    pub calls_made: u64,
    pub answered: u64,
    pub total_seconds: u64,
    pub config: Option<Arc<CampaignConfig>>,
}

impl fmt::Display for CampaignSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "campaign '{}' [slot {}] phase={} uuid={}",
            self.requested_name, self.slot, self.phase, self.correlation_id
        )?;
        if let Some(config) = &self.config {
            writeln!(
                f,
                "  strategy={:?} table={} gateway={}",
                config.strategy, config.destination_table, config.gateway_profile
            )?;
            writeln!(
                f,
                "  pacing: max_concurrent={} between_calls={}s attempts={} retry_cooldown={}s",
                config.max_concurrent_calls,
                config.time_between_calls,
                config.attempts_per_number,
                config.time_between_retries
            )?;
        }
        writeln!(
            f,
            "  counters: current={} made={} answered={} total_talk={}s",
            self.current_calls, self.calls_made, self.answered, self.total_seconds
        )?;
        write!(
            f,
            "  flags: running={} stop_requested={}",
            self.running, self.stop_requested
        )
    }
}

/// The bounded table of concurrently running campaigns.
pub struct CampaignRegistry {
    slots: RwLock<Vec<Option<CampaignSlot>>>,
}

impl CampaignRegistry {
    /// Registry with `capacity` slots. Capacity ≥ 1 is enforced by
    /// `EngineConfig::validate`.
    pub fn new(capacity: usize) -> Self {
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || None);
        Self {
            slots: RwLock::new(slots),
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.read().len()
    }

    /// Number of occupied slots.
    pub fn occupied(&self) -> usize {
        self.slots.read().iter().flatten().count()
    }

    /// Reserve a slot for a campaign start.
    ///
    /// The slot is immediately visible as occupied and running, so a
    /// concurrent `delete` cannot free it in the window before the worker's
    /// first instruction; the worker is the one to clear it on exit.
    pub fn allocate(&self, requested_name: &str) -> Result<(usize, Uuid)> {
        if requested_name.is_empty() {
            return Err(DialerError::invalid_config("campaign name must not be empty"));
        }
        let mut slots = self.slots.write();
        if slots
            .iter()
            .flatten()
            .any(|slot| slot.requested_name == requested_name)
        {
            return Err(DialerError::AlreadyRunning(requested_name.to_string()));
        }
        let Some(index) = slots.iter().position(Option::is_none) else {
            return Err(DialerError::CapacityExceeded(slots.len()));
        };
        let correlation_id = Uuid::new_v4();
        slots[index] = Some(CampaignSlot {
            requested_name: requested_name.to_string(),
            correlation_id,
            phase: CampaignPhase::Loading,
            running: true,
            stop_requested: false,
            current_calls: 0,
            calls_made: 0,
            answered: 0,
            total_seconds: 0,
            config: None,
        });
        debug!(
            "allocated slot {} for campaign '{}' ({})",
            index, requested_name, correlation_id
        );
        Ok((index, correlation_id))
    }

    /// Slot index of the occupied slot with this name.
    pub fn find_by_name(&self, name: &str) -> Option<usize> {
        self.slots
            .read()
            .iter()
            .position(|slot| matches!(slot, Some(s) if s.requested_name == name))
    }

    /// Slot index of the occupied slot with this correlation id.
    pub fn find_by_correlation(&self, correlation_id: Uuid) -> Option<usize> {
        self.slots
            .read()
            .iter()
            .position(|slot| matches!(slot, Some(s) if s.correlation_id == correlation_id))
    }

    /// Ask the named campaign to stop. The worker notices at its next check.
    pub fn request_stop(&self, name: &str) -> Result<()> {
        let mut slots = self.slots.write();
        match slots
            .iter_mut()
            .flatten()
            .find(|slot| slot.requested_name == name)
        {
            Some(slot) => {
                slot.stop_requested = true;
                Ok(())
            }
            None => Err(DialerError::NotFound(name.to_string())),
        }
    }

    /// Ask every occupied slot to stop; returns how many were asked.
    pub fn request_stop_all(&self) -> usize {
        let mut slots = self.slots.write();
        let mut asked = 0;
        for slot in slots.iter_mut().flatten() {
            slot.stop_requested = true;
            asked += 1;
        }
        asked
    }

    /// Remove a stopped campaign's slot. Running campaigns must be stopped
    /// first; their worker frees the slot itself on exit.
    pub fn delete(&self, name: &str) -> Result<()> {
        let mut slots = self.slots.write();
        let Some(index) = slots
            .iter()
            .position(|slot| matches!(slot, Some(s) if s.requested_name == name))
        else {
            return Err(DialerError::NotFound(name.to_string()));
        };
        if slots[index].as_ref().is_some_and(|s| s.running) {
            return Err(DialerError::Running(name.to_string()));
        }
        slots[index] = None;
        debug!("deleted campaign '{}' from slot {}", name, index);
        Ok(())
    }

    /// Snapshot one campaign by name.
    pub fn snapshot_by_name(&self, name: &str) -> Option<CampaignSnapshot> {
        let slots = self.slots.read();
        slots.iter().enumerate().find_map(|(index, slot)| {
            slot.as_ref()
                .filter(|s| s.requested_name == name)
                .map(|s| snapshot_of(index, s))
        })
    }

    /// Snapshot every occupied slot, in slot order.
    pub fn snapshot_all(&self) -> Vec<CampaignSnapshot> {
        let slots = self.slots.read();
        slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| slot.as_ref().map(|s| snapshot_of(index, s)))
            .collect()
    }

    /// Install the loaded definition and zero the counters (end of Load).
    pub(crate) fn install_config(&self, slot: usize, config: Arc<CampaignConfig>) {
        let mut slots = self.slots.write();
        if let Some(s) = slots.get_mut(slot).and_then(Option::as_mut) {
            s.current_calls = 0;
            s.calls_made = 0;
            s.answered = 0;
            s.total_seconds = 0;
            s.config = Some(config);
        }
    }

    pub(crate) fn set_phase(&self, slot: usize, phase: CampaignPhase) {
        let mut slots = self.slots.write();
        if let Some(s) = slots.get_mut(slot).and_then(Option::as_mut) {
            s.phase = phase;
        }
    }

    /// What the pacing loop re-reads at the top of each cycle. `None` when
    /// the slot is gone.
    pub(crate) fn pacing_view(&self, slot: usize) -> Option<PacingView> {
        let slots = self.slots.read();
        slots.get(slot).and_then(Option::as_ref).map(|s| PacingView {
            stop_requested: s.stop_requested,
            current_calls: s.current_calls,
            calls_made: s.calls_made,
        })
    }

    /// Count one accepted hand-off: `callsMade` and `currentCalls` both rise.
    pub(crate) fn record_admission(&self, slot: usize) {
        let mut slots = self.slots.write();
        if let Some(s) = slots.get_mut(slot).and_then(Option::as_mut) {
            s.calls_made += 1;
            s.current_calls += 1;
        }
    }

    pub(crate) fn current_calls(&self, slot: usize) -> Option<u32> {
        let slots = self.slots.read();
        slots
            .get(slot)
            .and_then(Option::as_ref)
            .map(|s| s.current_calls)
    }

    /// Worker exit: clear the slot whatever state it reached.
    pub(crate) fn finish(&self, slot: usize) {
        let mut slots = self.slots.write();
        if let Some(cell) = slots.get_mut(slot) {
            if let Some(s) = cell.take() {
                debug!(
                    "campaign '{}' left slot {} (made={} answered={})",
                    s.requested_name, slot, s.calls_made, s.answered
                );
            }
        }
    }

    /// Reconciler: an outbound call was answered.
    pub(crate) fn note_answered(&self, correlation_id: Uuid) -> bool {
        let mut slots = self.slots.write();
        match slots
            .iter_mut()
            .flatten()
            .find(|s| s.correlation_id == correlation_id)
        {
            Some(slot) => {
                slot.answered += 1;
                true
            }
            None => false,
        }
    }

    /// Destination table of the campaign owning this correlation id, if the
    /// slot is still occupied and loaded.
    pub(crate) fn destination_table(&self, correlation_id: Uuid) -> Option<String> {
        let slots = self.slots.read();
        slots
            .iter()
            .flatten()
            .find(|s| s.correlation_id == correlation_id)
            .and_then(|s| s.config.as_ref().map(|c| c.destination_table.clone()))
    }

    /// Reconciler: an outbound call completed. Decrements `currentCalls`
    /// (clamped at zero) and accumulates talk time. Returns whether a
    /// campaign matched.
    ///
    /// The worker's drain exits on `currentCalls == 0`, so the caller must
    /// finish releasing the destination row before applying this.
    pub(crate) fn apply_hangup(&self, correlation_id: Uuid, duration_secs: u64) -> bool {
        let mut slots = self.slots.write();
        let Some(slot) = slots
            .iter_mut()
            .flatten()
            .find(|s| s.correlation_id == correlation_id)
        else {
            return false;
        };
        if slot.current_calls == 0 {
            warn!(
                "hangup for campaign '{}' with no calls in flight",
                slot.requested_name
            );
        }
        slot.current_calls = slot.current_calls.saturating_sub(1);
        slot.total_seconds += duration_secs;
        true
    }

    #[cfg(test)]
    pub(crate) fn force_not_running(&self, slot: usize) {
        let mut slots = self.slots.write();
        if let Some(s) = slots.get_mut(slot).and_then(Option::as_mut) {
            s.running = false;
        }
    }
}

fn snapshot_of(index: usize, slot: &CampaignSlot) -> CampaignSnapshot {
    CampaignSnapshot {
        slot: index,
        requested_name: slot.requested_name.clone(),
        correlation_id: slot.correlation_id,
        phase: slot.phase,
        running: slot.running,
        stop_requested: slot.stop_requested,
        current_calls: slot.current_calls,
        calls_made: slot.calls_made,
        answered: slot.answered,
        total_seconds: slot.total_seconds,
        config: slot.config.clone(),
    }
}
