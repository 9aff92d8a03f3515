//! Per-call duration planning: how long an admitted call may run before the
//! telephony collaborator schedules its hangup.

use std::fmt;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::config::CampaignConfig;
use crate::error::{DialerError, Result};
use crate::sampler::GaussianSampler;
use crate::store::DestinationRecord;

/// Auto-termination policy for one admitted call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DurationDirective {
    /// Hang up ~1s after pickup; emulates abandoned/test traffic
    EarlyCancel,
    /// No scheduled hangup
    Unlimited,
    /// Uniform draw between the campaign's min and max durations
    Fixed(u32),
    /// Duration carried on the destination row
    TableSupplied(u32),
    /// Duration drawn from the campaign's Gaussian parameters
    Gaussian(u32),
}

impl DurationDirective {
    /// Seconds the collaborator should allow before hanging up; `None` for
    /// unlimited calls. EarlyCancel maps to the 1s abandon window.
    pub fn scheduled_seconds(&self) -> Option<u32> {
        match self {
            Self::EarlyCancel => Some(1),
            Self::Unlimited => None,
            Self::Fixed(secs) | Self::TableSupplied(secs) | Self::Gaussian(secs) => Some(*secs),
        }
    }
}

impl fmt::Display for DurationDirective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EarlyCancel => write!(f, "early-cancel"),
            Self::Unlimited => write!(f, "unlimited"),
            Self::Fixed(secs) => write!(f, "fixed {secs}s"),
            Self::TableSupplied(secs) => write!(f, "table {secs}s"),
            Self::Gaussian(secs) => write!(f, "gaussian {secs}s"),
        }
    }
}

/// Decides one [`DurationDirective`] per admission.
///
/// Priority: cancel-ratio draw first; then the Gaussian branch when enabled
/// (bypassing every other mode); then the row's own duration; then
/// unlimited/uniform from the campaign bounds.
#[derive(Debug)]
pub struct DurationPlanner {
    rng: SmallRng,
    sampler: GaussianSampler,
}

impl DurationPlanner {
    /// Planner seeded from OS entropy.
    pub fn new() -> Self {
        Self {
            rng: SmallRng::from_entropy(),
            sampler: GaussianSampler::from_entropy(),
        }
    }

    /// Deterministic planner for reproducible runs.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: SmallRng::seed_from_u64(seed),
            // Decorrelate the uniform stream from the Gaussian stream.
            sampler: GaussianSampler::new(seed ^ 0x9e37_79b9_7f4a_7c15),
        }
    }

    /// Plan the duration for one admission of `record` under `config`.
    ///
    /// An enabled Gaussian mode with a zero mean or stdev is a configuration
    /// error surfaced here, per attempt; the campaign itself keeps running.
    pub fn plan(
        &mut self,
        config: &CampaignConfig,
        record: &DestinationRecord,
    ) -> Result<DurationDirective> {
        if config.cancel_ratio > 0 {
            let draw: u8 = self.rng.gen_range(0..100);
            if draw < config.cancel_ratio {
                return Ok(DurationDirective::EarlyCancel);
            }
        }

        if config.gaussian_distribution {
            if config.gaussian_mean == 0 || config.gaussian_stdev == 0 {
                return Err(DialerError::invalid_config(
                    "gaussian_distribution requires gaussian_mean > 0 and gaussian_stdev > 0",
                ));
            }
            let drawn = self.sampler.sample(
                f64::from(config.gaussian_mean),
                f64::from(config.gaussian_stdev),
            );
            // Round, and never schedule a zero/negative hangup.
            return Ok(DurationDirective::Gaussian(drawn.round().max(1.0) as u32));
        }

        if let Some(secs) = record.scheduled_duration_seconds {
            return Ok(DurationDirective::TableSupplied(secs));
        }

        if config.call_max_duration == 0 && config.call_min_duration == 0 {
            return Ok(DurationDirective::Unlimited);
        }

        let secs = self
            .rng
            .gen_range(config.call_min_duration..=config.call_max_duration);
        Ok(DurationDirective::Fixed(secs))
    }
}
