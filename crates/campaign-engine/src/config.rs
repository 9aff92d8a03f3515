use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Order in which eligible destination numbers are claimed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallingStrategy {
    /// Arbitrary/shuffled order
    Random,
    /// Stable order by number
    Sequential,
}

/// Optional extra header attached to every originated call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomHeader {
    pub name: String,
    pub value: String,
}

/// One campaign definition.
///
/// Every field except `custom_header` is mandatory: a definition source that
/// omits a field fails deserialization (`IncompleteConfig`) rather than
/// falling back to a default. Range checks live in [`validate`](Self::validate).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignConfig {
    /// Display name
    pub name: String,
    /// Scheduling window start; carried and logged, not enforced
    pub start_at: NaiveDateTime,

    /// Dialplan context for the outbound leg
    pub context: String,
    /// Dialplan type (e.g. "XML")
    pub dialplan_type: String,
    /// Extension the answered call is transferred to
    pub transfer_target: String,
    /// Action applied on answer (e.g. a transfer or application string)
    pub action_on_answer: String,

    /// Concurrency cap for in-flight calls
    pub max_concurrent_calls: u32,
    /// Seconds between admission cycles
    pub time_between_calls: u64,
    /// Maximum dial attempts per destination number
    pub attempts_per_number: u32,
    /// Cooldown in seconds before the same number may be retried
    pub time_between_retries: u64,

    /// When true, scheduled durations are drawn from N(mean, stdev²)
    pub gaussian_distribution: bool,
    /// Gaussian mean in seconds; must be > 0 when the distribution is enabled
    pub gaussian_mean: u32,
    /// Gaussian standard deviation in seconds; must be > 0 when enabled
    pub gaussian_stdev: u32,
    /// Lower bound for uniformly drawn call durations (0 with max=0 means unlimited)
    pub call_min_duration: u32,
    /// Upper bound for uniformly drawn call durations
    pub call_max_duration: u32,
    /// Percentage of admitted calls scheduled for near-immediate hangup
    pub cancel_ratio: u8,

    /// Campaign-wide caller id, used when a destination carries no override
    pub caller_id: String,
    /// Codec preference list passed to the originator
    pub codec_list: String,
    /// Gateway profile the call is routed through
    pub gateway_profile: String,
    /// Seconds the originator may spend setting up a call
    pub originate_timeout: u32,
    /// Optional extra header on every originated call
    #[serde(default)]
    pub custom_header: Option<CustomHeader>,

    /// Destination selection order
    pub strategy: CallingStrategy,
    /// Stop admitting once `callsMade` reaches this count; 0 means unlimited
    pub finish_on_call_count: u64,
    /// Logical table holding this campaign's destination records
    pub destination_table: String,
}

impl CampaignConfig {
    /// Validate field ranges. All-fields-present is already guaranteed by the
    /// typed struct; this covers the values themselves.
    ///
    /// `gaussian_mean`/`gaussian_stdev` are deliberately not checked here:
    /// an enabled Gaussian mode with a zero parameter is surfaced per
    /// admission attempt, not at load.
    pub fn validate(&self) -> Result<(), String> {
        if self.name.is_empty() {
            return Err("name must not be empty".to_string());
        }
        if self.destination_table.is_empty() {
            return Err("destination_table must not be empty".to_string());
        }
        if self.gateway_profile.is_empty() {
            return Err("gateway_profile must not be empty".to_string());
        }
        if self.max_concurrent_calls == 0 {
            return Err("max_concurrent_calls must be greater than 0".to_string());
        }
        if self.attempts_per_number == 0 {
            return Err("attempts_per_number must be greater than 0".to_string());
        }
        if self.cancel_ratio > 100 {
            return Err(format!(
                "cancel_ratio must be within 0-100, got {}",
                self.cancel_ratio
            ));
        }
        if self.call_min_duration > self.call_max_duration {
            return Err(format!(
                "call_min_duration ({}) exceeds call_max_duration ({})",
                self.call_min_duration, self.call_max_duration
            ));
        }
        if self.originate_timeout == 0 {
            return Err("originate_timeout must be greater than 0".to_string());
        }
        Ok(())
    }
}

/// Engine-wide settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Registry capacity: maximum concurrently occupied campaign slots
    pub max_campaigns: usize,
    /// Seconds between drain-phase checks of `currentCalls`
    pub drain_poll_secs: u64,
    /// Seconds between shutdown checks for still-occupied slots
    pub shutdown_poll_secs: u64,
    /// Upper bound in seconds for the shutdown wait
    pub shutdown_timeout_secs: u64,
    /// Fixed seed for per-campaign duration planners; None seeds from entropy
    pub rng_seed: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_campaigns: 10,        // Bounded campaign registry
            drain_poll_secs: 2,       // Drain re-check period
            shutdown_poll_secs: 2,    // Shutdown re-check period
            shutdown_timeout_secs: 60, // Give drains a minute before giving up
            rng_seed: None,           // Entropy unless tests pin it
        }
    }
}

impl EngineConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.max_campaigns == 0 {
            return Err("max_campaigns must be greater than 0".to_string());
        }
        if self.drain_poll_secs == 0 {
            return Err("drain_poll_secs must be greater than 0".to_string());
        }
        if self.shutdown_poll_secs == 0 {
            return Err("shutdown_poll_secs must be greater than 0".to_string());
        }
        if self.shutdown_timeout_secs < self.shutdown_poll_secs {
            return Err("shutdown_timeout_secs must cover at least one poll".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Well-formed config other modules' tests start from.
    pub(crate) fn base_config() -> CampaignConfig {
        CampaignConfig {
            name: "survey".to_string(),
            start_at: NaiveDateTime::parse_from_str("2026-01-05T09:00:00", "%Y-%m-%dT%H:%M:%S")
                .unwrap(),
            context: "default".to_string(),
            dialplan_type: "XML".to_string(),
            transfer_target: "9999".to_string(),
            action_on_answer: "transfer".to_string(),
            max_concurrent_calls: 2,
            time_between_calls: 1,
            attempts_per_number: 1,
            time_between_retries: 30,
            gaussian_distribution: false,
            gaussian_mean: 0,
            gaussian_stdev: 0,
            call_min_duration: 0,
            call_max_duration: 0,
            cancel_ratio: 0,
            caller_id: "1000".to_string(),
            codec_list: "PCMU,PCMA".to_string(),
            gateway_profile: "provider".to_string(),
            originate_timeout: 30,
            custom_header: None,
            strategy: CallingStrategy::Sequential,
            finish_on_call_count: 0,
            destination_table: "dest_survey".to_string(),
        }
    }

    #[test]
    fn valid_config_passes() {
        assert!(base_config().validate().is_ok());
    }

    #[test]
    fn rejects_out_of_range_fields() {
        let mut c = base_config();
        c.cancel_ratio = 101;
        assert!(c.validate().unwrap_err().contains("cancel_ratio"));

        let mut c = base_config();
        c.max_concurrent_calls = 0;
        assert!(c.validate().unwrap_err().contains("max_concurrent_calls"));

        let mut c = base_config();
        c.call_min_duration = 20;
        c.call_max_duration = 10;
        assert!(c.validate().unwrap_err().contains("call_min_duration"));

        let mut c = base_config();
        c.destination_table = String::new();
        assert!(c.validate().unwrap_err().contains("destination_table"));
    }

    #[test]
    fn gaussian_parameters_are_not_validated_at_load() {
        let mut c = base_config();
        c.gaussian_distribution = true;
        c.gaussian_mean = 0;
        c.gaussian_stdev = 0;
        // Surfaced per admission attempt instead.
        assert!(c.validate().is_ok());
    }

    #[test]
    fn missing_field_fails_deserialization() {
        let mut value = serde_json::to_value(base_config()).unwrap();
        value.as_object_mut().unwrap().remove("gateway_profile");
        let err = serde_json::from_value::<CampaignConfig>(value).unwrap_err();
        assert!(err.to_string().contains("gateway_profile"));
    }

    #[test]
    fn strategy_parses_lowercase_names() {
        let c: CallingStrategy = serde_json::from_str("\"random\"").unwrap();
        assert_eq!(c, CallingStrategy::Random);
        let c: CallingStrategy = serde_json::from_str("\"sequential\"").unwrap();
        assert_eq!(c, CallingStrategy::Sequential);
    }

    #[test]
    fn engine_defaults_validate() {
        let e = EngineConfig::default();
        assert!(e.validate().is_ok());
        assert_eq!(e.max_campaigns, 10);
    }
}
