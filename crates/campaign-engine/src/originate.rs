//! Call origination collaborator: the boundary to the telephony stack.
//!
//! The pacing loop builds a [`DialRequest`] per admission and hands it to a
//! [`CallOriginator`]. A synchronous `Err` means the attempt never became a
//! call and the loop rolls the destination back; an `Ok(CallHandle)` means
//! the call is in flight and its outcome will arrive later as
//! [`TelephonyEvent`]s tagged with the request's correlation id.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::{CampaignConfig, CustomHeader};
use crate::error::Result;
use crate::events::{CallDirection, EventSender, TelephonyEvent};
use crate::planner::DurationDirective;
use crate::store::DestinationRecord;

/// Everything the telephony collaborator needs to place one call.
#[derive(Debug, Clone)]
pub struct DialRequest {
    /// Destination number being dialed
    pub number: String,
    /// Per-row override when present, else the campaign caller id
    pub caller_id: String,
    /// Optional extra header on the outbound leg
    pub custom_header: Option<CustomHeader>,
    /// Codec preference list
    pub codec_list: String,
    /// Gateway profile the call routes through
    pub gateway_profile: String,
    /// Dialplan context for the answered leg
    pub context: String,
    /// Dialplan type (e.g. "XML")
    pub dialplan_type: String,
    /// Extension the answered call is transferred to
    pub transfer_target: String,
    /// Action applied on answer
    pub action_on_answer: String,
    /// Auto-termination policy for this call
    pub duration: DurationDirective,
    /// Seconds the originator may spend on call setup
    pub originate_timeout: u32,
    /// Ties later notifications back to the campaign slot
    pub correlation_id: Uuid,
}

impl DialRequest {
    /// Assemble the request for one admission: campaign-wide settings plus
    /// the claimed row's overrides and the planned duration.
    pub fn assemble(
        config: &CampaignConfig,
        record: &DestinationRecord,
        duration: DurationDirective,
        correlation_id: Uuid,
    ) -> Self {
        Self {
            number: record.number.clone(),
            caller_id: record.effective_caller_id(&config.caller_id).to_string(),
            custom_header: config.custom_header.clone(),
            codec_list: config.codec_list.clone(),
            gateway_profile: config.gateway_profile.clone(),
            context: config.context.clone(),
            dialplan_type: config.dialplan_type.clone(),
            transfer_target: config.transfer_target.clone(),
            action_on_answer: config.action_on_answer.clone(),
            duration,
            originate_timeout: config.originate_timeout,
            correlation_id,
        }
    }
}

/// Opaque identifier for an accepted, in-flight call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallHandle(pub String);

/// The telephony side of the admission hand-off.
#[async_trait]
pub trait CallOriginator: Send + Sync {
    /// Place the call. An `Err` is a synchronous rejection: no call exists,
    /// no events will follow, and the caller must roll the attempt back.
    async fn dial(&self, request: DialRequest) -> Result<CallHandle>;
}

/// Originator that accepts every dial and plays both call legs itself:
/// an `Answered` event shortly after the hand-off and a `HangupComplete`
/// after the planned duration (compressed so simulations finish quickly).
/// Used by the demo and the integration tests to exercise the full
/// reconciliation path without a telephony stack.
pub struct LoopbackOriginator {
    events: EventSender,
    /// How long after the hand-off the simulated far end picks up.
    answer_delay: Duration,
    dialed: AtomicU64,
}

impl LoopbackOriginator {
    pub fn new(events: EventSender) -> Self {
        Self {
            events,
            answer_delay: Duration::from_millis(10),
            dialed: AtomicU64::new(0),
        }
    }

    /// How many dials were accepted so far.
    pub fn dial_count(&self) -> u64 {
        self.dialed.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl CallOriginator for LoopbackOriginator {
    async fn dial(&self, request: DialRequest) -> Result<CallHandle> {
        self.dialed.fetch_add(1, Ordering::Relaxed);
        let handle = CallHandle(format!("loopback-{}", request.number));
        debug!(
            "loopback dialing {} (caller_id={} duration={})",
            request.number, request.caller_id, request.duration
        );

        let events = self.events.clone();
        let answer_delay = self.answer_delay;
        tokio::spawn(async move {
            tokio::time::sleep(answer_delay).await;
            if events
                .send(TelephonyEvent::Answered {
                    correlation_id: request.correlation_id,
                })
                .is_err()
            {
                warn!("event channel closed before answer for {}", request.number);
                return;
            }

            // Unlimited calls hang up "immediately" in simulation; scheduled
            // ones talk for their planned seconds, one ms per second.
            let talk_seconds = u64::from(request.duration.scheduled_seconds().unwrap_or(0));
            tokio::time::sleep(Duration::from_millis(talk_seconds)).await;
            let _ = events.send(TelephonyEvent::HangupComplete {
                correlation_id: request.correlation_id,
                direction: CallDirection::Outbound,
                callee_number: request.number,
                duration_seconds: talk_seconds,
            });
        });

        Ok(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tests::base_config;
    use crate::events::event_channel;

    fn record_with(caller_id: Option<&str>) -> DestinationRecord {
        DestinationRecord {
            number: "15551234".to_string(),
            last_call_time: None,
            last_result: None,
            call_count: 0,
            in_use: true,
            scheduled_duration_seconds: None,
            caller_id_override: caller_id.map(str::to_string),
        }
    }

    #[test]
    fn assemble_prefers_the_row_caller_id() {
        let config = base_config();
        let correlation = Uuid::new_v4();
        let request = DialRequest::assemble(
            &config,
            &record_with(Some("2000")),
            DurationDirective::Unlimited,
            correlation,
        );
        assert_eq!(request.caller_id, "2000");
        assert_eq!(request.number, "15551234");
        assert_eq!(request.gateway_profile, "provider");
        assert_eq!(request.correlation_id, correlation);

        let request = DialRequest::assemble(
            &config,
            &record_with(None),
            DurationDirective::Unlimited,
            correlation,
        );
        assert_eq!(request.caller_id, "1000");
    }

    #[tokio::test]
    async fn loopback_plays_answer_then_hangup() {
        let (tx, mut rx) = event_channel();
        let originator = LoopbackOriginator::new(tx);
        let correlation = Uuid::new_v4();

        let request = DialRequest::assemble(
            &base_config(),
            &record_with(None),
            DurationDirective::Fixed(3),
            correlation,
        );
        originator.dial(request).await.unwrap();
        assert_eq!(originator.dial_count(), 1);

        match rx.recv().await.unwrap() {
            TelephonyEvent::Answered { correlation_id } => {
                assert_eq!(correlation_id, correlation)
            }
            other => panic!("expected Answered, got {other:?}"),
        }
        match rx.recv().await.unwrap() {
            TelephonyEvent::HangupComplete {
                correlation_id,
                direction,
                callee_number,
                duration_seconds,
            } => {
                assert_eq!(correlation_id, correlation);
                assert_eq!(direction, CallDirection::Outbound);
                assert_eq!(callee_number, "15551234");
                assert_eq!(duration_seconds, 3);
            }
            other => panic!("expected HangupComplete, got {other:?}"),
        }
    }
}
