//! Telephony event types and the channel they travel over.
//!
//! The notification transport (or the loopback originator in simulations)
//! pushes [`TelephonyEvent`]s into an unbounded mpsc channel; the engine's
//! reconciler pump consumes them and applies the counter and store updates.
//! Reconciliation itself lives on the engine, next to the registry it
//! mutates.

use tokio::sync::mpsc;
use uuid::Uuid;

/// Which way the hung-up leg was going. Only outbound completions belong to
/// a campaign; inbound ones are somebody else's traffic and are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallDirection {
    Outbound,
    Inbound,
}

/// One asynchronous notification from the telephony collaborator, tagged
/// with the correlation id that was supplied in the dial request.
#[derive(Debug, Clone)]
pub enum TelephonyEvent {
    /// The far end picked up.
    Answered { correlation_id: Uuid },
    /// A call leg finished and its channel is gone.
    HangupComplete {
        correlation_id: Uuid,
        direction: CallDirection,
        callee_number: String,
        duration_seconds: u64,
    },
}

/// Producer half handed to the telephony collaborator.
pub type EventSender = mpsc::UnboundedSender<TelephonyEvent>;

/// Consumer half owned by the engine's reconciler pump.
pub type EventReceiver = mpsc::UnboundedReceiver<TelephonyEvent>;

/// Build the event channel connecting the telephony side to the engine.
pub fn event_channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}
