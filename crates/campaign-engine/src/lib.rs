//! # Outbound Campaign Engine for RDIAL
//!
//! This crate is the predictive/progressive outbound-calling core of the
//! rdial stack: given a named campaign definition and a pool of destination
//! numbers, it selects eligible numbers, paces call originations up to a
//! concurrency cap, plans a per-call auto-hangup policy, and reconciles
//! answer/hangup notifications back into campaign and per-number state while
//! several campaigns run side by side.
//!
//! ## Architecture
//!
//! - [`engine`]: Operator surface (start/stop/show/delete/shutdown) and the
//!   event reconciler pump
//! - [`registry`]: Bounded slot table of running campaigns behind one lock,
//!   each driven by a per-campaign lifecycle task (Running, Draining, release)
//! - [`store`]: Destination claim/release contract with SQLite and in-memory
//!   implementations
//! - [`planner`]: Per-call duration directive (early-cancel, unlimited,
//!   fixed, table-supplied, Gaussian)
//! - [`sampler`]: Seeded polar Box-Muller normal generator
//! - [`definitions`]: Campaign definition sources (JSON file, in-memory)
//! - [`originate`]: Dial hand-off contract plus a loopback simulator
//! - [`events`]: Telephony notification types and their channel
//!
//! The telephony stack itself is out of scope: the engine talks to it only
//! through the [`originate::CallOriginator`] trait and the event channel.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use rdial_campaign_engine::prelude::*;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let (events_tx, events_rx) = event_channel();
//!
//!     let definitions = Arc::new(JsonFileDefinitions::new("campaigns.json"));
//!     let store = Arc::new(SqliteDestinationStore::connect("sqlite://dialer.db?mode=rwc").await?);
//!     let originator = Arc::new(LoopbackOriginator::new(events_tx));
//!
//!     let engine = CampaignEngine::new(
//!         EngineConfig::default(),
//!         definitions,
//!         store,
//!         originator,
//!         events_rx,
//!     )?;
//!
//!     let correlation_id = engine.start("survey").await?;
//!     println!("campaign started: {correlation_id}");
//!
//!     engine.shutdown().await;
//!     Ok(())
//! }
//! ```

// Core modules
pub mod config;
pub mod error;

// Campaign engine functionality
pub mod engine;
pub mod planner;
pub mod registry;
pub mod sampler;
mod worker;

// Collaborator boundaries
pub mod definitions;
pub mod events;
pub mod originate;
pub mod store;

// Re-exports for convenience
pub use config::{CampaignConfig, EngineConfig};
pub use engine::CampaignEngine;
pub use error::{DialerError, Result};

/// Common imports for embedders
pub mod prelude {
    pub use crate::config::{CallingStrategy, CampaignConfig, CustomHeader, EngineConfig};
    pub use crate::definitions::{CampaignDefinitions, JsonFileDefinitions, StaticDefinitions};
    pub use crate::engine::CampaignEngine;
    pub use crate::error::{DialerError, Result};
    pub use crate::events::{event_channel, CallDirection, EventReceiver, EventSender, TelephonyEvent};
    pub use crate::originate::{CallHandle, CallOriginator, DialRequest, LoopbackOriginator};
    pub use crate::planner::{DurationDirective, DurationPlanner};
    pub use crate::registry::{CampaignPhase, CampaignRegistry, CampaignSnapshot};
    pub use crate::sampler::GaussianSampler;
    pub use crate::store::{
        DestinationRecord, DestinationStore, MemoryDestinationStore, SqliteDestinationStore,
    };

    // Re-export commonly used external types
    pub use chrono::{DateTime, Utc};
    pub use uuid::Uuid;
}
