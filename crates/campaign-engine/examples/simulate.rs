//! Run a simulated outbound campaign end to end.
//!
//! Wires the engine with an in-memory definition source, a SQLite
//! destination store, and the loopback originator, then starts one campaign
//! and prints snapshots until it drains.
//!
//! ```bash
//! RUST_LOG=rdial_campaign_engine=debug cargo run --example simulate
//! ```

use std::sync::Arc;
use std::time::Duration;

use rdial_campaign_engine::prelude::*;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("rdial_campaign_engine=info")),
        )
        .init();

    let (events_tx, events_rx) = event_channel();

    let definitions = Arc::new(StaticDefinitions::new());
    definitions.insert(
        "survey",
        CampaignConfig {
            name: "Customer survey".to_string(),
            start_at: chrono::NaiveDateTime::parse_from_str(
                "2026-01-05T09:00:00",
                "%Y-%m-%dT%H:%M:%S",
            )?,
            context: "default".to_string(),
            dialplan_type: "XML".to_string(),
            transfer_target: "9999".to_string(),
            action_on_answer: "transfer".to_string(),
            max_concurrent_calls: 3,
            time_between_calls: 1,
            attempts_per_number: 1,
            time_between_retries: 30,
            gaussian_distribution: true,
            gaussian_mean: 8,
            gaussian_stdev: 3,
            call_min_duration: 0,
            call_max_duration: 0,
            cancel_ratio: 20,
            caller_id: "18005551000".to_string(),
            codec_list: "PCMU,PCMA".to_string(),
            gateway_profile: "provider".to_string(),
            originate_timeout: 30,
            custom_header: Some(CustomHeader {
                name: "X-Campaign".to_string(),
                value: "survey".to_string(),
            }),
            strategy: CallingStrategy::Random,
            finish_on_call_count: 0,
            destination_table: "dest_survey".to_string(),
        },
    );

    let store = Arc::new(SqliteDestinationStore::in_memory().await?);
    store.ensure_schema("dest_survey").await?;
    for i in 0..8 {
        store.add_number("dest_survey", &format!("1555000{i:04}")).await?;
    }
    // One VIP row with its own caller id and a pinned duration.
    store
        .add_number_with("dest_survey", "15559990000", Some("18005559999"), Some(5))
        .await?;

    let originator = Arc::new(LoopbackOriginator::new(events_tx));
    let engine = CampaignEngine::new(
        EngineConfig::default(),
        definitions,
        store,
        originator,
        events_rx,
    )?;

    let correlation_id = engine.start("survey").await?;
    println!("started campaign 'survey' ({correlation_id})\n");

    while let Ok(snapshot) = engine.show("survey") {
        println!("{snapshot}\n");
        tokio::time::sleep(Duration::from_secs(2)).await;
    }
    println!("campaign finished");

    engine.shutdown().await;
    Ok(())
}
