//! In-memory destination store used by tests, simulations, and the demo.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::config::CallingStrategy;
use crate::error::{DialerError, Result};
use crate::store::{check_table_ident, DestinationRecord, DestinationStore};

#[derive(Debug, Clone, Default)]
struct RowState {
    last_call_time: Option<DateTime<Utc>>,
    last_result: Option<String>,
    call_count: u32,
    in_use: bool,
    scheduled_duration_seconds: Option<u32>,
    caller_id_override: Option<String>,
}

type Table = DashMap<String, RowState>;

/// DashMap-backed [`DestinationStore`]. The per-entry lock taken by
/// `get_mut` makes the eligibility check and the `in_use` flip one atomic
/// step, which is all the claim contract needs.
#[derive(Debug)]
pub struct MemoryDestinationStore {
    tables: DashMap<String, Arc<Table>>,
    rng: Mutex<SmallRng>,
}

impl Default for MemoryDestinationStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDestinationStore {
    pub fn new() -> Self {
        Self {
            tables: DashMap::new(),
            rng: Mutex::new(SmallRng::from_entropy()),
        }
    }

    /// Store whose Random-strategy shuffles replay deterministically.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            tables: DashMap::new(),
            rng: Mutex::new(SmallRng::seed_from_u64(seed)),
        }
    }

    /// Seed a plain destination row (no overrides). Rows start never-called.
    pub fn add_number(&self, table: &str, number: &str) -> Result<()> {
        self.add_number_with(table, number, None, None)
    }

    /// Seed a destination row with optional per-row caller id and duration.
    pub fn add_number_with(
        &self,
        table: &str,
        number: &str,
        caller_id_override: Option<&str>,
        scheduled_duration_seconds: Option<u32>,
    ) -> Result<()> {
        let rows = self.table(table)?;
        rows.insert(
            number.to_string(),
            RowState {
                caller_id_override: caller_id_override.map(str::to_string),
                scheduled_duration_seconds: scheduled_duration_seconds.filter(|s| *s > 0),
                ..RowState::default()
            },
        );
        Ok(())
    }

    /// Read back one row; test and inspection helper.
    pub fn lookup(&self, table: &str, number: &str) -> Result<Option<DestinationRecord>> {
        let rows = self.table(table)?;
        Ok(rows.get(number).map(|row| to_record(number, row.value())))
    }

    fn table(&self, table: &str) -> Result<Arc<Table>> {
        self.tables
            .get(table)
            .map(|t| t.value().clone())
            .ok_or_else(|| DialerError::store(format!("no such table: {table}")))
    }
}

fn to_record(number: &str, row: &RowState) -> DestinationRecord {
    DestinationRecord {
        number: number.to_string(),
        last_call_time: row.last_call_time,
        last_result: row.last_result.clone(),
        call_count: row.call_count,
        in_use: row.in_use,
        scheduled_duration_seconds: row.scheduled_duration_seconds,
        caller_id_override: row.caller_id_override.clone(),
    }
}

#[async_trait]
impl DestinationStore for MemoryDestinationStore {
    async fn ensure_schema(&self, table: &str) -> Result<()> {
        check_table_ident(table)?;
        self.tables
            .entry(table.to_string())
            .or_insert_with(|| Arc::new(DashMap::new()));
        Ok(())
    }

    async fn select_and_claim(
        &self,
        table: &str,
        strategy: CallingStrategy,
        attempts_per_number: u32,
        retry_window: Duration,
    ) -> Result<Option<DestinationRecord>> {
        let rows = self.table(table)?;
        let cutoff = Utc::now() - ChronoDuration::seconds(retry_window.as_secs() as i64);

        let mut numbers: Vec<String> = rows.iter().map(|e| e.key().clone()).collect();
        match strategy {
            CallingStrategy::Sequential => numbers.sort(),
            CallingStrategy::Random => numbers.shuffle(&mut *self.rng.lock()),
        }

        for number in numbers {
            // get_mut holds the entry lock across check and claim.
            if let Some(mut row) = rows.get_mut(&number) {
                if row.in_use || row.call_count >= attempts_per_number {
                    continue;
                }
                if let Some(last) = row.last_call_time {
                    if last >= cutoff {
                        continue;
                    }
                }
                row.in_use = true;
                return Ok(Some(to_record(&number, row.value())));
            }
        }
        Ok(None)
    }

    async fn release(&self, table: &str, number: &str, mark_in_use: bool) -> Result<()> {
        let rows = self.table(table)?;
        match rows.get_mut(number) {
            Some(mut row) => {
                row.in_use = mark_in_use;
                row.last_call_time = Some(Utc::now());
                Ok(())
            }
            None => Err(DialerError::store(format!(
                "release of unknown number {number} in {table}"
            ))),
        }
    }

    async fn bump_call_count(&self, table: &str, number: &str) -> Result<()> {
        let rows = self.table(table)?;
        match rows.get_mut(number) {
            Some(mut row) => {
                row.call_count += 1;
                Ok(())
            }
            None => Err(DialerError::store(format!(
                "attempt bump for unknown number {number} in {table}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: &str = "dest_test";

    async fn seeded(numbers: &[&str]) -> MemoryDestinationStore {
        let store = MemoryDestinationStore::new();
        store.ensure_schema(TABLE).await.unwrap();
        for n in numbers {
            store.add_number(TABLE, n).unwrap();
        }
        store
    }

    #[tokio::test]
    async fn claim_marks_in_use_until_release() {
        let store = seeded(&["100"]).await;

        let record = store
            .select_and_claim(TABLE, CallingStrategy::Sequential, 3, Duration::from_secs(0))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.number, "100");
        assert!(record.in_use);

        // Claimed row is off the table for everyone else.
        let second = store
            .select_and_claim(TABLE, CallingStrategy::Sequential, 3, Duration::from_secs(0))
            .await
            .unwrap();
        assert!(second.is_none());

        store.release(TABLE, "100", false).await.unwrap();
        let row = store.lookup(TABLE, "100").unwrap().unwrap();
        assert!(!row.in_use);
        assert!(row.last_call_time.is_some());
    }

    #[tokio::test]
    async fn sequential_strategy_claims_in_number_order() {
        let store = seeded(&["300", "100", "200"]).await;
        let mut order = Vec::new();
        for _ in 0..3 {
            let record = store
                .select_and_claim(TABLE, CallingStrategy::Sequential, 1, Duration::from_secs(0))
                .await
                .unwrap()
                .unwrap();
            order.push(record.number);
        }
        assert_eq!(order, vec!["100", "200", "300"]);
    }

    #[tokio::test]
    async fn random_strategy_claims_each_number_once() {
        let store = seeded(&["a1", "a2", "a3", "a4"]).await;
        let mut seen = std::collections::HashSet::new();
        for _ in 0..4 {
            let record = store
                .select_and_claim(TABLE, CallingStrategy::Random, 1, Duration::from_secs(0))
                .await
                .unwrap()
                .unwrap();
            assert!(seen.insert(record.number));
        }
        assert!(store
            .select_and_claim(TABLE, CallingStrategy::Random, 1, Duration::from_secs(0))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn attempt_cap_removes_number_from_rotation() {
        let store = seeded(&["100"]).await;
        store.bump_call_count(TABLE, "100").await.unwrap();
        store.bump_call_count(TABLE, "100").await.unwrap();

        let claimed = store
            .select_and_claim(TABLE, CallingStrategy::Sequential, 2, Duration::from_secs(0))
            .await
            .unwrap();
        assert!(claimed.is_none());

        let claimed = store
            .select_and_claim(TABLE, CallingStrategy::Sequential, 3, Duration::from_secs(0))
            .await
            .unwrap();
        assert!(claimed.is_some());
    }

    #[tokio::test]
    async fn retry_cooldown_excludes_recent_completions() {
        let store = seeded(&["100"]).await;

        let _ = store
            .select_and_claim(TABLE, CallingStrategy::Sequential, 5, Duration::from_secs(30))
            .await
            .unwrap()
            .unwrap();
        store.release(TABLE, "100", false).await.unwrap();

        // Just released: inside the 30s window.
        let claimed = store
            .select_and_claim(TABLE, CallingStrategy::Sequential, 5, Duration::from_secs(30))
            .await
            .unwrap();
        assert!(claimed.is_none());

        // A zero window makes it immediately eligible again.
        let claimed = store
            .select_and_claim(TABLE, CallingStrategy::Sequential, 5, Duration::from_secs(0))
            .await
            .unwrap();
        assert!(claimed.is_some());
    }

    #[tokio::test]
    async fn seeded_stores_shuffle_identically() {
        let mut orders = Vec::new();
        for _ in 0..2 {
            let store = MemoryDestinationStore::with_seed(42);
            store.ensure_schema(TABLE).await.unwrap();
            for n in ["b2", "a1", "d4", "c3", "e5"] {
                store.add_number(TABLE, n).unwrap();
            }
            let mut order = Vec::new();
            while let Some(record) = store
                .select_and_claim(TABLE, CallingStrategy::Random, 1, Duration::from_secs(0))
                .await
                .unwrap()
            {
                order.push(record.number);
            }
            assert_eq!(order.len(), 5);
            orders.push(order);
        }
        assert_eq!(orders[0], orders[1]);
    }

    #[tokio::test]
    async fn per_row_fields_survive_the_claim() {
        let store = MemoryDestinationStore::new();
        store.ensure_schema(TABLE).await.unwrap();
        store
            .add_number_with(TABLE, "100", Some("2000"), Some(45))
            .unwrap();

        let record = store
            .select_and_claim(TABLE, CallingStrategy::Sequential, 1, Duration::from_secs(0))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.caller_id_override.as_deref(), Some("2000"));
        assert_eq!(record.scheduled_duration_seconds, Some(45));
    }

    #[tokio::test]
    async fn unknown_table_is_a_store_error() {
        let store = MemoryDestinationStore::new();
        let err = store
            .select_and_claim("missing", CallingStrategy::Random, 1, Duration::from_secs(0))
            .await
            .unwrap_err();
        assert!(matches!(err, DialerError::Store(_)));
    }
}
