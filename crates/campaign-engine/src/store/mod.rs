//! Destination store collaborator: eligibility, claim, and release over a
//! campaign's number pool.
//!
//! Two implementations ship with the engine: [`SqliteDestinationStore`] for
//! real deployments and [`MemoryDestinationStore`] for tests and simulations.
//! Rows are pre-populated externally; the engine never creates or deletes
//! destination records through the [`DestinationStore`] contract.

pub mod memory;
pub mod sqlite;

pub use memory::MemoryDestinationStore;
pub use sqlite::SqliteDestinationStore;

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::config::CallingStrategy;
use crate::error::{DialerError, Result};

/// One dialable number and its retry/eligibility state
#[derive(Debug, Clone)]
pub struct DestinationRecord {
    /// Unique key within the table
    pub number: String,
    /// Completion time of the most recent attempt
    pub last_call_time: Option<DateTime<Utc>>,
    /// Outcome written by external tooling; carried through, never written here
    pub last_result: Option<String>,
    /// Attempts made so far
    pub call_count: u32,
    /// True while the number is between claim and release
    pub in_use: bool,
    /// Per-row scheduled call duration override (always non-zero when present)
    pub scheduled_duration_seconds: Option<u32>,
    /// Per-row caller id override
    pub caller_id_override: Option<String>,
}

impl DestinationRecord {
    /// Caller id to dial with: the row override when present and non-empty,
    /// otherwise the campaign-wide caller id.
    pub fn effective_caller_id<'a>(&'a self, global: &'a str) -> &'a str {
        match self.caller_id_override.as_deref() {
            Some(cid) if !cid.is_empty() => cid,
            _ => global,
        }
    }
}

/// Store operations the engine relies on.
///
/// A number is eligible for selection iff `in_use` is false, `call_count <
/// attempts_per_number`, and its last call (if any) ended more than
/// `retry_window` ago.
#[async_trait]
pub trait DestinationStore: Send + Sync {
    /// Idempotently create the table backing a campaign.
    async fn ensure_schema(&self, table: &str) -> Result<()>;

    /// Pick one eligible row in `strategy` order and mark it `in_use` in the
    /// same atomic operation, so concurrent claimers (including other
    /// campaigns sharing the table) can never take the same number. Returns
    /// `None` when nothing qualifies.
    async fn select_and_claim(
        &self,
        table: &str,
        strategy: CallingStrategy,
        attempts_per_number: u32,
        retry_window: Duration,
    ) -> Result<Option<DestinationRecord>>;

    /// Set `in_use` to `mark_in_use` and stamp `last_call_time = now`.
    /// Both the completion path and claim rollbacks go through here, so a
    /// failed attempt still starts the retry cooldown.
    async fn release(&self, table: &str, number: &str, mark_in_use: bool) -> Result<()>;

    /// Increment the attempt counter after a successful origination hand-off.
    async fn bump_call_count(&self, table: &str, number: &str) -> Result<()>;
}

/// Table names are interpolated into SQL and map keys; restrict them to bare
/// identifiers.
pub(crate) fn check_table_ident(table: &str) -> Result<()> {
    let mut chars = table.chars();
    let head_ok = chars
        .next()
        .map(|c| c.is_ascii_alphabetic() || c == '_')
        .unwrap_or(false);
    if head_ok && table.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        Ok(())
    } else {
        Err(DialerError::store(format!("invalid table name: '{table}'")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_idents_are_restricted() {
        assert!(check_table_ident("dest_survey").is_ok());
        assert!(check_table_ident("_t1").is_ok());
        assert!(check_table_ident("").is_err());
        assert!(check_table_ident("1abc").is_err());
        assert!(check_table_ident("dest; drop table x").is_err());
        assert!(check_table_ident("dest-survey").is_err());
    }

    #[test]
    fn caller_id_override_wins_only_when_non_empty() {
        let mut record = DestinationRecord {
            number: "15551234".to_string(),
            last_call_time: None,
            last_result: None,
            call_count: 0,
            in_use: false,
            scheduled_duration_seconds: None,
            caller_id_override: None,
        };
        assert_eq!(record.effective_caller_id("1000"), "1000");

        record.caller_id_override = Some(String::new());
        assert_eq!(record.effective_caller_id("1000"), "1000");

        record.caller_id_override = Some("2000".to_string());
        assert_eq!(record.effective_caller_id("1000"), "2000");
    }
}
