//! SQLite destination store over sqlx.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use tracing::debug;

use crate::config::CallingStrategy;
use crate::error::{DialerError, Result};
use crate::store::{check_table_ident, DestinationRecord, DestinationStore};

/// Raw row shape of a destinations table.
#[derive(Debug, sqlx::FromRow)]
struct DestinationRow {
    number: String,
    last_call: Option<i64>,
    last_result: Option<String>,
    calls: i64,
    in_use: i64,
    duration: Option<i64>,
    caller_id: Option<String>,
}

impl From<DestinationRow> for DestinationRecord {
    fn from(row: DestinationRow) -> Self {
        DestinationRecord {
            number: row.number,
            last_call_time: row.last_call.and_then(|secs| DateTime::from_timestamp(secs, 0)),
            last_result: row.last_result,
            call_count: row.calls.max(0) as u32,
            in_use: row.in_use != 0,
            scheduled_duration_seconds: row
                .duration
                .filter(|d| *d > 0)
                .map(|d| d as u32),
            caller_id_override: row.caller_id,
        }
    }
}

/// [`DestinationStore`] backed by a SQLite database.
///
/// Timestamps are stored as epoch seconds. The claim is a single
/// `UPDATE ... RETURNING` statement, so the eligibility check and the
/// `in_use` flip cannot be split by a concurrent claimer.
#[derive(Debug, Clone)]
pub struct SqliteDestinationStore {
    pool: SqlitePool,
}

impl SqliteDestinationStore {
    /// Connect to a SQLite database URL, e.g. `sqlite://dialer.db?mode=rwc`
    /// or `sqlite::memory:`.
    ///
    /// A single connection is used: it keeps `:memory:` databases coherent
    /// and serializes writers, and claim traffic is paced at human dialing
    /// speeds anyway.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(url)
            .await?;
        debug!("destination store connected: {}", url);
        Ok(Self { pool })
    }

    /// In-memory database, for tests and simulations.
    pub async fn in_memory() -> Result<Self> {
        Self::connect("sqlite::memory:").await
    }

    /// Seed a plain destination row (no overrides). Rows start never-called.
    pub async fn add_number(&self, table: &str, number: &str) -> Result<()> {
        self.add_number_with(table, number, None, None).await
    }

    /// Seed a destination row with optional per-row caller id and duration.
    pub async fn add_number_with(
        &self,
        table: &str,
        number: &str,
        caller_id_override: Option<&str>,
        scheduled_duration_seconds: Option<u32>,
    ) -> Result<()> {
        check_table_ident(table)?;
        let sql = format!(
            "INSERT INTO {table} (number, calls, in_use, duration, caller_id) \
             VALUES (?1, 0, 0, ?2, ?3)"
        );
        sqlx::query(&sql)
            .bind(number)
            .bind(scheduled_duration_seconds.filter(|s| *s > 0).map(i64::from))
            .bind(caller_id_override)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Read back one row; test and inspection helper.
    pub async fn fetch(&self, table: &str, number: &str) -> Result<Option<DestinationRecord>> {
        check_table_ident(table)?;
        let sql = format!(
            "SELECT number, last_call, last_result, calls, in_use, duration, caller_id \
             FROM {table} WHERE number = ?1"
        );
        let row = sqlx::query_as::<_, DestinationRow>(&sql)
            .bind(number)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Into::into))
    }
}

#[async_trait]
impl DestinationStore for SqliteDestinationStore {
    async fn ensure_schema(&self, table: &str) -> Result<()> {
        check_table_ident(table)?;
        let create = format!(
            "CREATE TABLE IF NOT EXISTS {table} (\n\
                 number      TEXT NOT NULL PRIMARY KEY,\n\
                 last_call   INTEGER,\n\
                 last_result TEXT,\n\
                 calls       INTEGER NOT NULL DEFAULT 0,\n\
                 in_use      INTEGER NOT NULL DEFAULT 0,\n\
                 duration    INTEGER,\n\
                 caller_id   TEXT\n\
             )"
        );
        sqlx::query(&create).execute(&self.pool).await?;

        let index =
            format!("CREATE INDEX IF NOT EXISTS idx_{table}_last_call ON {table} (last_call)");
        sqlx::query(&index).execute(&self.pool).await?;
        debug!("destination table ready: {}", table);
        Ok(())
    }

    async fn select_and_claim(
        &self,
        table: &str,
        strategy: CallingStrategy,
        attempts_per_number: u32,
        retry_window: Duration,
    ) -> Result<Option<DestinationRecord>> {
        check_table_ident(table)?;
        let order = match strategy {
            CallingStrategy::Random => "RANDOM()",
            CallingStrategy::Sequential => "number",
        };
        let cutoff = (Utc::now() - ChronoDuration::seconds(retry_window.as_secs() as i64))
            .timestamp();
        let sql = format!(
            "UPDATE {table} SET in_use = 1 \
             WHERE number = ( \
                 SELECT number FROM {table} \
                 WHERE in_use = 0 AND calls < ?1 \
                   AND (last_call IS NULL OR last_call < ?2) \
                 ORDER BY {order} LIMIT 1 \
             ) \
             RETURNING number, last_call, last_result, calls, in_use, duration, caller_id"
        );
        let row = sqlx::query_as::<_, DestinationRow>(&sql)
            .bind(i64::from(attempts_per_number))
            .bind(cutoff)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Into::into))
    }

    async fn release(&self, table: &str, number: &str, mark_in_use: bool) -> Result<()> {
        check_table_ident(table)?;
        let sql = format!("UPDATE {table} SET in_use = ?1, last_call = ?2 WHERE number = ?3");
        let result = sqlx::query(&sql)
            .bind(i64::from(mark_in_use))
            .bind(Utc::now().timestamp())
            .bind(number)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DialerError::store(format!(
                "release of unknown number {number} in {table}"
            )));
        }
        Ok(())
    }

    async fn bump_call_count(&self, table: &str, number: &str) -> Result<()> {
        check_table_ident(table)?;
        let sql = format!("UPDATE {table} SET calls = calls + 1 WHERE number = ?1");
        let result = sqlx::query(&sql).bind(number).execute(&self.pool).await?;
        if result.rows_affected() == 0 {
            return Err(DialerError::store(format!(
                "attempt bump for unknown number {number} in {table}"
            )));
        }
        Ok(())
    }
}
