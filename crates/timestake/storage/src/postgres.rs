//! PostgreSQL adapter for the ledger store.
//!
//! Each commit runs in one database transaction. A transaction-scoped
//! advisory lock serialises journal appends so sequence numbers stay dense
//! and the hash chain stays linear; record preconditions are enforced by the
//! primary key (creates) and a `version = expected` guard (updates).

use async_trait::async_trait;
use chrono::{DateTime, SubsecRound, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use timestake_types::{DomainEvent, Record, RecordKey, RecordKind};
use tracing::debug;
use uuid::Uuid;

use crate::journal::{chain_entry, verify_chain};
use crate::model::{
    CommitReceipt, JournalEntry, JournalIntegrity, QueryWindow, StoredRecord, WriteBatch, WriteOp,
};
use crate::traits::{EventJournal, RecordStore};
use crate::{StorageError, StorageResult};

/// Advisory lock id guarding the journal head.
const JOURNAL_LOCK_ID: i64 = 0x7469_6d65_7374_616b;

/// PostgreSQL-backed ledger store.
#[derive(Clone)]
pub struct PostgresLedgerStore {
    pool: PgPool,
}

impl PostgresLedgerStore {
    /// Connect to PostgreSQL and initialise the schema.
    pub async fn connect(database_url: &str) -> StorageResult<Self> {
        Self::connect_with_options(database_url, 10, 5).await
    }

    /// Connect with explicit pool parameters.
    pub async fn connect_with_options(
        database_url: &str,
        max_connections: u32,
        connect_timeout_secs: u64,
    ) -> StorageResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(std::time::Duration::from_secs(connect_timeout_secs))
            .connect(database_url)
            .await
            .map_err(|e| StorageError::Backend(format!("failed to connect postgres: {e}")))?;
        Self::from_pool(pool).await
    }

    /// Create adapter from an existing pool.
    pub async fn from_pool(pool: PgPool) -> StorageResult<Self> {
        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn init_schema(&self) -> StorageResult<()> {
        let ddl = [
            r#"
            CREATE TABLE IF NOT EXISTS timestake_records (
                key TEXT PRIMARY KEY,
                kind TEXT NOT NULL,
                version BIGINT NOT NULL,
                record JSONB NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL
            )
            "#,
            "CREATE INDEX IF NOT EXISTS timestake_records_kind_idx ON timestake_records (kind, key)",
            r#"
            CREATE TABLE IF NOT EXISTS timestake_journal (
                sequence BIGINT PRIMARY KEY,
                event_id UUID NOT NULL UNIQUE,
                recorded_at TIMESTAMPTZ NOT NULL,
                event JSONB NOT NULL,
                previous_hash TEXT,
                hash TEXT NOT NULL
            )
            "#,
        ];

        for stmt in ddl {
            sqlx::query(stmt)
                .execute(&self.pool)
                .await
                .map_err(|e| StorageError::Backend(format!("schema init failed: {e}")))?;
        }
        Ok(())
    }
}

#[async_trait]
impl RecordStore for PostgresLedgerStore {
    async fn get(&self, key: &RecordKey) -> StorageResult<Option<StoredRecord>> {
        let row = sqlx::query(
            "SELECT key, version, record, updated_at FROM timestake_records WHERE key = $1",
        )
        .bind(key.storage_key())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx)?;
        row.map(|r| row_to_record(&r)).transpose()
    }

    async fn scan(
        &self,
        kind: RecordKind,
        window: QueryWindow,
    ) -> StorageResult<Vec<StoredRecord>> {
        let limit = if window.limit == 0 {
            i64::MAX
        } else {
            window.limit as i64
        };
        let rows = sqlx::query(
            r#"
            SELECT key, version, record, updated_at
              FROM timestake_records
             WHERE kind = $1
             ORDER BY key ASC
             LIMIT $2 OFFSET $3
            "#,
        )
        .bind(kind.as_str())
        .bind(limit)
        .bind(window.offset as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx)?;
        rows.iter().map(row_to_record).collect()
    }

    async fn commit(&self, batch: WriteBatch) -> StorageResult<CommitReceipt> {
        batch.validate_shape()?;
        // TIMESTAMPTZ keeps microseconds; hash what will be read back.
        let recorded_at = batch.recorded_at.trunc_subsecs(6);

        let mut tx = self.pool.begin().await.map_err(map_sqlx)?;
        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(JOURNAL_LOCK_ID)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx)?;

        let writes = batch.ops.len();
        for op in &batch.ops {
            let key = op.key();
            let record_json = serde_json::to_value(op.record())?;
            match op {
                WriteOp::Create { .. } => {
                    let result = sqlx::query(
                        r#"
                        INSERT INTO timestake_records (key, kind, version, record, updated_at)
                        VALUES ($1, $2, 1, $3, $4)
                        ON CONFLICT (key) DO NOTHING
                        "#,
                    )
                    .bind(key.storage_key())
                    .bind(key.kind().as_str())
                    .bind(record_json)
                    .bind(recorded_at)
                    .execute(&mut *tx)
                    .await
                    .map_err(map_sqlx)?;
                    if result.rows_affected() == 0 {
                        return Err(StorageError::AlreadyExists(key.to_string()));
                    }
                }
                WriteOp::Update {
                    expected_version, ..
                } => {
                    let result = sqlx::query(
                        r#"
                        UPDATE timestake_records
                           SET version = version + 1, record = $3, updated_at = $4
                         WHERE key = $1 AND version = $2
                        "#,
                    )
                    .bind(key.storage_key())
                    .bind(*expected_version as i64)
                    .bind(record_json)
                    .bind(recorded_at)
                    .execute(&mut *tx)
                    .await
                    .map_err(map_sqlx)?;
                    if result.rows_affected() == 0 {
                        return Err(StorageError::Conflict(format!(
                            "{} is missing or not at version {}",
                            key, expected_version
                        )));
                    }
                }
            }
        }

        let head = sqlx::query(
            r#"
            SELECT sequence, event_id, recorded_at, event, previous_hash, hash
              FROM timestake_journal
             ORDER BY sequence DESC
             LIMIT 1
            "#,
        )
        .fetch_optional(&mut *tx)
        .await
        .map_err(map_sqlx)?
        .map(|row| row_to_entry(&row))
        .transpose()?;

        let mut appended: Vec<JournalEntry> = Vec::with_capacity(batch.events.len());
        for event in batch.events {
            let previous = appended.last().or(head.as_ref());
            let entry = chain_entry(previous, recorded_at, event)?;
            sqlx::query(
                r#"
                INSERT INTO timestake_journal
                    (sequence, event_id, recorded_at, event, previous_hash, hash)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(entry.sequence as i64)
            .bind(entry.event_id)
            .bind(entry.recorded_at)
            .bind(serde_json::to_value(&entry.event)?)
            .bind(entry.previous_hash.clone())
            .bind(entry.hash.clone())
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx)?;
            appended.push(entry);
        }

        tx.commit().await.map_err(map_sqlx)?;
        debug!(
            writes,
            events = appended.len(),
            "Committed ledger batch to postgres"
        );

        Ok(CommitReceipt { journal: appended })
    }
}

#[async_trait]
impl EventJournal for PostgresLedgerStore {
    async fn events_since(
        &self,
        after_sequence: u64,
        limit: usize,
    ) -> StorageResult<Vec<JournalEntry>> {
        let limit = if limit == 0 { i64::MAX } else { limit as i64 };
        let rows = sqlx::query(
            r#"
            SELECT sequence, event_id, recorded_at, event, previous_hash, hash
              FROM timestake_journal
             WHERE sequence > $1
             ORDER BY sequence ASC
             LIMIT $2
            "#,
        )
        .bind(after_sequence as i64)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx)?;
        rows.iter().map(row_to_entry).collect()
    }

    async fn latest_event_hash(&self) -> StorageResult<Option<String>> {
        let row = sqlx::query("SELECT hash FROM timestake_journal ORDER BY sequence DESC LIMIT 1")
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx)?;
        row.map(|r| r.try_get::<String, _>("hash").map_err(map_sqlx))
            .transpose()
    }

    async fn verify_journal(&self) -> StorageResult<JournalIntegrity> {
        let entries = self.events_since(0, 0).await?;
        verify_chain(&entries)
    }
}

fn row_to_record(row: &PgRow) -> StorageResult<StoredRecord> {
    let key: String = row.try_get("key").map_err(map_sqlx)?;
    let version: i64 = row.try_get("version").map_err(map_sqlx)?;
    let record: serde_json::Value = row.try_get("record").map_err(map_sqlx)?;
    let updated_at: DateTime<Utc> = row.try_get("updated_at").map_err(map_sqlx)?;
    Ok(StoredRecord {
        key: key
            .parse()
            .map_err(|e| StorageError::Serialization(format!("bad record key {key}: {e}")))?,
        version: version as u64,
        record: serde_json::from_value::<Record>(record)?,
        updated_at,
    })
}

fn row_to_entry(row: &PgRow) -> StorageResult<JournalEntry> {
    let sequence: i64 = row.try_get("sequence").map_err(map_sqlx)?;
    let event_id: Uuid = row.try_get("event_id").map_err(map_sqlx)?;
    let recorded_at: DateTime<Utc> = row.try_get("recorded_at").map_err(map_sqlx)?;
    let event: serde_json::Value = row.try_get("event").map_err(map_sqlx)?;
    let previous_hash: Option<String> = row.try_get("previous_hash").map_err(map_sqlx)?;
    let hash: String = row.try_get("hash").map_err(map_sqlx)?;
    Ok(JournalEntry {
        sequence: sequence as u64,
        event_id,
        recorded_at,
        event: serde_json::from_value::<DomainEvent>(event)?,
        previous_hash,
        hash,
    })
}

fn map_sqlx(err: sqlx::Error) -> StorageError {
    StorageError::Backend(err.to_string())
}
