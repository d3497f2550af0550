//! Postgres-backed event store implementation.
//!
//! One `events` table holds every stream. `(aggregate_id, sequence_number)` is
//! unique, so two writers racing on the same stream cannot both commit: the
//! loser hits a unique violation and gets [`EventStoreError::Concurrency`].
//! `global_position` orders the log for projection rebuilds.
//!
//! ## Error Mapping
//!
//! | SQLx error | PostgreSQL code | `EventStoreError` |
//! |------------|-----------------|-------------------|
//! | Database (unique violation) | `23505` | `Concurrency` |
//! | Database (check violation) | `23514` | `InvalidAppend` |
//! | Database (other) | any | `Backend` |
//! | PoolClosed, network, other | n/a | `Backend` |
//!
//! ## Sync access
//!
//! [`EventStore`] is synchronous. The trait impl drives the async methods on
//! the current tokio runtime with `Handle::block_on`, so it must be called
//! from a blocking context (`tokio::task::spawn_blocking`), never directly
//! from an async task.

use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::{Span, instrument};

use commerce_core::AggregateId;

use super::r#trait::{
    EventStore, EventStoreError, StoredEvent, StreamAppend, ensure_distinct_streams,
};

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS events (
        global_position BIGSERIAL PRIMARY KEY,
        event_id UUID NOT NULL UNIQUE,
        aggregate_id UUID NOT NULL,
        aggregate_type TEXT NOT NULL,
        sequence_number BIGINT NOT NULL CHECK (sequence_number > 0),
        event_type TEXT NOT NULL,
        event_version INTEGER NOT NULL,
        occurred_at TIMESTAMPTZ NOT NULL,
        payload JSONB NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        UNIQUE (aggregate_id, sequence_number)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS events_aggregate_type_idx ON events (aggregate_type)",
];

const EVENT_COLUMNS: &str = "event_id, aggregate_id, aggregate_type, sequence_number, \
                             event_type, event_version, occurred_at, payload";

/// Postgres-backed append-only event store.
#[derive(Debug, Clone)]
pub struct PostgresEventStore {
    pool: PgPool,
}

impl PostgresEventStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect and make sure the schema exists.
    pub async fn connect(database_url: &str) -> Result<Self, EventStoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        let store = Self::new(pool);
        store.migrate().await?;
        Ok(store)
    }

    pub async fn migrate(&self) -> Result<(), EventStoreError> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| map_sqlx_error("migrate", e))?;
        }
        Ok(())
    }

    #[instrument(skip(self), fields(aggregate_id = %aggregate_id, event_count), err)]
    pub async fn load_stream_async(
        &self,
        aggregate_id: AggregateId,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {EVENT_COLUMNS} FROM events WHERE aggregate_id = $1 ORDER BY sequence_number ASC"
        ))
        .bind(aggregate_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("load_stream", e))?;

        let events = rows.iter().map(stored_event_from_row).collect::<Result<Vec<_>, _>>()?;
        Span::current().record("event_count", events.len());
        Ok(events)
    }

    #[instrument(skip(self), fields(event_count), err)]
    pub async fn load_all_async(&self) -> Result<Vec<StoredEvent>, EventStoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {EVENT_COLUMNS} FROM events ORDER BY global_position ASC"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("load_all", e))?;

        let events = rows.iter().map(stored_event_from_row).collect::<Result<Vec<_>, _>>()?;
        Span::current().record("event_count", events.len());
        Ok(events)
    }

    /// Append a multi-stream batch in one transaction.
    #[instrument(skip(self, batch), fields(streams = batch.len()), err)]
    pub async fn append_batch_async(
        &self,
        batch: Vec<StreamAppend>,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        let batch: Vec<StreamAppend> = batch.into_iter().filter(|a| !a.events.is_empty()).collect();
        if batch.is_empty() {
            return Ok(vec![]);
        }
        ensure_distinct_streams(&batch)?;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        let mut committed = Vec::new();
        for append in batch {
            let (current_version, existing_type) =
                check_stream_version(&mut tx, append.aggregate_id).await?;

            if let Some(existing_type) = existing_type {
                if existing_type != append.aggregate_type {
                    rollback(tx).await?;
                    return Err(EventStoreError::AggregateTypeMismatch(format!(
                        "stream aggregate_type is '{existing_type}', attempted append with '{}'",
                        append.aggregate_type
                    )));
                }
            }
            if !append.expected_version.matches(current_version) {
                rollback(tx).await?;
                return Err(EventStoreError::Concurrency(format!(
                    "stream {} expected {:?}, found {current_version}",
                    append.aggregate_id, append.expected_version
                )));
            }

            let mut next_sequence = current_version + 1;
            for event in append.events {
                sqlx::query(
                    r#"
                    INSERT INTO events (
                        event_id, aggregate_id, aggregate_type, sequence_number,
                        event_type, event_version, occurred_at, payload
                    )
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                    "#,
                )
                .bind(event.event_id)
                .bind(append.aggregate_id.as_uuid())
                .bind(&append.aggregate_type)
                .bind(next_sequence as i64)
                .bind(&event.event_type)
                .bind(event.event_version as i32)
                .bind(event.occurred_at)
                .bind(&event.payload)
                .execute(&mut *tx)
                .await
                .map_err(|e| {
                    if is_unique_violation(&e) {
                        EventStoreError::Concurrency(format!(
                            "concurrent append detected on {}: sequence_number {next_sequence} already exists",
                            append.aggregate_id
                        ))
                    } else {
                        map_sqlx_error("insert_event", e)
                    }
                })?;

                committed.push(StoredEvent {
                    event_id: event.event_id,
                    aggregate_id: event.aggregate_id,
                    aggregate_type: event.aggregate_type,
                    sequence_number: next_sequence,
                    event_type: event.event_type,
                    event_version: event.event_version,
                    occurred_at: event.occurred_at,
                    payload: event.payload,
                });
                next_sequence += 1;
            }
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;

        Ok(committed)
    }

    fn block_on<F: std::future::Future>(&self, fut: F) -> Result<F::Output, EventStoreError> {
        let handle = tokio::runtime::Handle::try_current().map_err(|_| {
            EventStoreError::Backend(
                "PostgresEventStore must be called from within a tokio runtime".to_string(),
            )
        })?;
        Ok(handle.block_on(fut))
    }
}

impl EventStore for PostgresEventStore {
    fn append_batch(&self, batch: Vec<StreamAppend>) -> Result<Vec<StoredEvent>, EventStoreError> {
        self.block_on(self.append_batch_async(batch))?
    }

    fn load_stream(&self, aggregate_id: AggregateId) -> Result<Vec<StoredEvent>, EventStoreError> {
        self.block_on(self.load_stream_async(aggregate_id))?
    }

    fn load_all(&self) -> Result<Vec<StoredEvent>, EventStoreError> {
        self.block_on(self.load_all_async())?
    }
}

/// `(current_version, aggregate_type)`; version 0 and no type for a new stream.
async fn check_stream_version(
    tx: &mut Transaction<'_, Postgres>,
    aggregate_id: AggregateId,
) -> Result<(u64, Option<String>), EventStoreError> {
    let row = sqlx::query(
        r#"
        SELECT
            COALESCE(MAX(sequence_number), 0) AS current_version,
            MAX(aggregate_type) AS aggregate_type
        FROM events
        WHERE aggregate_id = $1
        "#,
    )
    .bind(aggregate_id.as_uuid())
    .fetch_one(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error("check_stream_version", e))?;

    let current_version: Option<i64> = row
        .try_get("current_version")
        .map_err(|e| EventStoreError::Backend(format!("failed to read current_version: {e}")))?;
    let aggregate_type: Option<String> = row
        .try_get("aggregate_type")
        .map_err(|e| EventStoreError::Backend(format!("failed to read aggregate_type: {e}")))?;

    Ok((current_version.unwrap_or(0) as u64, aggregate_type))
}

async fn rollback(tx: Transaction<'_, Postgres>) -> Result<(), EventStoreError> {
    tx.rollback().await.map_err(|e| map_sqlx_error("rollback", e))
}

fn stored_event_from_row(row: &PgRow) -> Result<StoredEvent, EventStoreError> {
    let read = |e: sqlx::Error| EventStoreError::Backend(format!("failed to decode event row: {e}"));
    let sequence_number: i64 = row.try_get("sequence_number").map_err(read)?;
    let event_version: i32 = row.try_get("event_version").map_err(read)?;
    let aggregate_id: uuid::Uuid = row.try_get("aggregate_id").map_err(read)?;
    let occurred_at: DateTime<Utc> = row.try_get("occurred_at").map_err(read)?;

    Ok(StoredEvent {
        event_id: row.try_get("event_id").map_err(read)?,
        aggregate_id: AggregateId::from_uuid(aggregate_id),
        aggregate_type: row.try_get("aggregate_type").map_err(read)?,
        sequence_number: sequence_number as u64,
        event_type: row.try_get("event_type").map_err(read)?,
        event_version: event_version as u32,
        occurred_at,
        payload: row.try_get("payload").map_err(read)?,
    })
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> EventStoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {operation}: {}", db_err.message());
            match db_err.code().as_deref() {
                Some("23505") => EventStoreError::Concurrency(msg),
                Some("23514") => EventStoreError::InvalidAppend(msg),
                _ => EventStoreError::Backend(msg),
            }
        }
        sqlx::Error::PoolClosed => {
            EventStoreError::Backend(format!("connection pool closed in {operation}"))
        }
        other => EventStoreError::Backend(format!("sqlx error in {operation}: {other}")),
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().as_deref() == Some("23505"),
        _ => false,
    }
}
