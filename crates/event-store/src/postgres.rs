use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Row, Transaction, postgres::PgRow};
use uuid::Uuid;

use crate::{
    AggregateId, EventEnvelope, EventId, EventQuery, EventStoreError, Result, Tag, Version,
    store::{AppendRequest, EventStore, EventStream, validate_batch},
};

const SELECT_COLUMNS: &str =
    "SELECT id, event_type, aggregate_id, aggregate_type, version, timestamp, payload, tags, metadata FROM events";

/// PostgreSQL-backed event store implementation.
///
/// Commit order is the `sequence` column. Appends take a transaction-scoped
/// advisory lock per tag they write or guard on, so two commits touching the
/// same tag are serialized and a guard's count cannot go stale before commit.
#[derive(Clone)]
pub struct PostgresEventStore {
    pool: PgPool,
}

impl PostgresEventStore {
    /// Creates a new PostgreSQL event store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects to `database_url` and returns a store on a fresh pool.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPool::connect(database_url).await?;
        Ok(Self::new(pool))
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    fn row_to_event(row: PgRow) -> Result<EventEnvelope> {
        let metadata_json: serde_json::Value = row.try_get("metadata")?;
        let metadata: HashMap<String, serde_json::Value> = serde_json::from_value(metadata_json)?;
        let tags: Vec<String> = row.try_get("tags")?;

        Ok(EventEnvelope {
            event_id: EventId::from_uuid(row.try_get::<Uuid, _>("id")?),
            event_type: row.try_get("event_type")?,
            aggregate_id: AggregateId::from_uuid(row.try_get::<Uuid, _>("aggregate_id")?),
            aggregate_type: row.try_get("aggregate_type")?,
            version: Version::new(row.try_get("version")?),
            timestamp: row.try_get("timestamp")?,
            payload: row.try_get("payload")?,
            tags: tags.into_iter().map(Tag::from_raw).collect(),
            metadata,
        })
    }

    /// Locks every tag the batch touches, in a fixed order to avoid deadlocks.
    async fn lock_tags(tx: &mut Transaction<'_, Postgres>, requests: &[AppendRequest]) -> Result<()> {
        let mut tags = BTreeSet::new();
        for request in requests {
            for event in &request.events {
                tags.extend(event.tags.iter().map(Tag::as_str));
            }
            if let Some(ref guard) = request.options.guard {
                tags.insert(guard.tag.as_str());
            }
        }

        for tag in tags {
            sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
                .bind(tag)
                .execute(&mut **tx)
                .await?;
        }
        Ok(())
    }

    async fn insert_event(
        tx: &mut Transaction<'_, Postgres>,
        event: &EventEnvelope,
        expected: Option<Version>,
    ) -> Result<()> {
        let metadata_json = serde_json::to_value(&event.metadata)?;
        let tags: Vec<String> = event.tags.iter().map(Tag::to_string).collect();

        sqlx::query(
            r#"
            INSERT INTO events (id, event_type, aggregate_id, aggregate_type, version, timestamp, payload, tags, metadata)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(event.event_id.as_uuid())
        .bind(&event.event_type)
        .bind(event.aggregate_id.as_uuid())
        .bind(&event.aggregate_type)
        .bind(event.version.as_i64())
        .bind(event.timestamp)
        .bind(&event.payload)
        .bind(tags)
        .bind(metadata_json)
        .execute(&mut **tx)
        .await
        .map_err(|e| {
            // Another writer committed this version first
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.constraint() == Some("unique_aggregate_version")
            {
                return EventStoreError::ConcurrencyConflict {
                    aggregate_id: event.aggregate_id,
                    expected: expected.unwrap_or(Version::initial()),
                    actual: event.version,
                };
            }
            EventStoreError::Database(e)
        })?;

        Ok(())
    }
}

#[async_trait]
impl EventStore for PostgresEventStore {
    async fn append_batch(&self, requests: Vec<AppendRequest>) -> Result<Vec<Version>> {
        validate_batch(&requests)?;

        let mut tx = self.pool.begin().await?;
        Self::lock_tags(&mut tx, &requests).await?;

        for request in &requests {
            let aggregate_id = request.events[0].aggregate_id;

            if let Some(expected) = request.options.expected_version {
                let current_version: Option<i64> =
                    sqlx::query_scalar("SELECT MAX(version) FROM events WHERE aggregate_id = $1")
                        .bind(aggregate_id.as_uuid())
                        .fetch_one(&mut *tx)
                        .await?;

                let actual = Version::new(current_version.unwrap_or(0));
                if actual != expected {
                    return Err(EventStoreError::ConcurrencyConflict {
                        aggregate_id,
                        expected,
                        actual,
                    });
                }
            }

            if let Some(ref guard) = request.options.guard {
                let actual: i64 =
                    sqlx::query_scalar("SELECT COUNT(*) FROM events WHERE $1 = ANY(tags)")
                        .bind(guard.tag.as_str())
                        .fetch_one(&mut *tx)
                        .await?;

                if actual as u64 != guard.expected_events {
                    return Err(EventStoreError::GuardViolated {
                        tag: guard.tag.clone(),
                        expected: guard.expected_events,
                        actual: actual as u64,
                    });
                }
            }
        }

        let mut versions = Vec::with_capacity(requests.len());
        for request in &requests {
            let mut last_version = Version::initial();
            for event in &request.events {
                Self::insert_event(&mut tx, event, request.options.expected_version).await?;
                last_version = event.version;
            }
            versions.push(last_version);
        }

        tx.commit().await?;
        Ok(versions)
    }

    async fn get_events_for_aggregate(
        &self,
        aggregate_id: AggregateId,
    ) -> Result<Vec<EventEnvelope>> {
        let rows = sqlx::query(&format!(
            "{SELECT_COLUMNS} WHERE aggregate_id = $1 ORDER BY version ASC"
        ))
        .bind(aggregate_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_event).collect()
    }

    async fn query_events(&self, query: EventQuery) -> Result<Vec<EventEnvelope>> {
        let mut sql = format!("{SELECT_COLUMNS} WHERE 1=1");
        let mut param_count = 0;

        // Build dynamic query
        if query.aggregate_id.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND aggregate_id = ${param_count}"));
        }
        if query.aggregate_type.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND aggregate_type = ${param_count}"));
        }
        if query.event_types.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND event_type = ANY(${param_count})"));
        }
        if query.tag.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND tags @> ARRAY[${param_count}]::TEXT[]"));
        }
        if query.from_timestamp.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND timestamp >= ${param_count}"));
        }
        if query.to_timestamp.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND timestamp <= ${param_count}"));
        }

        sql.push_str(" ORDER BY sequence ASC");

        if query.limit.is_some() {
            param_count += 1;
            sql.push_str(&format!(" LIMIT ${param_count}"));
        }
        if query.offset.is_some() {
            param_count += 1;
            sql.push_str(&format!(" OFFSET ${param_count}"));
        }

        let mut sqlx_query = sqlx::query(&sql);

        if let Some(id) = query.aggregate_id {
            sqlx_query = sqlx_query.bind(id.as_uuid());
        }
        if let Some(agg_type) = query.aggregate_type {
            sqlx_query = sqlx_query.bind(agg_type);
        }
        if let Some(event_types) = query.event_types {
            sqlx_query = sqlx_query.bind(event_types);
        }
        if let Some(tag) = query.tag {
            sqlx_query = sqlx_query.bind(tag.as_str().to_owned());
        }
        if let Some(from_ts) = query.from_timestamp {
            sqlx_query = sqlx_query.bind(from_ts);
        }
        if let Some(to_ts) = query.to_timestamp {
            sqlx_query = sqlx_query.bind(to_ts);
        }
        if let Some(limit) = query.limit {
            sqlx_query = sqlx_query.bind(limit as i64);
        }
        if let Some(offset) = query.offset {
            sqlx_query = sqlx_query.bind(offset as i64);
        }

        let rows = sqlx_query.fetch_all(&self.pool).await?;
        rows.into_iter().map(Self::row_to_event).collect()
    }

    async fn count_tagged(&self, tag: &Tag) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM events WHERE $1 = ANY(tags)")
            .bind(tag.as_str())
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }

    async fn stream_all_events(&self) -> Result<EventStream> {
        use futures_util::stream;

        let rows = sqlx::query(&format!("{SELECT_COLUMNS} ORDER BY sequence ASC"))
            .fetch_all(&self.pool)
            .await?;
        let events = rows
            .into_iter()
            .map(Self::row_to_event)
            .collect::<Vec<_>>();

        Ok(Box::pin(stream::iter(events)))
    }

    async fn get_aggregate_version(&self, aggregate_id: AggregateId) -> Result<Option<Version>> {
        let version: Option<i64> =
            sqlx::query_scalar("SELECT MAX(version) FROM events WHERE aggregate_id = $1")
                .bind(aggregate_id.as_uuid())
                .fetch_one(&self.pool)
                .await?;

        Ok(version.map(Version::new))
    }
}
