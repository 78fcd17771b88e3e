//! `PostgreSQL` storage for Event Hub.
//!
//! Events and rosters are JSONB documents, mirroring the document store the
//! platform was designed around:
//!
//! - `events(id, data, date, created_at, updated_at)`: the [`Event`] document
//! - `event_applications(event_id, attendees)`: the roster as a JSONB array,
//!   deleted by cascade with its event
//! - `mailing_list(category, email)`: see [`PostgresSubscriptionStore`]
//!
//! Roster mutations are single statements that test membership, write the
//! array and adjust `number_of_applications` together, so concurrent applies
//! for the same attendee cannot both succeed.
//!
//! # Example
//!
//! ```ignore
//! let store = PostgresEventStore::new(&database_url).await?;
//! store.migrate().await?;
//! let events = store.list_events().await?;
//! ```

use event_hub_core::event::{Event, EventId};
use event_hub_core::event_store::{EventStore, StoreError, StoreFuture};
use event_hub_core::roster::{EventApplication, RosterWrite};
use serde_json::Value;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use std::collections::BTreeSet;
use std::time::Duration;
use uuid::Uuid;

mod subscriptions;

pub use subscriptions::PostgresSubscriptionStore;

/// Pool settings for [`PostgresEventStore::connect`].
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Maximum open connections
    pub max_connections: u32,
    /// How long to wait for a connection
    pub connect_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: 10,
            connect_timeout: Duration::from_secs(30),
        }
    }
}

fn db_error(operation: &'static str) -> impl Fn(sqlx::Error) -> StoreError {
    move |e| {
        metrics::counter!("postgres.errors.total", "operation" => operation).increment(1);
        tracing::warn!(operation, error = %e, "Database operation failed");
        StoreError::DatabaseError(e.to_string())
    }
}

fn decode_event(json: Value) -> Result<Event, StoreError> {
    serde_json::from_value(json).map_err(|e| StoreError::SerializationError(e.to_string()))
}

fn decode_attendees(json: Value) -> Result<BTreeSet<String>, StoreError> {
    serde_json::from_value(json).map_err(|e| StoreError::SerializationError(e.to_string()))
}

fn encode<T: serde::Serialize + ?Sized>(value: &T) -> Result<Value, StoreError> {
    serde_json::to_value(value).map_err(|e| StoreError::SerializationError(e.to_string()))
}

/// JSONB document store for events and rosters.
#[derive(Clone, Debug)]
pub struct PostgresEventStore {
    pool: PgPool,
}

impl PostgresEventStore {
    /// Connect with default pool settings.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ConnectionFailed`] if the database is unreachable.
    pub async fn new(database_url: &str) -> Result<Self, StoreError> {
        Self::connect(database_url, &PoolConfig::default()).await
    }

    /// Connect with explicit pool settings.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ConnectionFailed`] if the database is unreachable.
    pub async fn connect(database_url: &str, config: &PoolConfig) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.connect_timeout)
            .connect(database_url)
            .await
            .map_err(|e| StoreError::ConnectionFailed(e.to_string()))?;
        Ok(Self { pool })
    }

    /// Wrap an existing pool.
    #[must_use]
    pub const fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The underlying pool, shared with [`PostgresSubscriptionStore`].
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Run database migrations.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DatabaseError`] if a migration fails.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::DatabaseError(format!("Migration failed: {e}")))
    }

    /// Round-trip a trivial query, for readiness probes.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DatabaseError`] if the database does not answer.
    pub async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(db_error("ping"))
    }

    async fn sync_counter(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        id: Uuid,
        applicants: usize,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE events
             SET data = jsonb_set(data, '{number_of_applications}', to_jsonb($2::bigint))
             WHERE id = $1",
        )
        .bind(id)
        .bind(i64::try_from(applicants).unwrap_or(i64::MAX))
        .execute(&mut **tx)
        .await
        .map_err(db_error("sync_counter"))?;
        Ok(())
    }

    async fn roster_write(
        &self,
        operation: &'static str,
        sql: &'static str,
        id: EventId,
        email: &str,
    ) -> Result<RosterWrite, StoreError> {
        let (changed, present): (i64, bool) = sqlx::query_as(sql)
            .bind(id.as_uuid())
            .bind(email)
            .fetch_one(&self.pool)
            .await
            .map_err(db_error(operation))?;

        Ok(match (changed, present) {
            (_, false) => RosterWrite::Missing,
            (0, true) => RosterWrite::Unchanged,
            _ => RosterWrite::Changed,
        })
    }
}

// Conditional push plus counter bump in one statement.
const ADD_ATTENDEE: &str = "
    WITH pushed AS (
        UPDATE event_applications
        SET attendees = attendees || jsonb_build_array($2::text)
        WHERE event_id = $1 AND NOT attendees ? $2
        RETURNING event_id
    ), bumped AS (
        UPDATE events
        SET data = jsonb_set(
            data,
            '{number_of_applications}',
            to_jsonb(COALESCE((data->>'number_of_applications')::bigint, 0) + 1)
        )
        WHERE id IN (SELECT event_id FROM pushed)
        RETURNING id
    )
    SELECT
        (SELECT count(*) FROM pushed) AS changed,
        EXISTS (SELECT 1 FROM event_applications WHERE event_id = $1) AS present";

// Conditional pull plus counter decrement, floored at zero.
const REMOVE_ATTENDEE: &str = "
    WITH pulled AS (
        UPDATE event_applications
        SET attendees = attendees - $2::text
        WHERE event_id = $1 AND attendees ? $2
        RETURNING event_id
    ), dropped AS (
        UPDATE events
        SET data = jsonb_set(
            data,
            '{number_of_applications}',
            to_jsonb(GREATEST(COALESCE((data->>'number_of_applications')::bigint, 0) - 1, 0))
        )
        WHERE id IN (SELECT event_id FROM pulled)
        RETURNING id
    )
    SELECT
        (SELECT count(*) FROM pulled) AS changed,
        EXISTS (SELECT 1 FROM event_applications WHERE event_id = $1) AS present";

impl EventStore for PostgresEventStore {
    fn insert_event(&self, event: &Event) -> StoreFuture<'_, ()> {
        let id = event.id.as_uuid();
        let (date, created_at, updated_at) = (event.date, event.created_at, event.updated_at);
        let data = encode(event);

        Box::pin(async move {
            let data = data?;
            let mut tx = self.pool.begin().await.map_err(db_error("insert_event"))?;

            let inserted = sqlx::query(
                "INSERT INTO events (id, data, date, created_at, updated_at)
                 VALUES ($1, $2, $3, $4, $5)
                 ON CONFLICT (id) DO NOTHING",
            )
            .bind(id)
            .bind(&data)
            .bind(date)
            .bind(created_at)
            .bind(updated_at)
            .execute(&mut *tx)
            .await
            .map_err(db_error("insert_event"))?;

            if inserted.rows_affected() == 0 {
                return Err(StoreError::Conflict(format!("event {id} exists")));
            }

            sqlx::query("INSERT INTO event_applications (event_id, attendees) VALUES ($1, '[]'::jsonb)")
                .bind(id)
                .execute(&mut *tx)
                .await
                .map_err(db_error("insert_event"))?;

            tx.commit().await.map_err(db_error("insert_event"))?;
            tracing::debug!(event_id = %id, "Inserted event with empty roster");
            Ok(())
        })
    }

    fn find_event(&self, id: EventId) -> StoreFuture<'_, Option<Event>> {
        Box::pin(async move {
            let row: Option<(Value,)> = sqlx::query_as("SELECT data FROM events WHERE id = $1")
                .bind(id.as_uuid())
                .fetch_optional(&self.pool)
                .await
                .map_err(db_error("find_event"))?;

            row.map(|(json,)| decode_event(json)).transpose()
        })
    }

    fn list_events(&self) -> StoreFuture<'_, Vec<Event>> {
        Box::pin(async move {
            let rows: Vec<(Value,)> = sqlx::query_as("SELECT data FROM events ORDER BY date, id")
                .fetch_all(&self.pool)
                .await
                .map_err(db_error("list_events"))?;

            rows.into_iter().map(|(json,)| decode_event(json)).collect()
        })
    }

    fn update_event(&self, event: &Event) -> StoreFuture<'_, bool> {
        let id = event.id.as_uuid();
        let (date, updated_at) = (event.date, event.updated_at);
        let data = encode(event);

        Box::pin(async move {
            let data = data?;
            // The stored counter wins over whatever the caller read earlier
            let result = sqlx::query(
                "UPDATE events
                 SET data = jsonb_set($2::jsonb, '{number_of_applications}',
                                      COALESCE(data->'number_of_applications', '0'::jsonb)),
                     date = $3,
                     updated_at = $4
                 WHERE id = $1",
            )
            .bind(id)
            .bind(&data)
            .bind(date)
            .bind(updated_at)
            .execute(&self.pool)
            .await
            .map_err(db_error("update_event"))?;

            Ok(result.rows_affected() > 0)
        })
    }

    fn delete_event(&self, id: EventId) -> StoreFuture<'_, bool> {
        Box::pin(async move {
            let result = sqlx::query("DELETE FROM events WHERE id = $1")
                .bind(id.as_uuid())
                .execute(&self.pool)
                .await
                .map_err(db_error("delete_event"))?;

            Ok(result.rows_affected() > 0)
        })
    }

    fn find_application(&self, id: EventId) -> StoreFuture<'_, Option<EventApplication>> {
        Box::pin(async move {
            let row: Option<(Value,)> =
                sqlx::query_as("SELECT attendees FROM event_applications WHERE event_id = $1")
                    .bind(id.as_uuid())
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(db_error("find_application"))?;

            row.map(|(json,)| {
                decode_attendees(json).map(|attendees| EventApplication {
                    event_id: id,
                    attendees,
                })
            })
            .transpose()
        })
    }

    fn list_applications(&self) -> StoreFuture<'_, Vec<EventApplication>> {
        Box::pin(async move {
            let rows: Vec<(Uuid, Value)> = sqlx::query_as(
                "SELECT event_id, attendees FROM event_applications ORDER BY event_id",
            )
            .fetch_all(&self.pool)
            .await
            .map_err(db_error("list_applications"))?;

            rows.into_iter()
                .map(|(event_id, json)| {
                    decode_attendees(json).map(|attendees| EventApplication {
                        event_id: EventId::from_uuid(event_id),
                        attendees,
                    })
                })
                .collect()
        })
    }

    fn create_application(&self, application: &EventApplication) -> StoreFuture<'_, ()> {
        let id = application.event_id.as_uuid();
        let applicants = application.len();
        let attendees = encode(&application.attendees);

        Box::pin(async move {
            let attendees = attendees?;
            let mut tx = self.pool.begin().await.map_err(db_error("create_application"))?;

            let inserted = sqlx::query(
                "INSERT INTO event_applications (event_id, attendees) VALUES ($1, $2)
                 ON CONFLICT (event_id) DO NOTHING",
            )
            .bind(id)
            .bind(&attendees)
            .execute(&mut *tx)
            .await
            .map_err(db_error("create_application"))?;

            if inserted.rows_affected() == 0 {
                return Err(StoreError::Conflict(format!(
                    "event {id} already has an application record"
                )));
            }

            Self::sync_counter(&mut tx, id, applicants).await?;
            tx.commit().await.map_err(db_error("create_application"))?;
            Ok(())
        })
    }

    fn replace_application(&self, application: &EventApplication) -> StoreFuture<'_, bool> {
        let id = application.event_id.as_uuid();
        let applicants = application.len();
        let attendees = encode(&application.attendees);

        Box::pin(async move {
            let attendees = attendees?;
            let mut tx = self.pool.begin().await.map_err(db_error("replace_application"))?;

            let updated =
                sqlx::query("UPDATE event_applications SET attendees = $2 WHERE event_id = $1")
                    .bind(id)
                    .bind(&attendees)
                    .execute(&mut *tx)
                    .await
                    .map_err(db_error("replace_application"))?;

            if updated.rows_affected() == 0 {
                return Ok(false);
            }

            Self::sync_counter(&mut tx, id, applicants).await?;
            tx.commit().await.map_err(db_error("replace_application"))?;
            Ok(true)
        })
    }

    fn delete_application(&self, id: EventId) -> StoreFuture<'_, bool> {
        Box::pin(async move {
            let result = sqlx::query("DELETE FROM event_applications WHERE event_id = $1")
                .bind(id.as_uuid())
                .execute(&self.pool)
                .await
                .map_err(db_error("delete_application"))?;

            Ok(result.rows_affected() > 0)
        })
    }

    fn add_attendee<'a>(&'a self, id: EventId, email: &'a str) -> StoreFuture<'a, RosterWrite> {
        Box::pin(self.roster_write("add_attendee", ADD_ATTENDEE, id, email))
    }

    fn remove_attendee<'a>(
        &'a self,
        id: EventId,
        email: &'a str,
    ) -> StoreFuture<'a, RosterWrite> {
        Box::pin(self.roster_write("remove_attendee", REMOVE_ATTENDEE, id, email))
    }

    fn events_for_attendee<'a>(&'a self, email: &'a str) -> StoreFuture<'a, Vec<Event>> {
        Box::pin(async move {
            let rows: Vec<(Value,)> = sqlx::query_as(
                "SELECT e.data
                 FROM events e
                 JOIN event_applications a ON a.event_id = e.id
                 WHERE a.attendees ? $1
                 ORDER BY e.date, e.id",
            )
            .bind(email)
            .fetch_all(&self.pool)
            .await
            .map_err(db_error("events_for_attendee"))?;

            rows.into_iter().map(|(json,)| decode_event(json)).collect()
        })
    }
}
