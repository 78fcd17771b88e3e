//! Mailing-list subscriptions backed by the `mailing_list` table.

use crate::db_error;
use event_hub_core::event_store::{StoreFuture, SubscriptionStore};
use sqlx::PgPool;

/// One row per `(category, email)` pair.
#[derive(Clone, Debug)]
pub struct PostgresSubscriptionStore {
    pool: PgPool,
}

impl PostgresSubscriptionStore {
    /// Share a pool with the event store.
    #[must_use]
    pub const fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl SubscriptionStore for PostgresSubscriptionStore {
    fn subscribe<'a>(&'a self, category: &'a str, email: &'a str) -> StoreFuture<'a, bool> {
        Box::pin(async move {
            let result = sqlx::query(
                "INSERT INTO mailing_list (category, email) VALUES ($1, $2)
                 ON CONFLICT (category, email) DO NOTHING",
            )
            .bind(category)
            .bind(email)
            .execute(&self.pool)
            .await
            .map_err(db_error("subscribe"))?;

            Ok(result.rows_affected() > 0)
        })
    }

    fn unsubscribe<'a>(&'a self, category: &'a str, email: &'a str) -> StoreFuture<'a, bool> {
        Box::pin(async move {
            let result = sqlx::query("DELETE FROM mailing_list WHERE category = $1 AND email = $2")
                .bind(category)
                .bind(email)
                .execute(&self.pool)
                .await
                .map_err(db_error("unsubscribe"))?;

            Ok(result.rows_affected() > 0)
        })
    }

    fn subscribers<'a>(&'a self, category: &'a str) -> StoreFuture<'a, Vec<String>> {
        Box::pin(async move {
            let rows: Vec<(String,)> = sqlx::query_as(
                "SELECT email FROM mailing_list WHERE category = $1 ORDER BY email",
            )
            .bind(category)
            .fetch_all(&self.pool)
            .await
            .map_err(db_error("subscribers"))?;

            Ok(rows.into_iter().map(|(email,)| email).collect())
        })
    }
}
