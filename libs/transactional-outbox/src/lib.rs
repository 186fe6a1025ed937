//! Transactional outbox for reliable event publishing.
//!
//! A service that needs to emit an event writes it to its own `outbox` table
//! in the same transaction as the state change that produced it, so either
//! both become visible or neither does. A background relay then moves committed
//! rows to the broker with at-least-once delivery:
//!
//! 1. fetch a bounded batch of unpublished rows ordered by id
//! 2. publish each as a persistent message, in id order
//! 3. mark the published ids in a single UPDATE
//! 4. sleep and repeat
//!
//! A crash between steps 2 and 3 republishes the batch on restart; consumers
//! suppress the duplicates through their inbox. The relay never deletes rows
//! and never drops one on error: broker and database failures are logged and
//! the batch is retried on the next cycle. `published_at` moving from NULL to
//! a timestamp is the only observable transition.
//!
//! ## Writing events
//!
//! ```rust,no_run
//! use sqlx::PgPool;
//! use serde_json::json;
//!
//! async fn create_thing(pool: &PgPool) -> anyhow::Result<()> {
//!     let mut tx = pool.begin().await?;
//!     // 1. business write
//!     sqlx::query("INSERT INTO things (name) VALUES ($1)")
//!         .bind("example")
//!         .execute(&mut *tx)
//!         .await?;
//!     // 2. outbox row in the same transaction
//!     transactional_outbox::enqueue(
//!         &mut tx,
//!         "ThingCreated",
//!         42,
//!         json!({"thing_id": 42}),
//!     )
//!     .await?;
//!     // 3. both or neither
//!     tx.commit().await?;
//!     Ok(())
//! }
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lapin::Channel;
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, Transaction};
use tracing::debug;

mod error;
mod relay;

pub use error::{OutboxError, OutboxResult};
pub use relay::OutboxRelay;

/// A domain event stored in the `outbox` table.
///
/// Ids are assigned by the database at insert time, inside the producing
/// transaction, so id order is write order per producer.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct OutboxEvent {
    pub id: i64,
    pub event_type: String,
    pub aggregate_id: i64,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub published_at: Option<DateTime<Utc>>,
}

/// Insert an event into the outbox within the caller's open transaction.
///
/// There is deliberately no pool-based variant: an outbox row written outside
/// the transaction that produced the state change loses the atomicity the
/// pattern exists for.
pub async fn enqueue(
    tx: &mut Transaction<'_, Postgres>,
    event_type: &str,
    aggregate_id: i64,
    payload: serde_json::Value,
) -> OutboxResult<i64> {
    let row: (i64,) = sqlx::query_as(
        r#"
        INSERT INTO outbox (event_type, aggregate_id, payload)
        VALUES ($1, $2, $3)
        RETURNING id
        "#,
    )
    .bind(event_type)
    .bind(aggregate_id)
    .bind(&payload)
    .fetch_one(&mut **tx)
    .await?;

    debug!(
        outbox_id = row.0,
        event_type = %event_type,
        aggregate_id = aggregate_id,
        "Event enqueued in outbox"
    );

    Ok(row.0)
}

/// Read side of the outbox, consumed by the relay.
#[async_trait]
pub trait OutboxRepository: Send + Sync {
    /// Unpublished rows ordered by id ascending, bounded by `limit`.
    async fn fetch_unpublished(&self, limit: i64) -> OutboxResult<Vec<OutboxEvent>>;

    /// Mark a batch of rows published in one statement. Write-once: rows keep
    /// their first `published_at`.
    async fn mark_published(&self, ids: &[i64]) -> OutboxResult<()>;
}

/// SQLx-backed outbox repository.
pub struct SqlxOutboxRepository {
    pool: PgPool,
}

impl SqlxOutboxRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OutboxRepository for SqlxOutboxRepository {
    async fn fetch_unpublished(&self, limit: i64) -> OutboxResult<Vec<OutboxEvent>> {
        let events = sqlx::query_as::<_, OutboxEvent>(
            r#"
            SELECT id, event_type, aggregate_id, payload, created_at, published_at
            FROM outbox
            WHERE published_at IS NULL
            ORDER BY id ASC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(events)
    }

    async fn mark_published(&self, ids: &[i64]) -> OutboxResult<()> {
        sqlx::query(
            r#"
            UPDATE outbox
            SET published_at = now()
            WHERE id = ANY($1) AND published_at IS NULL
            "#,
        )
        .bind(ids)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

/// Publisher seam between the relay and the broker.
#[async_trait]
pub trait OutboxPublisher: Send + Sync {
    async fn publish(&self, event: &OutboxEvent) -> OutboxResult<()>;
}

/// AMQP publisher: persistent JSON message to the shared direct exchange, with
/// the routing key derived from the event type.
pub struct AmqpOutboxPublisher {
    channel: Channel,
    exchange: String,
}

impl AmqpOutboxPublisher {
    pub fn new(channel: Channel) -> Self {
        Self {
            channel,
            exchange: event_schema::EXCHANGE.to_string(),
        }
    }
}

#[async_trait]
impl OutboxPublisher for AmqpOutboxPublisher {
    async fn publish(&self, event: &OutboxEvent) -> OutboxResult<()> {
        let routing_key = event_schema::routing_key_for(&event.event_type)
            .ok_or_else(|| OutboxError::Unroutable(event.event_type.clone()))?;

        let body = serde_json::to_vec(&event.payload)?;

        amqp_utils::publish_json(&self.channel, &self.exchange, routing_key, &body)
            .await
            .map_err(|e| OutboxError::Publish(e.to_string()))?;

        debug!(
            outbox_id = event.id,
            event_type = %event.event_type,
            routing_key = %routing_key,
            "Event published"
        );

        Ok(())
    }
}
