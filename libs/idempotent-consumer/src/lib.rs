//! Inbox-based duplicate suppression for broker consumers.
//!
//! The broker delivers at least once; redeliveries after a crash or an
//! unacked timeout are routine. Each consuming service keeps an `inbox` table
//! of message ids it has applied, written in the same transaction as the
//! business effect, so a redelivered message commits nothing the second time.
//!
//! The suppression check and the recording are a single statement:
//!
//! ```sql
//! INSERT INTO inbox (message_id, payload) VALUES ($1, $2)
//! ON CONFLICT (message_id) DO NOTHING
//! ```
//!
//! Zero rows affected means another delivery of this message already went
//! through (or is committing concurrently; the unique index is the arbiter
//! either way). The caller acks without applying any effect. This replaces a
//! select-then-insert pair whose race window would otherwise surface as a
//! unique violation at commit.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use sqlx::PgPool;
//!
//! async fn handle(pool: &PgPool, message_id: &str, payload: serde_json::Value)
//!     -> anyhow::Result<()>
//! {
//!     let mut tx = pool.begin().await?;
//!     if !idempotent_consumer::try_record(&mut tx, message_id, &payload).await? {
//!         // duplicate: ack without effect
//!         return Ok(());
//!     }
//!     // ... apply business effect and enqueue downstream events on `tx` ...
//!     tx.commit().await?;
//!     Ok(())
//! }
//! ```

use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::debug;

mod error;

pub use error::{InboxError, InboxResult};

/// Upper bound on message id length; matches the producers' uuid ids with
/// plenty of slack for composed keys.
const MAX_MESSAGE_ID_LEN: usize = 255;

/// Record a message id in the inbox within the caller's open transaction.
///
/// Returns `true` if this is the first time the id was seen; the caller then
/// applies the business effect and commits. Returns `false` for a duplicate,
/// in which case the caller acks the delivery and applies nothing.
pub async fn try_record(
    tx: &mut Transaction<'_, Postgres>,
    message_id: &str,
    payload: &serde_json::Value,
) -> InboxResult<bool> {
    validate_message_id(message_id)?;

    let result = sqlx::query(
        r#"
        INSERT INTO inbox (message_id, payload)
        VALUES ($1, $2)
        ON CONFLICT (message_id) DO NOTHING
        "#,
    )
    .bind(message_id)
    .bind(payload)
    .execute(&mut **tx)
    .await?;

    let first_seen = result.rows_affected() > 0;
    if !first_seen {
        debug!(message_id = %message_id, "Duplicate message suppressed by inbox");
    }

    Ok(first_seen)
}

/// Whether a message id has been recorded. Diagnostics and tests only; the
/// consumer path uses [`try_record`], which checks and records atomically.
pub async fn contains(pool: &PgPool, message_id: &str) -> InboxResult<bool> {
    validate_message_id(message_id)?;

    let row = sqlx::query(
        r#"
        SELECT EXISTS(SELECT 1 FROM inbox WHERE message_id = $1) AS seen
        "#,
    )
    .bind(message_id)
    .fetch_one(pool)
    .await?;

    Ok(row.try_get("seen")?)
}

fn validate_message_id(message_id: &str) -> InboxResult<()> {
    if message_id.is_empty() {
        return Err(InboxError::InvalidMessageId(
            "message id cannot be empty".to_string(),
        ));
    }

    if message_id.len() > MAX_MESSAGE_ID_LEN {
        return Err(InboxError::InvalidMessageId(format!(
            "message id too long: {} characters (max {})",
            message_id.len(),
            MAX_MESSAGE_ID_LEN
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_accepts_uuid_sized_ids() {
        assert!(validate_message_id("3e8e32be-8c2f-4a0f-b7a0-1f0c2c9be9b1").is_ok());
        assert!(validate_message_id(&"x".repeat(MAX_MESSAGE_ID_LEN)).is_ok());
    }

    #[test]
    fn validate_rejects_empty_id() {
        assert!(matches!(
            validate_message_id(""),
            Err(InboxError::InvalidMessageId(_))
        ));
    }

    #[test]
    fn validate_rejects_oversized_id() {
        assert!(matches!(
            validate_message_id(&"x".repeat(MAX_MESSAGE_ID_LEN + 1)),
            Err(InboxError::InvalidMessageId(_))
        ));
    }
}
