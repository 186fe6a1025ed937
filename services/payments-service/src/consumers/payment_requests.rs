//! Worker for `payment.requested` events.
//!
//! One transaction per delivery covers the inbox record, the conditional
//! debit, the `payment_transactions` decision row, and the `PaymentResult`
//! outbox row. The reply reuses the inbound message id, so the whole
//! request/reply chain shares one idempotency key.
//!
//! Correctness does not depend on delivery order or consumer count:
//! - the inbox suppresses redeliveries,
//! - UNIQUE(order_id) on `payment_transactions` makes the decision
//!   at-most-once (a racing duplicate fails at insert, rolls back, and the
//!   redelivery is then suppressed),
//! - the debit tests and subtracts in one UPDATE, so the balance cannot go
//!   negative no matter how many workers race on one account.

use crate::error::AppResult;
use event_schema::{
    event_type, reason, topology::queue, topology::routing_key, PaymentRequested, PaymentResult,
    PaymentStatus, EXCHANGE,
};
use futures_util::StreamExt;
use lapin::{
    message::Delivery,
    options::{BasicAckOptions, BasicNackOptions},
    Channel,
};
use sqlx::PgPool;
use std::time::Duration;
use tracing::{debug, error, info, warn};

const CONSUMER_TAG: &str = "payments-worker";

/// What a delivery did. Every variant ends in an ack.
#[derive(Debug, PartialEq, Eq)]
pub enum Outcome {
    /// First delivery: decision made and reply enqueued.
    Decided(PaymentStatus),
    /// Redelivery suppressed by the inbox.
    Duplicate,
    /// A decision for this order already exists (redelivered request whose
    /// reply was already generated under a different inbox state).
    AlreadyDecided,
}

/// Decide a payment exactly once per order.
pub async fn process_payment_request(
    pool: &PgPool,
    request: &PaymentRequested,
) -> AppResult<Outcome> {
    let mut tx = pool.begin().await?;

    let payload = serde_json::to_value(request)?;
    if !idempotent_consumer::try_record(&mut tx, &request.message_id, &payload).await? {
        tx.rollback().await?;
        return Ok(Outcome::Duplicate);
    }

    let decided: Option<(i64,)> =
        sqlx::query_as("SELECT id FROM payment_transactions WHERE order_id = $1")
            .bind(request.order_id)
            .fetch_optional(&mut *tx)
            .await?;
    if decided.is_some() {
        // Keep the inbox record so the next redelivery stops one step earlier
        tx.commit().await?;
        return Ok(Outcome::AlreadyDecided);
    }

    let account: Option<(i64,)> = sqlx::query_as("SELECT id FROM accounts WHERE user_id = $1")
        .bind(request.user_id)
        .fetch_optional(&mut *tx)
        .await?;

    let (status, failure) = match account {
        None => (PaymentStatus::Failed, Some(reason::ACCOUNT_NOT_FOUND)),
        Some(_) => {
            // Conditional debit: test and subtract in one statement. The row
            // lock it takes also serializes concurrent requests against the
            // same account.
            let debited: Option<(i64,)> = sqlx::query_as(
                r#"
                UPDATE accounts
                SET balance = balance - $2, updated_at = now()
                WHERE user_id = $1 AND balance >= $2
                RETURNING balance
                "#,
            )
            .bind(request.user_id)
            .bind(request.amount)
            .fetch_optional(&mut *tx)
            .await?;

            match debited {
                Some((balance,)) => {
                    debug!(
                        user_id = request.user_id,
                        balance = balance,
                        "Account debited"
                    );
                    (PaymentStatus::Success, None)
                }
                None => (PaymentStatus::Failed, Some(reason::INSUFFICIENT_FUNDS)),
            }
        }
    };

    sqlx::query(
        r#"
        INSERT INTO payment_transactions (order_id, user_id, amount, status, reason)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(request.order_id)
    .bind(request.user_id)
    .bind(request.amount)
    .bind(status.as_db())
    .bind(failure)
    .execute(&mut *tx)
    .await?;

    let result = PaymentResult {
        message_id: request.message_id.clone(),
        order_id: request.order_id,
        status,
        reason: failure.map(String::from),
    };
    transactional_outbox::enqueue(
        &mut tx,
        event_type::PAYMENT_RESULT,
        request.order_id,
        serde_json::to_value(&result)?,
    )
    .await?;

    tx.commit().await?;

    Ok(Outcome::Decided(status))
}

/// Bind the queue and process deliveries until the stream ends.
pub async fn run(pool: PgPool, channel: Channel) -> Result<(), lapin::Error> {
    amqp_utils::declare_exchange(&channel, EXCHANGE).await?;
    amqp_utils::bind_queue(
        &channel,
        EXCHANGE,
        queue::PAYMENT_REQUESTED,
        routing_key::PAYMENT_REQUESTED,
    )
    .await?;

    let mut consumer =
        amqp_utils::consume(&channel, queue::PAYMENT_REQUESTED, CONSUMER_TAG).await?;

    info!(queue = queue::PAYMENT_REQUESTED, "Payments worker started");

    while let Some(delivery) = consumer.next().await {
        match delivery {
            Ok(delivery) => handle_delivery(&pool, delivery).await,
            Err(e) => {
                error!(error = %e, "Delivery stream error");
                tokio::time::sleep(Duration::from_secs(5)).await;
            }
        }
    }

    warn!("Payments worker stream ended");
    Ok(())
}

async fn handle_delivery(pool: &PgPool, delivery: Delivery) {
    let request: PaymentRequested = match serde_json::from_slice(&delivery.data) {
        Ok(payload) => payload,
        Err(e) => {
            // Poison message: requeueing would redeliver it forever
            error!(error = %e, "Unparseable payment request");
            nack(&delivery, false).await;
            return;
        }
    };

    match process_payment_request(pool, &request).await {
        Ok(Outcome::Decided(status)) => {
            info!(
                order_id = request.order_id,
                user_id = request.user_id,
                amount = request.amount,
                status = status.as_db(),
                "Payment decided"
            );
            ack(&delivery).await;
        }
        Ok(Outcome::Duplicate) | Ok(Outcome::AlreadyDecided) => {
            debug!(
                order_id = request.order_id,
                message_id = %request.message_id,
                "Duplicate payment request suppressed"
            );
            ack(&delivery).await;
        }
        Err(e) => {
            error!(
                order_id = request.order_id,
                error = %e,
                "Failed to process payment request, requeueing"
            );
            nack(&delivery, true).await;
        }
    }
}

async fn ack(delivery: &Delivery) {
    if let Err(e) = delivery.ack(BasicAckOptions::default()).await {
        error!(error = %e, "Failed to ack delivery");
    }
}

async fn nack(delivery: &Delivery, requeue: bool) {
    let options = BasicNackOptions {
        requeue,
        ..Default::default()
    };
    if let Err(e) = delivery.nack(options).await {
        error!(error = %e, "Failed to nack delivery");
    }
}
