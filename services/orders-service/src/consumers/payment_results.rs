//! Consumer for `payment.result` events.
//!
//! Each delivery is processed inside one database transaction: inbox record,
//! order status update, and the `OrderStatusChanged` outbox row commit
//! together or not at all. Duplicates are acked without effect; unexpected
//! failures roll back and nack with requeue so the broker redelivers.

use crate::error::AppResult;
use event_schema::{
    event_type, topology::queue, topology::routing_key, OrderStatus, OrderStatusChanged,
    PaymentResult, EXCHANGE,
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

const CONSUMER_TAG: &str = "orders-payment-result";

/// What a delivery did to local state. Both variants end in an ack.
#[derive(Debug, PartialEq, Eq)]
pub enum Applied {
    /// First delivery: order updated, fan-out event enqueued.
    Updated(OrderStatus),
    /// Redelivery suppressed by the inbox.
    Duplicate,
}

/// Apply a payment result to the order, exactly once per message id.
pub async fn apply_payment_result(pool: &PgPool, result: &PaymentResult) -> AppResult<Applied> {
    let mut tx = pool.begin().await?;

    let payload = serde_json::to_value(result)?;
    if !idempotent_consumer::try_record(&mut tx, &result.message_id, &payload).await? {
        tx.rollback().await?;
        return Ok(Applied::Duplicate);
    }

    let status = OrderStatus::from_payment(result.status);

    let updated = sqlx::query(
        r#"
        UPDATE orders
        SET status = $1, updated_at = now()
        WHERE id = $2
        "#,
    )
    .bind(status.as_db())
    .bind(result.order_id)
    .execute(&mut *tx)
    .await?;

    if updated.rows_affected() == 0 {
        // The originating write commits before its event can be published, so
        // this only happens if the order's database was lost independently.
        warn!(order_id = result.order_id, "Payment result for unknown order");
    }

    let event = OrderStatusChanged {
        order_id: result.order_id,
        status,
    };
    transactional_outbox::enqueue(
        &mut tx,
        event_type::ORDER_STATUS_CHANGED,
        result.order_id,
        serde_json::to_value(&event)?,
    )
    .await?;

    tx.commit().await?;

    Ok(Applied::Updated(status))
}

/// Bind the queue and process deliveries until the stream ends.
pub async fn run(pool: PgPool, channel: Channel) -> Result<(), lapin::Error> {
    amqp_utils::declare_exchange(&channel, EXCHANGE).await?;
    amqp_utils::bind_queue(
        &channel,
        EXCHANGE,
        queue::PAYMENT_RESULT,
        routing_key::PAYMENT_RESULT,
    )
    .await?;

    let mut consumer = amqp_utils::consume(&channel, queue::PAYMENT_RESULT, CONSUMER_TAG).await?;

    info!(queue = queue::PAYMENT_RESULT, "Orders consumer started");

    while let Some(delivery) = consumer.next().await {
        match delivery {
            Ok(delivery) => handle_delivery(&pool, delivery).await,
            Err(e) => {
                error!(error = %e, "Delivery stream error");
                tokio::time::sleep(Duration::from_secs(5)).await;
            }
        }
    }

    warn!("Orders consumer stream ended");
    Ok(())
}

async fn handle_delivery(pool: &PgPool, delivery: Delivery) {
    let result: PaymentResult = match serde_json::from_slice(&delivery.data) {
        Ok(payload) => payload,
        Err(e) => {
            // Poison message: requeueing would redeliver it forever
            error!(error = %e, "Unparseable payment result");
            nack(&delivery, false).await;
            return;
        }
    };

    match apply_payment_result(pool, &result).await {
        Ok(Applied::Updated(status)) => {
            info!(
                order_id = result.order_id,
                status = status.as_db(),
                "Order status updated"
            );
            ack(&delivery).await;
        }
        Ok(Applied::Duplicate) => {
            debug!(
                order_id = result.order_id,
                message_id = %result.message_id,
                "Duplicate payment result suppressed"
            );
            ack(&delivery).await;
        }
        Err(e) => {
            error!(
                order_id = result.order_id,
                error = %e,
                "Failed to apply payment result, requeueing"
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
