use crate::error::AppResult;
use crate::models::Order;
use event_schema::{event_type, OrderStatus, PaymentRequested};
use sqlx::PgPool;
use tracing::info;

/// Create an order and its `PaymentRequested` outbox row in one transaction.
///
/// The event carries a fresh message id: this is the originating write of the
/// chain, and every downstream station reuses the same id.
pub async fn create_order(
    pool: &PgPool,
    user_id: i64,
    amount: i64,
    description: Option<String>,
) -> AppResult<Order> {
    let mut tx = pool.begin().await?;

    let order: Order = sqlx::query_as(
        r#"
        INSERT INTO orders (user_id, amount, description, status)
        VALUES ($1, $2, $3, $4)
        RETURNING id, user_id, amount, description, status, created_at, updated_at
        "#,
    )
    .bind(user_id)
    .bind(amount)
    .bind(&description)
    .bind(OrderStatus::New.as_db())
    .fetch_one(&mut *tx)
    .await?;

    let event = PaymentRequested::new(order.id, user_id, amount);
    transactional_outbox::enqueue(
        &mut tx,
        event_type::PAYMENT_REQUESTED,
        order.id,
        serde_json::to_value(&event)?,
    )
    .await?;

    tx.commit().await?;

    info!(
        order_id = order.id,
        user_id = user_id,
        amount = amount,
        message_id = %event.message_id,
        "Order created, payment requested"
    );

    Ok(order)
}

pub async fn get_order(pool: &PgPool, order_id: i64) -> AppResult<Option<Order>> {
    let order = sqlx::query_as::<_, Order>(
        r#"
        SELECT id, user_id, amount, description, status, created_at, updated_at
        FROM orders
        WHERE id = $1
        "#,
    )
    .bind(order_id)
    .fetch_optional(pool)
    .await?;

    Ok(order)
}

pub async fn list_orders(pool: &PgPool) -> AppResult<Vec<Order>> {
    let orders = sqlx::query_as::<_, Order>(
        r#"
        SELECT id, user_id, amount, description, status, created_at, updated_at
        FROM orders
        ORDER BY id
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(orders)
}
