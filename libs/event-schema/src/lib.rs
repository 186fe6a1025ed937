//! Event schema registry for the order-and-payments pipeline.
//!
//! Defines the wire payloads exchanged through the broker and the broker
//! topology (exchange, queues, routing keys) every service agrees on. Payloads
//! are plain JSON; each carries the aggregate id, and all idempotency-tracked
//! events carry a producer-chosen `message_id` that is reused across the whole
//! request/reply chain so every station can suppress duplicates with one key.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub mod topology;

pub use topology::{routing_key_for, EXCHANGE};

/// Event type names as stored in the outbox `event_type` column.
pub mod event_type {
    pub const PAYMENT_REQUESTED: &str = "PaymentRequested";
    pub const PAYMENT_RESULT: &str = "PaymentResult";
    pub const ORDER_STATUS_CHANGED: &str = "OrderStatusChanged";
}

/// Outcome of a payment decision. Terminal once written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Success,
    Failed,
}

impl PaymentStatus {
    pub fn as_db(&self) -> &'static str {
        match self {
            PaymentStatus::Success => "SUCCESS",
            PaymentStatus::Failed => "FAILED",
        }
    }
}

/// Order lifecycle status. Starts at NEW; moves to exactly one terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    New,
    Paid,
    Cancelled,
}

impl OrderStatus {
    pub fn as_db(&self) -> &'static str {
        match self {
            OrderStatus::New => "NEW",
            OrderStatus::Paid => "PAID",
            OrderStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn from_db(s: &str) -> Option<Self> {
        match s {
            "NEW" => Some(OrderStatus::New),
            "PAID" => Some(OrderStatus::Paid),
            "CANCELLED" => Some(OrderStatus::Cancelled),
            _ => None,
        }
    }

    /// The terminal status an order takes for a given payment outcome.
    pub fn from_payment(status: PaymentStatus) -> Self {
        match status {
            PaymentStatus::Success => OrderStatus::Paid,
            PaymentStatus::Failed => OrderStatus::Cancelled,
        }
    }
}

/// Emitted by the orders service when an order is created; consumed by the
/// payments worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRequested {
    pub message_id: String,
    pub order_id: i64,
    pub user_id: i64,
    pub amount: i64,
}

impl PaymentRequested {
    /// Build the originating event for a new order with a fresh message id.
    pub fn new(order_id: i64, user_id: i64, amount: i64) -> Self {
        Self {
            message_id: Uuid::new_v4().to_string(),
            order_id,
            user_id,
            amount,
        }
    }
}

/// Emitted by the payments worker once per order; consumed by the orders
/// service. Reuses the inbound `message_id` so the reply is idempotent under
/// the same key as the request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentResult {
    pub message_id: String,
    pub order_id: i64,
    pub status: PaymentStatus,
    pub reason: Option<String>,
}

/// Failure reasons carried on `PaymentResult.reason`.
pub mod reason {
    pub const ACCOUNT_NOT_FOUND: &str = "ACCOUNT_NOT_FOUND";
    pub const INSUFFICIENT_FUNDS: &str = "INSUFFICIENT_FUNDS";
}

/// Emitted by the orders service on a terminal status change; consumed by the
/// gateway fan-out. Carries no `message_id`; the fan-out is best-effort and
/// not idempotency-tracked.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderStatusChanged {
    pub order_id: i64,
    pub status: OrderStatus,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn payment_status_wire_spelling() {
        assert_eq!(
            serde_json::to_value(PaymentStatus::Success).unwrap(),
            json!("SUCCESS")
        );
        assert_eq!(
            serde_json::to_value(PaymentStatus::Failed).unwrap(),
            json!("FAILED")
        );
    }

    #[test]
    fn payment_result_reason_is_nullable() {
        let result = PaymentResult {
            message_id: "m-1".into(),
            order_id: 7,
            status: PaymentStatus::Success,
            reason: None,
        };
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["reason"], serde_json::Value::Null);
        assert_eq!(value["order_id"], json!(7));
    }

    #[test]
    fn payment_requested_gets_fresh_message_ids() {
        let a = PaymentRequested::new(1, 2, 30);
        let b = PaymentRequested::new(1, 2, 30);
        assert_ne!(a.message_id, b.message_id);
        assert!(Uuid::parse_str(&a.message_id).is_ok());
    }

    #[test]
    fn order_status_follows_payment_outcome() {
        assert_eq!(
            OrderStatus::from_payment(PaymentStatus::Success),
            OrderStatus::Paid
        );
        assert_eq!(
            OrderStatus::from_payment(PaymentStatus::Failed),
            OrderStatus::Cancelled
        );
    }

    #[test]
    fn order_status_db_round_trip() {
        for status in [OrderStatus::New, OrderStatus::Paid, OrderStatus::Cancelled] {
            assert_eq!(OrderStatus::from_db(status.as_db()), Some(status));
        }
        assert_eq!(OrderStatus::from_db("SHIPPED"), None);
    }
}
