//! Broker topology shared by all services.
//!
//! One durable direct exchange; durable queues bound by routing key. Every
//! producer and consumer takes its names from here so the wiring cannot drift.

use crate::event_type;

/// The single durable direct exchange all domain events flow through.
pub const EXCHANGE: &str = "events";

pub mod routing_key {
    pub const PAYMENT_REQUESTED: &str = "payment.requested";
    pub const PAYMENT_RESULT: &str = "payment.result";
    pub const ORDER_STATUS_CHANGED: &str = "order.status_changed";
}

pub mod queue {
    /// Payments worker input.
    pub const PAYMENT_REQUESTED: &str = "payments.payment_requested";
    /// Orders consumer input.
    pub const PAYMENT_RESULT: &str = "orders.payment_result";
    /// Gateway fan-out input.
    pub const ORDER_STATUS_CHANGED: &str = "gateway.order_status_changed";
}

/// Routing key for an outbox `event_type`, if the type is known.
pub fn routing_key_for(event_type: &str) -> Option<&'static str> {
    match event_type {
        event_type::PAYMENT_REQUESTED => Some(routing_key::PAYMENT_REQUESTED),
        event_type::PAYMENT_RESULT => Some(routing_key::PAYMENT_RESULT),
        event_type::ORDER_STATUS_CHANGED => Some(routing_key::ORDER_STATUS_CHANGED),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_event_type_routes() {
        assert_eq!(
            routing_key_for(event_type::PAYMENT_REQUESTED),
            Some("payment.requested")
        );
        assert_eq!(
            routing_key_for(event_type::PAYMENT_RESULT),
            Some("payment.result")
        );
        assert_eq!(
            routing_key_for(event_type::ORDER_STATUS_CHANGED),
            Some("order.status_changed")
        );
        assert_eq!(routing_key_for("UserCreated"), None);
    }
}
