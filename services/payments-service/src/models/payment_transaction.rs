use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The decision record for one order. Inserted once, never mutated; the
/// UNIQUE(order_id) constraint is what makes the decision at-most-once.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct PaymentTransaction {
    pub id: i64,
    pub order_id: i64,
    pub user_id: i64,
    pub amount: i64,
    pub status: String,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
}
