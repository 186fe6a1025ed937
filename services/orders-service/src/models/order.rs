use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A customer order. Status starts at NEW and moves to exactly one of PAID or
/// CANCELLED when the payment decision arrives; nothing else mutates it.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Order {
    pub id: i64,
    pub user_id: i64,
    pub amount: i64,
    pub description: Option<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
