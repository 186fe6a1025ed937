use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A user's account. At most one row per user_id; balance is kept non-negative
/// by the conditional debit, never by an advisory read.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Account {
    pub id: i64,
    pub user_id: i64,
    pub balance: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
