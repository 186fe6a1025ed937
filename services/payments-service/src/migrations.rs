use sqlx::{Pool, Postgres};

// Embed SQL migrations at compile time for deterministic startup
const MIG_0001: &str = include_str!("../migrations/0001_create_accounts.sql");
const MIG_0002: &str = include_str!("../migrations/0002_create_payment_transactions.sql");
const MIG_0003: &str = include_str!("../migrations/0003_create_outbox.sql");
const MIG_0004: &str = include_str!("../migrations/0004_create_inbox.sql");

pub async fn run_all(db: &Pool<Postgres>) -> Result<(), sqlx::Error> {
    // Statements are IF NOT EXISTS; reruns are no-ops
    for (i, sql) in [MIG_0001, MIG_0002, MIG_0003, MIG_0004]
        .into_iter()
        .enumerate()
    {
        sqlx::query(sql).execute(db).await?;
        tracing::info!(migration = i + 1, "payments-service migration applied");
    }
    Ok(())
}
