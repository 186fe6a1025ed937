use crate::error::{AppError, AppResult};
use crate::models::Account;
use sqlx::PgPool;

pub async fn create_account(pool: &PgPool, user_id: i64) -> AppResult<Account> {
    // Pre-check catches the common case; the UNIQUE constraint decides races
    if get_account(pool, user_id).await?.is_some() {
        return Err(AppError::Conflict);
    }

    let result = sqlx::query_as::<_, Account>(
        r#"
        INSERT INTO accounts (user_id, balance)
        VALUES ($1, 0)
        RETURNING id, user_id, balance, created_at, updated_at
        "#,
    )
    .bind(user_id)
    .fetch_one(pool)
    .await;

    match result {
        Ok(account) => Ok(account),
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Err(AppError::Conflict),
        Err(e) => Err(e.into()),
    }
}

pub async fn get_account(pool: &PgPool, user_id: i64) -> AppResult<Option<Account>> {
    let account = sqlx::query_as::<_, Account>(
        r#"
        SELECT id, user_id, balance, created_at, updated_at
        FROM accounts
        WHERE user_id = $1
        "#,
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    Ok(account)
}

pub async fn list_accounts(pool: &PgPool) -> AppResult<Vec<Account>> {
    let accounts = sqlx::query_as::<_, Account>(
        r#"
        SELECT id, user_id, balance, created_at, updated_at
        FROM accounts
        ORDER BY user_id
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(accounts)
}

/// Credit an account, returning the new balance. The increment is a single
/// atomic statement; a missing account surfaces as `NotFound`.
pub async fn topup(pool: &PgPool, user_id: i64, amount: i64) -> AppResult<i64> {
    let row: Option<(i64,)> = sqlx::query_as(
        r#"
        UPDATE accounts
        SET balance = balance + $2, updated_at = now()
        WHERE user_id = $1
        RETURNING balance
        "#,
    )
    .bind(user_id)
    .bind(amount)
    .fetch_optional(pool)
    .await?;

    row.map(|(balance,)| balance).ok_or(AppError::NotFound)
}
