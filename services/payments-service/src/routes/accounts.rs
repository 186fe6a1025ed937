use crate::error::{AppError, AppResult};
use crate::models::Account;
use crate::repository;
use crate::state::AppState;
use actix_web::{get, post, web, HttpResponse};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct CreateAccountRequest {
    pub user_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct TopUpRequest {
    pub user_id: i64,
    pub amount: i64,
}

#[derive(Debug, Serialize)]
pub struct AccountResponse {
    pub user_id: i64,
    pub balance: i64,
}

impl From<Account> for AccountResponse {
    fn from(account: Account) -> Self {
        Self {
            user_id: account.user_id,
            balance: account.balance,
        }
    }
}

fn positive(value: i64, field: &str) -> Result<(), AppError> {
    if value <= 0 {
        return Err(AppError::Validation(format!("{field} must be positive")));
    }
    Ok(())
}

#[post("/accounts")]
pub async fn create_account(
    state: web::Data<AppState>,
    body: web::Json<CreateAccountRequest>,
) -> AppResult<HttpResponse> {
    positive(body.user_id, "user_id")?;

    let account = repository::accounts::create_account(&state.db, body.user_id).await?;
    Ok(HttpResponse::Created().json(AccountResponse::from(account)))
}

#[post("/accounts/topup")]
pub async fn topup(
    state: web::Data<AppState>,
    body: web::Json<TopUpRequest>,
) -> AppResult<HttpResponse> {
    positive(body.user_id, "user_id")?;
    positive(body.amount, "amount")?;

    let balance = repository::accounts::topup(&state.db, body.user_id, body.amount).await?;
    Ok(HttpResponse::Ok().json(AccountResponse {
        user_id: body.user_id,
        balance,
    }))
}

#[get("/accounts/{user_id}/balance")]
pub async fn get_balance(
    state: web::Data<AppState>,
    path: web::Path<i64>,
) -> AppResult<HttpResponse> {
    let user_id = path.into_inner();
    let account = repository::accounts::get_account(&state.db, user_id)
        .await?
        .ok_or(AppError::NotFound)?;

    Ok(HttpResponse::Ok().json(AccountResponse::from(account)))
}

#[get("/accounts")]
pub async fn list_accounts(state: web::Data<AppState>) -> AppResult<HttpResponse> {
    let accounts = repository::accounts::list_accounts(&state.db).await?;
    let response: Vec<AccountResponse> = accounts.into_iter().map(AccountResponse::from).collect();
    Ok(HttpResponse::Ok().json(response))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positive_accepts_positive_values() {
        assert!(positive(1, "user_id").is_ok());
        assert!(positive(i64::MAX, "amount").is_ok());
    }

    #[test]
    fn positive_rejects_zero_and_negative() {
        assert!(matches!(
            positive(0, "user_id"),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            positive(-10, "amount"),
            Err(AppError::Validation(_))
        ));
    }
}
