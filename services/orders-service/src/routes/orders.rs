//! Order write API.
//!
//! Creating an order never touches the broker: the handler commits the order
//! row together with its outbox row and returns immediately with status NEW.
//! The terminal status arrives asynchronously, by polling `GET /orders/{id}`
//! or through the gateway's live stream.

use crate::error::{AppError, AppResult};
use crate::models::Order;
use crate::repository;
use crate::state::AppState;
use actix_web::{get, post, web, HttpResponse};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    pub user_id: i64,
    pub amount: i64,
    pub description: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct OrderResponse {
    pub order_id: i64,
    pub user_id: i64,
    pub amount: i64,
    pub status: String,
}

impl From<Order> for OrderResponse {
    fn from(order: Order) -> Self {
        Self {
            order_id: order.id,
            user_id: order.user_id,
            amount: order.amount,
            status: order.status,
        }
    }
}

fn validate(req: &CreateOrderRequest) -> Result<(), AppError> {
    if req.user_id <= 0 {
        return Err(AppError::Validation("user_id must be positive".into()));
    }
    if req.amount <= 0 {
        return Err(AppError::Validation("amount must be positive".into()));
    }
    Ok(())
}

#[post("/orders")]
pub async fn create_order(
    state: web::Data<AppState>,
    body: web::Json<CreateOrderRequest>,
) -> AppResult<HttpResponse> {
    let body = body.into_inner();
    validate(&body)?;

    let order =
        repository::orders::create_order(&state.db, body.user_id, body.amount, body.description)
            .await?;

    Ok(HttpResponse::Created().json(OrderResponse::from(order)))
}

#[get("/orders")]
pub async fn list_orders(state: web::Data<AppState>) -> AppResult<HttpResponse> {
    let orders = repository::orders::list_orders(&state.db).await?;
    let response: Vec<OrderResponse> = orders.into_iter().map(OrderResponse::from).collect();
    Ok(HttpResponse::Ok().json(response))
}

#[get("/orders/{id}")]
pub async fn get_order(
    state: web::Data<AppState>,
    path: web::Path<i64>,
) -> AppResult<HttpResponse> {
    let order_id = path.into_inner();
    let order = repository::orders::get_order(&state.db, order_id)
        .await?
        .ok_or(AppError::NotFound)?;

    Ok(HttpResponse::Ok().json(OrderResponse::from(order)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(user_id: i64, amount: i64) -> CreateOrderRequest {
        CreateOrderRequest {
            user_id,
            amount,
            description: None,
        }
    }

    #[test]
    fn accepts_positive_user_and_amount() {
        assert!(validate(&request(1, 30)).is_ok());
    }

    #[test]
    fn rejects_non_positive_amount() {
        assert!(matches!(
            validate(&request(1, 0)),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            validate(&request(1, -5)),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn rejects_non_positive_user_id() {
        assert!(matches!(
            validate(&request(0, 10)),
            Err(AppError::Validation(_))
        ));
    }
}
