use crate::error::AppResult;
use crate::proxy;
use crate::state::AppState;
use actix_web::{web, HttpRequest, HttpResponse};

pub async fn proxy_orders(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<String>,
    body: web::Bytes,
) -> AppResult<HttpResponse> {
    proxy::forward(
        &state.http,
        &state.config.orders_base_url,
        &path,
        &req,
        body,
    )
    .await
}

pub async fn proxy_payments(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<String>,
    body: web::Bytes,
) -> AppResult<HttpResponse> {
    proxy::forward(
        &state.http,
        &state.config.payments_base_url,
        &path,
        &req,
        body,
    )
    .await
}
