//! Transparent reverse proxy to the orders and payments services.
//!
//! Forwards the method, remaining path, query string, headers (minus host)
//! and body; returns the upstream status, content type and body unchanged.
//! The client carries a bounded timeout so a hung upstream cannot pin gateway
//! connections forever.

use crate::error::AppError;
use actix_web::{http::StatusCode, web, HttpRequest, HttpResponse};

pub async fn forward(
    client: &reqwest::Client,
    base_url: &str,
    tail: &str,
    req: &HttpRequest,
    body: web::Bytes,
) -> Result<HttpResponse, AppError> {
    let mut url = format!("{}/{}", base_url.trim_end_matches('/'), tail);
    if !req.query_string().is_empty() {
        url.push('?');
        url.push_str(req.query_string());
    }

    let method = reqwest::Method::from_bytes(req.method().as_str().as_bytes())
        .map_err(|e| AppError::Upstream(format!("method: {e}")))?;

    let mut upstream = client.request(method, &url);
    for (name, value) in req.headers() {
        if name.as_str().eq_ignore_ascii_case("host") {
            continue;
        }
        if let Ok(value) = value.to_str() {
            upstream = upstream.header(name.as_str(), value);
        }
    }

    let response = upstream
        .body(body.to_vec())
        .send()
        .await
        .map_err(|e| AppError::Upstream(e.to_string()))?;

    let status =
        StatusCode::from_u16(response.status().as_u16()).unwrap_or(StatusCode::BAD_GATEWAY);
    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("application/json")
        .to_string();

    let bytes = response
        .bytes()
        .await
        .map_err(|e| AppError::Upstream(e.to_string()))?;

    Ok(HttpResponse::build(status)
        .content_type(content_type)
        .body(bytes.to_vec()))
}
