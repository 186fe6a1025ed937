use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use api_gateway::{config, consumers, error, logging, routes, state::AppState, websocket};
use std::sync::Arc;
use std::time::Duration;

#[actix_web::main]
async fn main() -> Result<(), error::AppError> {
    logging::init_tracing();
    let cfg = Arc::new(config::Config::from_env()?);

    let registry = websocket::SubscriberRegistry::new();

    let broker = amqp_utils::connect_with_retry(&cfg.amqp_url).await;
    let channel = broker
        .create_channel()
        .await
        .map_err(|e| error::AppError::StartServer(format!("broker channel: {e}")))?;

    let consumer_registry = registry.clone();
    tokio::spawn(async move {
        if let Err(e) = consumers::status_changes::run(consumer_registry, channel).await {
            tracing::error!(error = %e, "Status change consumer failed");
        }
    });

    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(cfg.proxy_timeout_secs))
        .build()
        .map_err(|e| error::AppError::StartServer(format!("http client: {e}")))?;

    let state = AppState {
        registry,
        http,
        config: cfg.clone(),
    };

    tracing::info!(host = %cfg.host, port = cfg.port, "api-gateway listening");

    HttpServer::new(move || {
        let mut cors = Cors::default()
            .allow_any_method()
            .allow_any_header()
            .supports_credentials();
        for origin in &state.config.cors_allowed_origins {
            cors = cors.allowed_origin(origin);
        }

        App::new()
            .wrap(cors)
            .app_data(web::Data::new(state.clone()))
            .service(routes::health::health)
            .service(routes::wsroute::ws_orders)
            .service(web::resource("/orders/{tail:.*}").to(routes::proxy::proxy_orders))
            .service(web::resource("/payments/{tail:.*}").to(routes::proxy::proxy_payments))
    })
    .bind((cfg.host.as_str(), cfg.port))
    .map_err(|e| error::AppError::StartServer(e.to_string()))?
    .run()
    .await
    .map_err(|e| error::AppError::StartServer(e.to_string()))
}
