use actix_web::{web, App, HttpServer};
use payments_service::{
    config, consumers, db, error, logging, migrations, routes, state::AppState, workers,
};
use std::sync::Arc;

#[actix_web::main]
async fn main() -> Result<(), error::AppError> {
    logging::init_tracing();
    let cfg = Arc::new(config::Config::from_env()?);

    let db = db::init_pool(&cfg.database_url)
        .await
        .map_err(|e| error::AppError::StartServer(format!("db: {e}")))?;

    // Schema must be in place before the API or the worker touch it
    migrations::run_all(&db)
        .await
        .map_err(|e| error::AppError::StartServer(format!("migrations: {e}")))?;

    let broker = amqp_utils::connect_with_retry(&cfg.amqp_url).await;

    let relay_channel = broker
        .create_channel()
        .await
        .map_err(|e| error::AppError::StartServer(format!("broker channel: {e}")))?;
    workers::outbox_relay::start(db.clone(), relay_channel)
        .await
        .map_err(|e| error::AppError::StartServer(format!("outbox relay: {e}")))?;

    let worker_channel = broker
        .create_channel()
        .await
        .map_err(|e| error::AppError::StartServer(format!("broker channel: {e}")))?;
    let worker_pool = db.clone();
    tokio::spawn(async move {
        if let Err(e) = consumers::payment_requests::run(worker_pool, worker_channel).await {
            tracing::error!(error = %e, "Payment request worker failed");
        }
    });

    let state = AppState {
        db: db.clone(),
        config: cfg.clone(),
    };

    tracing::info!(host = %cfg.host, port = cfg.port, "payments-service listening");

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(state.clone()))
            .service(routes::health::health)
            .service(routes::accounts::create_account)
            .service(routes::accounts::topup)
            .service(routes::accounts::get_balance)
            .service(routes::accounts::list_accounts)
    })
    .bind((cfg.host.as_str(), cfg.port))
    .map_err(|e| error::AppError::StartServer(e.to_string()))?
    .run()
    .await
    .map_err(|e| error::AppError::StartServer(e.to_string()))
}
