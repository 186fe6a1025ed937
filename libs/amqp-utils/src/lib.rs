//! RabbitMQ connection and topology helpers shared by all services.
//!
//! Wraps the handful of lapin calls every producer and consumer needs: connect
//! with backoff, declare the durable direct exchange, declare-and-bind durable
//! queues, start consumers, and publish persistent JSON messages.

use lapin::{
    options::{
        BasicConsumeOptions, BasicPublishOptions, ExchangeDeclareOptions, QueueBindOptions,
        QueueDeclareOptions,
    },
    types::FieldTable,
    BasicProperties, Channel, Connection, ConnectionProperties, Consumer, ExchangeKind,
};
use std::time::Duration;
use tracing::{info, warn};

/// AMQP delivery mode for messages that must survive a broker restart.
const DELIVERY_MODE_PERSISTENT: u8 = 2;

const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(10);

/// Connect to the broker, retrying with exponential backoff (capped at 10s)
/// until it accepts the connection.
///
/// Services call this at startup; the broker routinely comes up after its
/// dependents during deployments, so a refused connection is not fatal.
pub async fn connect_with_retry(amqp_url: &str) -> Connection {
    let mut delay = INITIAL_BACKOFF;
    loop {
        match Connection::connect(amqp_url, ConnectionProperties::default()).await {
            Ok(connection) => {
                info!("Connected to broker");
                return connection;
            }
            Err(e) => {
                warn!(error = %e, retry_in_secs = delay.as_secs(), "Broker not ready yet");
                tokio::time::sleep(delay).await;
                delay = (delay * 2).min(MAX_BACKOFF);
            }
        }
    }
}

/// Declare the durable direct exchange all domain events flow through.
pub async fn declare_exchange(channel: &Channel, exchange: &str) -> Result<(), lapin::Error> {
    channel
        .exchange_declare(
            exchange,
            ExchangeKind::Direct,
            ExchangeDeclareOptions {
                durable: true,
                ..Default::default()
            },
            FieldTable::default(),
        )
        .await
}

/// Declare a durable queue and bind it to the exchange under a routing key.
pub async fn bind_queue(
    channel: &Channel,
    exchange: &str,
    queue: &str,
    routing_key: &str,
) -> Result<(), lapin::Error> {
    channel
        .queue_declare(
            queue,
            QueueDeclareOptions {
                durable: true,
                ..Default::default()
            },
            FieldTable::default(),
        )
        .await?;

    channel
        .queue_bind(
            queue,
            exchange,
            routing_key,
            QueueBindOptions::default(),
            FieldTable::default(),
        )
        .await
}

/// Start consuming a queue. The caller drives the returned stream and acks or
/// nacks each delivery explicitly.
pub async fn consume(
    channel: &Channel,
    queue: &str,
    consumer_tag: &str,
) -> Result<Consumer, lapin::Error> {
    channel
        .basic_consume(
            queue,
            consumer_tag,
            BasicConsumeOptions::default(),
            FieldTable::default(),
        )
        .await
}

/// Publish a persistent JSON message to the exchange under a routing key.
pub async fn publish_json(
    channel: &Channel,
    exchange: &str,
    routing_key: &str,
    body: &[u8],
) -> Result<(), lapin::Error> {
    channel
        .basic_publish(
            exchange,
            routing_key,
            BasicPublishOptions::default(),
            body,
            BasicProperties::default()
                .with_content_type("application/json".into())
                .with_delivery_mode(DELIVERY_MODE_PERSISTENT),
        )
        .await?
        .await?;

    Ok(())
}
