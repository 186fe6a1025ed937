use lapin::Channel;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use transactional_outbox::{AmqpOutboxPublisher, OutboxRelay, SqlxOutboxRepository};

const BATCH_SIZE: i64 = 20;
const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Start the background relay that drains this service's outbox.
pub async fn start(pool: PgPool, channel: Channel) -> Result<(), lapin::Error> {
    amqp_utils::declare_exchange(&channel, event_schema::EXCHANGE).await?;

    let repository = Arc::new(SqlxOutboxRepository::new(pool));
    let publisher = Arc::new(AmqpOutboxPublisher::new(channel));
    let relay = OutboxRelay::new(repository, publisher, BATCH_SIZE, POLL_INTERVAL);

    tokio::spawn(async move {
        relay.run().await;
    });

    Ok(())
}
