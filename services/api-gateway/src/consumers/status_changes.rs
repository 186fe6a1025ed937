//! Consumer for `order.status_changed` events.
//!
//! Forwards each event to the live subscribers of that order and acks once
//! the send loop is done, whatever the subscribers did; they are ephemeral
//! and not part of durability. Unknown order ids mean nobody is watching;
//! the message is dropped silently. Unparseable messages are logged and
//! acked: this is a read-only fan-out with no inbox, so requeueing a poison
//! message would only storm the queue.

use crate::websocket::SubscriberRegistry;
use event_schema::{topology::queue, topology::routing_key, OrderStatusChanged, EXCHANGE};
use futures_util::StreamExt;
use lapin::{options::BasicAckOptions, Channel};
use std::time::Duration;
use tracing::{debug, error, info, warn};

const CONSUMER_TAG: &str = "gateway-fanout";

/// Bind the queue and fan deliveries out until the stream ends.
pub async fn run(registry: SubscriberRegistry, channel: Channel) -> Result<(), lapin::Error> {
    amqp_utils::declare_exchange(&channel, EXCHANGE).await?;
    amqp_utils::bind_queue(
        &channel,
        EXCHANGE,
        queue::ORDER_STATUS_CHANGED,
        routing_key::ORDER_STATUS_CHANGED,
    )
    .await?;

    let mut consumer =
        amqp_utils::consume(&channel, queue::ORDER_STATUS_CHANGED, CONSUMER_TAG).await?;

    info!(queue = queue::ORDER_STATUS_CHANGED, "Gateway fan-out consumer started");

    while let Some(delivery) = consumer.next().await {
        match delivery {
            Ok(delivery) => {
                match serde_json::from_slice::<OrderStatusChanged>(&delivery.data) {
                    Ok(event) => match serde_json::to_string(&event) {
                        Ok(frame) => {
                            registry.broadcast(event.order_id, frame).await;
                            debug!(
                                order_id = event.order_id,
                                status = event.status.as_db(),
                                "Status change fanned out"
                            );
                        }
                        Err(e) => error!(error = %e, "Failed to serialize status frame"),
                    },
                    Err(e) => {
                        error!(error = %e, "Unparseable status change event");
                    }
                }

                if let Err(e) = delivery.ack(BasicAckOptions::default()).await {
                    error!(error = %e, "Failed to ack fan-out delivery");
                }
            }
            Err(e) => {
                error!(error = %e, "Delivery stream error");
                tokio::time::sleep(Duration::from_secs(5)).await;
            }
        }
    }

    warn!("Gateway fan-out consumer stream ended");
    Ok(())
}
