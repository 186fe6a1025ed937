use crate::{OutboxPublisher, OutboxRepository, OutboxResult};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

/// Backoff between cycles after a database or broker error.
const ERROR_BACKOFF: Duration = Duration::from_secs(2);

/// Polling relay from the outbox table to the broker.
///
/// One relay runs per producing service. Running more than one is safe,
/// since consumers are idempotent, but wasteful, so nothing here coordinates
/// between instances.
pub struct OutboxRelay<R: OutboxRepository, P: OutboxPublisher> {
    repository: Arc<R>,
    publisher: Arc<P>,
    batch_size: i64,
    poll_interval: Duration,
}

impl<R: OutboxRepository, P: OutboxPublisher> OutboxRelay<R, P> {
    pub fn new(
        repository: Arc<R>,
        publisher: Arc<P>,
        batch_size: i64,
        poll_interval: Duration,
    ) -> Self {
        Self {
            repository,
            publisher,
            batch_size,
            poll_interval,
        }
    }

    /// Run the relay loop forever. Spawn as a background task.
    pub async fn run(&self) {
        info!(
            batch_size = self.batch_size,
            poll_interval_ms = self.poll_interval.as_millis() as u64,
            "Outbox relay starting"
        );

        loop {
            match self.publish_batch().await {
                Ok(0) => {}
                Ok(count) => info!(published = count, "Published outbox events"),
                Err(e) => {
                    // Rows stay unpublished and are retried next cycle; the
                    // relay never drops.
                    error!(error = %e, "Outbox relay cycle failed");
                    tokio::time::sleep(ERROR_BACKOFF).await;
                    continue;
                }
            }

            tokio::time::sleep(self.poll_interval).await;
        }
    }

    /// Publish one batch in id order and mark what went out.
    ///
    /// On a publish failure mid-batch, the already-published prefix is still
    /// marked; the remainder is retried next cycle in the same order, which
    /// preserves per-producer id order on the wire. Marking happens after
    /// publishing in a separate statement; a crash in between republishes the
    /// batch, which consumers suppress via their inbox.
    async fn publish_batch(&self) -> OutboxResult<usize> {
        let events = self.repository.fetch_unpublished(self.batch_size).await?;
        if events.is_empty() {
            return Ok(0);
        }

        let mut published_ids = Vec::with_capacity(events.len());
        let mut publish_error = None;

        for event in &events {
            match self.publisher.publish(event).await {
                Ok(()) => published_ids.push(event.id),
                Err(e) => {
                    publish_error = Some(e);
                    break;
                }
            }
        }

        if !published_ids.is_empty() {
            self.repository.mark_published(&published_ids).await?;
        }

        match publish_error {
            Some(e) => Err(e),
            None => Ok(published_ids.len()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{OutboxError, OutboxEvent};
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::Mutex;

    struct MemoryRepository {
        events: Mutex<Vec<OutboxEvent>>,
    }

    impl MemoryRepository {
        fn with_events(ids: &[i64]) -> Self {
            let events = ids
                .iter()
                .map(|&id| OutboxEvent {
                    id,
                    event_type: "PaymentRequested".to_string(),
                    aggregate_id: id,
                    payload: serde_json::json!({"order_id": id}),
                    created_at: Utc::now(),
                    published_at: None,
                })
                .collect();
            Self {
                events: Mutex::new(events),
            }
        }

        fn unpublished_ids(&self) -> Vec<i64> {
            self.events
                .lock()
                .unwrap()
                .iter()
                .filter(|e| e.published_at.is_none())
                .map(|e| e.id)
                .collect()
        }
    }

    #[async_trait]
    impl OutboxRepository for MemoryRepository {
        async fn fetch_unpublished(&self, limit: i64) -> OutboxResult<Vec<OutboxEvent>> {
            let mut pending: Vec<_> = self
                .events
                .lock()
                .unwrap()
                .iter()
                .filter(|e| e.published_at.is_none())
                .cloned()
                .collect();
            pending.sort_by_key(|e| e.id);
            pending.truncate(limit as usize);
            Ok(pending)
        }

        async fn mark_published(&self, ids: &[i64]) -> OutboxResult<()> {
            let mut events = self.events.lock().unwrap();
            for event in events.iter_mut() {
                if ids.contains(&event.id) && event.published_at.is_none() {
                    event.published_at = Some(Utc::now());
                }
            }
            Ok(())
        }
    }

    struct RecordingPublisher {
        published: Mutex<Vec<i64>>,
        fail_on: Option<i64>,
    }

    impl RecordingPublisher {
        fn new(fail_on: Option<i64>) -> Self {
            Self {
                published: Mutex::new(Vec::new()),
                fail_on,
            }
        }
    }

    #[async_trait]
    impl OutboxPublisher for RecordingPublisher {
        async fn publish(&self, event: &OutboxEvent) -> OutboxResult<()> {
            if self.fail_on == Some(event.id) {
                return Err(OutboxError::Publish("broker unreachable".to_string()));
            }
            self.published.lock().unwrap().push(event.id);
            Ok(())
        }
    }

    fn relay(
        repository: Arc<MemoryRepository>,
        publisher: Arc<RecordingPublisher>,
    ) -> OutboxRelay<MemoryRepository, RecordingPublisher> {
        OutboxRelay::new(repository, publisher, 20, Duration::from_secs(1))
    }

    #[tokio::test]
    async fn publishes_in_id_order_and_marks_batch() {
        let repository = Arc::new(MemoryRepository::with_events(&[3, 1, 2]));
        let publisher = Arc::new(RecordingPublisher::new(None));
        let relay = relay(repository.clone(), publisher.clone());

        let count = relay.publish_batch().await.unwrap();

        assert_eq!(count, 3);
        assert_eq!(*publisher.published.lock().unwrap(), vec![1, 2, 3]);
        assert!(repository.unpublished_ids().is_empty());
    }

    #[tokio::test]
    async fn failure_mid_batch_marks_published_prefix_only() {
        let repository = Arc::new(MemoryRepository::with_events(&[1, 2, 3]));
        let publisher = Arc::new(RecordingPublisher::new(Some(2)));
        let relay = relay(repository.clone(), publisher.clone());

        let result = relay.publish_batch().await;

        assert!(result.is_err());
        assert_eq!(*publisher.published.lock().unwrap(), vec![1]);
        // 2 and 3 stay pending for the next cycle, in order.
        assert_eq!(repository.unpublished_ids(), vec![2, 3]);
    }

    #[tokio::test]
    async fn next_cycle_retries_the_remainder() {
        let repository = Arc::new(MemoryRepository::with_events(&[1, 2]));
        let failing = Arc::new(RecordingPublisher::new(Some(2)));
        let relay_failing = relay(repository.clone(), failing.clone());

        assert!(relay_failing.publish_batch().await.is_err());

        let healthy = Arc::new(RecordingPublisher::new(None));
        let relay_healthy = relay(repository.clone(), healthy.clone());

        let count = relay_healthy.publish_batch().await.unwrap();
        assert_eq!(count, 1);
        assert_eq!(*healthy.published.lock().unwrap(), vec![2]);
        assert!(repository.unpublished_ids().is_empty());
    }

    #[tokio::test]
    async fn empty_outbox_is_a_quiet_cycle() {
        let repository = Arc::new(MemoryRepository::with_events(&[]));
        let publisher = Arc::new(RecordingPublisher::new(None));
        let relay = relay(repository, publisher.clone());

        assert_eq!(relay.publish_batch().await.unwrap(), 0);
        assert!(publisher.published.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn batch_size_bounds_a_cycle() {
        let ids: Vec<i64> = (1..=30).collect();
        let repository = Arc::new(MemoryRepository::with_events(&ids));
        let publisher = Arc::new(RecordingPublisher::new(None));
        let relay = relay(repository.clone(), publisher.clone());

        assert_eq!(relay.publish_batch().await.unwrap(), 20);
        assert_eq!(repository.unpublished_ids(), (21..=30).collect::<Vec<_>>());

        assert_eq!(relay.publish_batch().await.unwrap(), 10);
        assert!(repository.unpublished_ids().is_empty());
    }
}
