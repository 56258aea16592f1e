//! JetStream-backed bus.
//!
//! Each topic is one stream with a subject per partition
//! (`<topic>.<partition>`). Every service consumes each partition through its
//! own durable pull consumer, handled by one task, so events of a partition
//! are processed one at a time and in order.

use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Context;
use async_nats::jetstream::{self, AckKind, consumer::pull, stream};
use bytes::Bytes;
use futures::StreamExt;
use tokio::sync::watch;
use tokio::task::JoinSet;

use super::subscriptions::dispatch;
use super::{ConsumerHandle, DispatchError, EventPublisher, Handler, Subscriptions, TopicSpec};

const MAX_DELIVER: i64 = 5;
const ACK_WAIT: Duration = Duration::from_secs(30);
const RETRY_DELAY: Duration = Duration::from_secs(5);

/// Publish tasks still waiting for their ack.
#[derive(Clone, Default)]
struct InFlight {
    tasks: Arc<Mutex<JoinSet<()>>>,
}

impl InFlight {
    fn lock(&self) -> std::sync::MutexGuard<'_, JoinSet<()>> {
        match self.tasks.lock() {
            Ok(tasks) => tasks,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn spawn<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut tasks = self.lock();
        // Reap finished tasks so the set only holds pending ones.
        while tasks.try_join_next().is_some() {}
        tasks.spawn(task);
    }

    fn len(&self) -> usize {
        self.lock().len()
    }

    /// Waits up to `timeout` for every pending task. Returns how many were
    /// still running when it gave up; those are aborted.
    async fn drain(&self, timeout: Duration) -> usize {
        let mut tasks = std::mem::take(&mut *self.lock());
        let drained = tokio::time::timeout(timeout, async {
            while tasks.join_next().await.is_some() {}
        })
        .await;

        match drained {
            Ok(()) => 0,
            Err(_) => {
                let abandoned = tasks.len();
                tasks.abort_all();
                abandoned
            }
        }
    }
}

#[derive(Clone)]
pub struct NatsEventBus {
    jetstream: jetstream::Context,
    in_flight: InFlight,
}

impl NatsEventBus {
    pub fn new(client: async_nats::Client) -> Self {
        Self {
            jetstream: jetstream::new(client),
            in_flight: InFlight::default(),
        }
    }

    /// Waits for published events to be acked, up to `timeout`.
    pub async fn drain(&self, timeout: Duration) {
        let pending = self.in_flight.len();
        tracing::info!(pending, "waiting for in-flight publishes");

        let abandoned = self.in_flight.drain(timeout).await;
        if abandoned > 0 {
            tracing::warn!(abandoned, "in-flight publishes did not finish before shutdown");
        }
    }

    /// Creates the stream of every topic that does not exist yet.
    pub async fn provision(&self, topics: &[&'static TopicSpec]) -> anyhow::Result<()> {
        for topic in topics {
            self.jetstream
                .get_or_create_stream(stream::Config {
                    name: topic.stream_name(),
                    subjects: vec![format!("{}.*", topic.name)],
                    num_replicas: topic.replicas,
                    ..Default::default()
                })
                .await
                .with_context(|| format!("failed to provision stream for {}", topic.name))?;

            tracing::info!(
                topic = topic.name,
                partitions = topic.partitions,
                replicas = topic.replicas,
                "topic ready"
            );
        }
        Ok(())
    }

    /// Starts one worker per (topic, partition), consuming as `group`.
    pub async fn start(
        &self,
        group: &str,
        subscriptions: Subscriptions,
    ) -> anyhow::Result<ConsumerHandle> {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let mut workers = Vec::new();

        for topic in subscriptions.topics() {
            let Some(handler) = subscriptions.handler(topic.name) else {
                continue;
            };
            let stream = self
                .jetstream
                .get_stream(topic.stream_name())
                .await
                .with_context(|| format!("failed to get stream for {}", topic.name))?;

            for partition in 0..topic.partitions {
                let durable = format!("{}-{}-{}", group, topic.name, partition);
                let consumer = stream
                    .get_or_create_consumer(
                        &durable,
                        pull::Config {
                            durable_name: Some(durable.clone()),
                            filter_subject: topic.subject(partition),
                            ack_wait: ACK_WAIT,
                            max_deliver: MAX_DELIVER,
                            ..Default::default()
                        },
                    )
                    .await
                    .with_context(|| format!("failed to create consumer {durable}"))?;

                tracing::info!(topic = topic.name, partition, consumer = %durable, "consumer ready");
                workers.push(tokio::spawn(consume_partition(
                    consumer,
                    handler.clone(),
                    topic.name,
                    partition,
                    shutdown_rx.clone(),
                )));
            }
        }

        Ok(ConsumerHandle::new(shutdown_tx, workers))
    }
}

async fn consume_partition(
    consumer: jetstream::consumer::Consumer<pull::Config>,
    handler: Handler,
    topic: &'static str,
    partition: u32,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        let mut messages = match consumer.messages().await {
            Ok(messages) => messages,
            Err(e) => {
                tracing::error!(topic, partition, error = %e, "failed to open message stream");
                tokio::select! {
                    _ = tokio::time::sleep(RETRY_DELAY) => continue,
                    _ = shutdown.changed() => return,
                }
            }
        };

        loop {
            let next = tokio::select! {
                next = messages.next() => next,
                _ = shutdown.changed() => {
                    tracing::debug!(topic, partition, "consumer stopping");
                    return;
                }
            };

            let message = match next {
                Some(Ok(message)) => message,
                Some(Err(e)) => {
                    tracing::error!(topic, partition, error = %e, "error receiving message");
                    continue;
                }
                None => break,
            };

            // Ack on success and on payloads no redelivery can fix; NAK otherwise.
            let ack = match dispatch(&handler, topic, partition, message.payload.clone()).await {
                Ok(()) | Err(DispatchError::Decode(_)) => message.ack().await,
                Err(DispatchError::Handler(_)) => message.ack_with(AckKind::Nak(None)).await,
            };
            if let Err(e) = ack {
                tracing::error!(topic, partition, error = %e, "failed to ack message");
            }
        }
    }
}

impl EventPublisher for NatsEventBus {
    fn publish(&self, topic: &'static TopicSpec, key: String, payload: Bytes) {
        let partition = topic.partition_for(&key);
        let subject = topic.subject(partition);
        let jetstream = self.jetstream.clone();

        metrics::counter!("events_published_total", "topic" => topic.name).increment(1);
        self.in_flight.spawn(async move {
            let result = match jetstream.publish(subject, payload).await {
                Ok(ack) => ack.await,
                Err(e) => Err(e),
            };

            match result {
                Ok(ack) => {
                    tracing::info!(
                        topic = topic.name,
                        partition,
                        offset = ack.sequence,
                        %key,
                        "event delivered"
                    );
                }
                Err(e) => {
                    metrics::counter!("events_publish_failed_total", "topic" => topic.name)
                        .increment(1);
                    tracing::error!(
                        topic = topic.name,
                        partition,
                        %key,
                        error = %e,
                        "event delivery failed"
                    );
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[tokio::test]
    async fn test_drain_waits_for_pending_tasks() {
        let in_flight = InFlight::default();
        let done = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let done = Arc::clone(&done);
            in_flight.spawn(async move {
                tokio::time::sleep(Duration::from_millis(30)).await;
                done.fetch_add(1, Ordering::SeqCst);
            });
        }

        assert_eq!(in_flight.drain(Duration::from_secs(5)).await, 0);
        assert_eq!(done.load(Ordering::SeqCst), 3);
        assert_eq!(in_flight.len(), 0);
    }

    #[tokio::test]
    async fn test_drain_gives_up_after_timeout() {
        let in_flight = InFlight::default();
        in_flight.spawn(std::future::pending());

        assert_eq!(in_flight.drain(Duration::from_millis(20)).await, 1);
    }

    #[tokio::test]
    async fn test_finished_tasks_are_reaped() {
        let in_flight = InFlight::default();
        for _ in 0..10 {
            in_flight.spawn(async {});
        }
        tokio::time::sleep(Duration::from_millis(20)).await;

        in_flight.spawn(std::future::pending());

        assert_eq!(in_flight.len(), 1);
        assert_eq!(in_flight.drain(Duration::from_millis(10)).await, 1);
    }
}
