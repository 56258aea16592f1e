//! In-process bus with the same partitioning as the NATS one.
//!
//! A bus built with [`InMemoryEventBus::recording`] keeps every published
//! event so callers can inspect what went out; the plain one keeps nothing.
//! Delivery is best-effort: a failing handler is logged and the event is not
//! retried.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use bytes::Bytes;
use serde::de::DeserializeOwned;
use tokio::sync::{mpsc, watch};

use super::subscriptions::dispatch;
use super::{ConsumerHandle, EventPublisher, Subscriptions, TopicSpec};

#[derive(Debug, Clone)]
pub struct PublishedEvent {
    pub topic: &'static str,
    pub partition: u32,
    pub offset: u64,
    pub key: String,
    pub payload: Bytes,
}

impl PublishedEvent {
    pub fn decode<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_slice(&self.payload)
    }
}

type PartitionId = (&'static str, u32);

#[derive(Default)]
struct Inner {
    recording: bool,
    log: Mutex<Vec<PublishedEvent>>,
    offsets: Mutex<HashMap<PartitionId, u64>>,
    routes: RwLock<HashMap<PartitionId, mpsc::UnboundedSender<Bytes>>>,
}

#[derive(Clone, Default)]
pub struct InMemoryEventBus {
    inner: Arc<Inner>,
}

impl InMemoryEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// A bus that keeps every published event for [`published`](Self::published).
    pub fn recording() -> Self {
        Self {
            inner: Arc::new(Inner {
                recording: true,
                ..Default::default()
            }),
        }
    }

    pub fn published(&self) -> Vec<PublishedEvent> {
        self.inner.log.lock().map(|log| log.clone()).unwrap_or_default()
    }

    pub fn published_on(&self, topic: &str) -> Vec<PublishedEvent> {
        self.published()
            .into_iter()
            .filter(|event| event.topic == topic)
            .collect()
    }

    /// Spawns one worker per (topic, partition) in `subscriptions`.
    pub fn start(&self, subscriptions: Subscriptions) -> ConsumerHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let mut workers = Vec::new();
        let mut routes = match self.inner.routes.write() {
            Ok(routes) => routes,
            Err(poisoned) => poisoned.into_inner(),
        };

        for topic in subscriptions.topics() {
            let Some(handler) = subscriptions.handler(topic.name) else {
                continue;
            };
            for partition in 0..topic.partitions {
                let (tx, mut rx) = mpsc::unbounded_channel::<Bytes>();
                routes.insert((topic.name, partition), tx);

                let handler = handler.clone();
                let mut shutdown = shutdown_rx.clone();
                let name = topic.name;
                workers.push(tokio::spawn(async move {
                    loop {
                        tokio::select! {
                            biased;
                            next = rx.recv() => match next {
                                Some(payload) => {
                                    let _ = dispatch(&handler, name, partition, payload).await;
                                }
                                None => break,
                            },
                            _ = shutdown.changed() => {
                                // Drain what was already accepted before stopping.
                                while let Ok(payload) = rx.try_recv() {
                                    let _ = dispatch(&handler, name, partition, payload).await;
                                }
                                break;
                            }
                        }
                    }
                    tracing::debug!(topic = name, partition, "in-memory consumer stopped");
                }));
            }
        }

        tracing::info!(workers = workers.len(), "in-memory event consumers started");
        ConsumerHandle::new(shutdown_tx, workers)
    }

    fn next_offset(&self, id: PartitionId) -> u64 {
        let mut offsets = match self.inner.offsets.lock() {
            Ok(offsets) => offsets,
            Err(poisoned) => poisoned.into_inner(),
        };
        let offset = offsets.entry(id).or_insert(0);
        let current = *offset;
        *offset += 1;
        current
    }
}

impl EventPublisher for InMemoryEventBus {
    fn publish(&self, topic: &'static TopicSpec, key: String, payload: Bytes) {
        let partition = topic.partition_for(&key);
        let offset = self.next_offset((topic.name, partition));

        if self.inner.recording {
            if let Ok(mut log) = self.inner.log.lock() {
                log.push(PublishedEvent {
                    topic: topic.name,
                    partition,
                    offset,
                    key: key.clone(),
                    payload: payload.clone(),
                });
            }
        }

        let delivered = match self.inner.routes.read() {
            Ok(routes) => routes
                .get(&(topic.name, partition))
                .map(|tx| tx.send(payload).is_ok()),
            Err(_) => Some(false),
        };

        metrics::counter!("events_published_total", "topic" => topic.name).increment(1);
        match delivered {
            Some(false) => {
                metrics::counter!("events_publish_failed_total", "topic" => topic.name).increment(1);
                tracing::error!(topic = topic.name, partition, %key, "consumer gone, event lost");
            }
            _ => {
                tracing::debug!(topic = topic.name, partition, offset, %key, "event published");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde::{Deserialize, Serialize};

    use super::*;
    use crate::bus::publish_json;

    const TOPIC: TopicSpec = TopicSpec::new("memory-test");

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Tick {
        ride_id: i64,
        step: u32,
    }

    #[test]
    fn test_publish_records_event_with_partition() {
        let bus = InMemoryEventBus::recording();
        publish_json(&bus, &TOPIC, "5".to_string(), &Tick { ride_id: 5, step: 1 });
        publish_json(&bus, &TOPIC, "5".to_string(), &Tick { ride_id: 5, step: 2 });

        let events = bus.published_on("memory-test");
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].partition, events[1].partition);
        assert_eq!(events[0].offset, 0);
        assert_eq!(events[1].offset, 1);
        assert_eq!(events[1].decode::<Tick>().unwrap(), Tick { ride_id: 5, step: 2 });
    }

    #[test]
    fn test_plain_bus_keeps_nothing() {
        let bus = InMemoryEventBus::new();
        for step in 0..100 {
            publish_json(&bus, &TOPIC, "5".to_string(), &Tick { ride_id: 5, step });
        }

        assert!(bus.published().is_empty());
        assert_eq!(bus.inner.log.lock().unwrap().capacity(), 0);
    }

    #[tokio::test]
    async fn test_same_key_is_consumed_in_order() {
        let bus = InMemoryEventBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);

        let handle = bus.start(Subscriptions::new().on(&TOPIC, move |tick: Tick| {
            let seen = Arc::clone(&seen_clone);
            async move {
                seen.lock().unwrap().push(tick.step);
                anyhow::Ok(())
            }
        }));
        assert_eq!(handle.worker_count(), 3);

        for step in 0..20 {
            publish_json(&bus, &TOPIC, "77".to_string(), &Tick { ride_id: 77, step });
        }
        handle.shutdown().await;

        assert_eq!(*seen.lock().unwrap(), (0..20).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_failing_handler_does_not_stop_worker() {
        let bus = InMemoryEventBus::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = Arc::clone(&calls);

        let handle = bus.start(Subscriptions::new().on(&TOPIC, move |tick: Tick| {
            let calls = Arc::clone(&calls_clone);
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                if tick.step == 0 {
                    anyhow::bail!("first delivery fails");
                }
                Ok(())
            }
        }));

        publish_json(&bus, &TOPIC, "1".to_string(), &Tick { ride_id: 1, step: 0 });
        publish_json(&bus, &TOPIC, "1".to_string(), &Tick { ride_id: 1, step: 1 });
        handle.shutdown().await;

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
