//! Partitioned, fire-and-forget event bus.
//!
//! Publishing never blocks the caller and never reports failure back to it:
//! the outcome is only logged. Ordering holds within a single partition of a
//! single topic, and the partition is picked by hashing the publisher-chosen
//! key.

pub mod memory;
pub mod nats;
mod subscriptions;

use std::sync::Arc;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use uuid::Uuid;

pub use subscriptions::{DispatchError, Handler, Subscriptions};

pub const DEFAULT_PARTITIONS: u32 = 3;
pub const DEFAULT_REPLICAS: usize = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TopicSpec {
    pub name: &'static str,
    pub partitions: u32,
    pub replicas: usize,
}

impl TopicSpec {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            partitions: DEFAULT_PARTITIONS,
            replicas: DEFAULT_REPLICAS,
        }
    }

    pub fn partition_for(&self, key: &str) -> u32 {
        partition_for(key, self.partitions)
    }

    /// Subject a single partition is published on.
    pub fn subject(&self, partition: u32) -> String {
        format!("{}.{}", self.name, partition)
    }

    pub fn stream_name(&self) -> String {
        self.name.replace('-', "_").to_uppercase()
    }
}

/// Kafka's default partitioner: murmur2 of the key, masked positive.
pub fn partition_for(key: &str, partitions: u32) -> u32 {
    (murmur2(key.as_bytes()) & 0x7fff_ffff) % partitions.max(1)
}

fn murmur2(data: &[u8]) -> u32 {
    const SEED: u32 = 0x9747_b28c;
    const M: u32 = 0x5bd1_e995;
    const R: u32 = 24;

    let mut h = SEED ^ data.len() as u32;
    let mut chunks = data.chunks_exact(4);
    for chunk in &mut chunks {
        let mut k = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        k = k.wrapping_mul(M);
        k ^= k >> R;
        k = k.wrapping_mul(M);
        h = h.wrapping_mul(M);
        h ^= k;
    }

    let tail = chunks.remainder();
    if !tail.is_empty() {
        if tail.len() >= 3 {
            h ^= u32::from(tail[2]) << 16;
        }
        if tail.len() >= 2 {
            h ^= u32::from(tail[1]) << 8;
        }
        h ^= u32::from(tail[0]);
        h = h.wrapping_mul(M);
    }

    h ^= h >> 13;
    h = h.wrapping_mul(M);
    h ^= h >> 15;
    h
}

/// How publishers choose the partition key of an event.
///
/// `Entity` keys by the id of the entity the event is about, so every event
/// for one ride lands on the same partition and is consumed in order.
/// `Random` draws a fresh key per message: events for the same ride may be
/// consumed out of order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartitionKeyStrategy {
    #[default]
    Entity,
    Random,
}

impl PartitionKeyStrategy {
    pub fn key(self, entity_id: i64) -> String {
        match self {
            PartitionKeyStrategy::Entity => entity_id.to_string(),
            PartitionKeyStrategy::Random => Uuid::new_v4().to_string(),
        }
    }
}

pub trait EventPublisher: Send + Sync {
    /// Hands the payload to the bus and returns immediately.
    fn publish(&self, topic: &'static TopicSpec, key: String, payload: Bytes);
}

impl<T: EventPublisher + ?Sized> EventPublisher for Arc<T> {
    fn publish(&self, topic: &'static TopicSpec, key: String, payload: Bytes) {
        (**self).publish(topic, key, payload)
    }
}

pub fn publish_json<P, T>(publisher: &P, topic: &'static TopicSpec, key: String, event: &T)
where
    P: EventPublisher + ?Sized,
    T: Serialize,
{
    match serde_json::to_vec(event) {
        Ok(payload) => publisher.publish(topic, key, Bytes::from(payload)),
        Err(e) => {
            metrics::counter!("events_publish_failed_total", "topic" => topic.name).increment(1);
            tracing::error!(topic = topic.name, %key, error = %e, "failed to serialize event, dropping it");
        }
    }
}

/// Running consumer workers. Dropping the handle also stops them.
pub struct ConsumerHandle {
    shutdown: watch::Sender<bool>,
    workers: Vec<JoinHandle<()>>,
}

impl ConsumerHandle {
    pub(crate) fn new(shutdown: watch::Sender<bool>, workers: Vec<JoinHandle<()>>) -> Self {
        Self { shutdown, workers }
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Signals every worker to stop and waits until each has drained.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        for worker in self.workers {
            if let Err(e) = worker.await {
                tracing::error!(error = %e, "consumer worker panicked");
            }
        }
        tracing::info!("event consumers stopped");
    }
}
