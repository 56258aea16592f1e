use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use bytes::Bytes;
use futures::FutureExt;
use futures::future::BoxFuture;
use serde::de::DeserializeOwned;
use thiserror::Error;

use super::TopicSpec;

#[derive(Debug, Error)]
pub enum DispatchError {
    /// The payload does not match the handler's shape. Redelivery cannot fix it.
    #[error("undecodable payload: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("handler failed: {0}")]
    Handler(anyhow::Error),
}

pub type Handler = Arc<dyn Fn(Bytes) -> BoxFuture<'static, Result<(), DispatchError>> + Send + Sync>;

/// Topic to handler table, built once at start-up and handed to a bus.
#[derive(Clone, Default)]
pub struct Subscriptions {
    handlers: HashMap<&'static str, (&'static TopicSpec, Handler)>,
}

impl Subscriptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the handler for `topic`, decoding each payload as JSON into `T`.
    /// A topic has exactly one handler; registering again replaces it.
    pub fn on<T, F, Fut>(mut self, topic: &'static TopicSpec, handler: F) -> Self
    where
        T: DeserializeOwned + Send + 'static,
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let handler = Arc::new(handler);
        let dispatch: Handler = Arc::new(move |payload: Bytes| {
            let handler = Arc::clone(&handler);
            async move {
                let event: T = serde_json::from_slice(&payload)?;
                handler(event).await.map_err(DispatchError::Handler)
            }
            .boxed()
        });

        if self.handlers.insert(topic.name, (topic, dispatch)).is_some() {
            tracing::warn!(topic = topic.name, "handler replaced");
        }
        self
    }

    pub fn handler(&self, topic: &str) -> Option<Handler> {
        self.handlers.get(topic).map(|(_, h)| Arc::clone(h))
    }

    pub fn topics(&self) -> impl Iterator<Item = &'static TopicSpec> + '_ {
        self.handlers.values().map(|(topic, _)| *topic)
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

/// Runs one delivery through `handler`, logging and counting the outcome.
pub(crate) async fn dispatch(
    handler: &Handler,
    topic: &'static str,
    partition: u32,
    payload: Bytes,
) -> Result<(), DispatchError> {
    metrics::counter!("events_consumed_total", "topic" => topic).increment(1);
    let result = handler(payload).await;
    match &result {
        Ok(()) => {
            tracing::debug!(topic, partition, "event handled");
        }
        Err(DispatchError::Decode(e)) => {
            metrics::counter!("events_rejected_total", "topic" => topic).increment(1);
            tracing::error!(topic, partition, error = %e, "dropping undecodable event");
        }
        Err(DispatchError::Handler(e)) => {
            metrics::counter!("events_handler_failed_total", "topic" => topic).increment(1);
            tracing::error!(topic, partition, error = %e, "event handler failed");
        }
    }
    result
}
