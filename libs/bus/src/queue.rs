//! Bounded message queues with bounded-retry delivery
//!
//! A `Queue` is the publishing end of a named topic. Delivery to a handler
//! goes through [`RetryPolicy::deliver`], which retries transient failures
//! up to the configured attempt count before handing the message to the
//! dead-letter queue.

use crate::dead_letter::DeadLetterQueue;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;

/// Transport-level errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BusError {
    #[error("Queue '{topic}' is closed")]
    Closed { topic: String },
}

/// Publishing end of a topic
#[derive(Clone)]
pub struct Queue<T> {
    topic: &'static str,
    tx: mpsc::Sender<T>,
}

/// Create a bounded topic, returning the publisher and the consumer end
pub fn channel<T>(topic: &'static str, capacity: usize) -> (Queue<T>, mpsc::Receiver<T>) {
    let (tx, rx) = mpsc::channel(capacity);
    (Queue { topic, tx }, rx)
}

impl<T> Queue<T> {
    /// Publish a message, waiting for queue capacity
    pub async fn publish(&self, message: T) -> Result<(), BusError> {
        self.tx.send(message).await.map_err(|_| BusError::Closed {
            topic: self.topic.to_string(),
        })
    }

    /// Publish without waiting; returns false when the queue is full or
    /// closed. For streams where the newest state supersedes the old
    /// (book snapshots), dropping under backpressure beats stalling the
    /// producer.
    pub fn try_publish(&self, message: T) -> bool {
        self.tx.try_send(message).is_ok()
    }

    /// Topic name, for logging
    pub fn topic(&self) -> &'static str {
        self.topic
    }
}

/// Bounded-retry delivery policy
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: 3 }
    }
}

impl RetryPolicy {
    /// Run `handler` against a message, retrying on failure.
    ///
    /// Returns true if some attempt succeeded. After the final failed
    /// attempt the message is captured in the dead-letter queue with the
    /// last error.
    pub async fn deliver<T, H, Fut, E>(
        &self,
        topic: &str,
        message: T,
        dead_letter: &Arc<DeadLetterQueue>,
        handler: H,
    ) -> bool
    where
        T: Clone + Serialize,
        H: Fn(T) -> Fut,
        Fut: Future<Output = Result<(), E>>,
        E: std::fmt::Display,
    {
        let mut last_error = String::new();
        for attempt in 1..=self.max_attempts {
            match handler(message.clone()).await {
                Ok(()) => return true,
                Err(e) => {
                    last_error = e.to_string();
                    tracing::warn!(
                        topic,
                        attempt,
                        max_attempts = self.max_attempts,
                        error = %last_error,
                        "message handling failed"
                    );
                }
            }
        }

        dead_letter.push(topic, &message, &last_error, self.max_attempts);
        false
    }
}
