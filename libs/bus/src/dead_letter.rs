//! Dead-letter capture for messages that exhausted their retries
//!
//! Entries keep the serialized payload so an operator (or a test) can
//! inspect and replay them.

use serde::Serialize;
use std::sync::Mutex;
use types::clock;

/// A message that could not be processed
#[derive(Debug, Clone)]
pub struct DeadLetter {
    pub topic: String,
    pub payload: String,
    pub error: String,
    pub attempts: u32,
    pub at: i64, // Unix nanos
}

/// Append-only store of dead letters
#[derive(Default)]
pub struct DeadLetterQueue {
    entries: Mutex<Vec<DeadLetter>>,
}

impl DeadLetterQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Capture a failed message with its last error
    pub fn push<T: Serialize>(&self, topic: &str, message: &T, error: &str, attempts: u32) {
        let payload = serde_json::to_string(message).unwrap_or_else(|e| {
            format!("<unserializable payload: {e}>")
        });
        tracing::error!(topic, attempts, error, "message dead-lettered");
        self.entries.lock().expect("dead letter lock").push(DeadLetter {
            topic: topic.to_string(),
            payload,
            error: error.to_string(),
            attempts,
            at: clock::now_nanos(),
        });
    }

    /// Number of captured entries
    pub fn len(&self) -> usize {
        self.entries.lock().expect("dead letter lock").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Take all captured entries, leaving the queue empty
    pub fn drain(&self) -> Vec<DeadLetter> {
        std::mem::take(&mut *self.entries.lock().expect("dead letter lock"))
    }
}
