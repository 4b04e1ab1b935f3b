//! In-process message transport for the exchange services
//!
//! Stands in for the durable broker at the same interface: bounded queues
//! with at-least-once delivery semantics, per-symbol partitioning for the
//! order-to-matching route, bounded retry with a dead-letter path, and a
//! processed-marker store for idempotent consumers.
//!
//! The broker itself is out of scope; consumers are written against these
//! primitives so swapping in a real transport only touches this crate.

pub mod dead_letter;
pub mod markers;
pub mod partition;
pub mod queue;

pub use dead_letter::{DeadLetter, DeadLetterQueue};
pub use markers::ProcessedMarkers;
pub use partition::{PartitionedConsumer, SymbolRouter};
pub use queue::{channel, BusError, Queue, RetryPolicy};
