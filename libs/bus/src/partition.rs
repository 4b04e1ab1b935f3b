//! Symbol-partitioned routing
//!
//! The order-to-matching route must preserve per-symbol ordering and feed
//! exactly one writer per symbol. The router lazily spawns one worker task
//! per symbol, each draining a private FIFO queue, so messages for one
//! symbol are handled strictly in publish order while different symbols
//! proceed in parallel.

use crate::queue::BusError;
use dashmap::DashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::mpsc;
use types::ids::Symbol;

/// Routes messages to per-symbol single-writer worker tasks
pub struct SymbolRouter<M> {
    partitions: DashMap<Symbol, mpsc::Sender<M>>,
    capacity: usize,
}

impl<M: Send + 'static> SymbolRouter<M> {
    pub fn new(capacity: usize) -> Self {
        Self {
            partitions: DashMap::new(),
            capacity,
        }
    }

    /// Publish a message to its symbol's partition, spawning the worker
    /// on first use.
    ///
    /// `handler` runs inside the worker task, one message at a time per
    /// symbol; it is only used when this call creates the partition.
    pub async fn publish<H, Fut>(
        &self,
        symbol: &Symbol,
        message: M,
        handler: H,
    ) -> Result<(), BusError>
    where
        H: Fn(M) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let tx = self
            .partitions
            .entry(symbol.clone())
            .or_insert_with(|| spawn_partition(symbol.clone(), self.capacity, handler))
            .clone();

        tx.send(message).await.map_err(|_| BusError::Closed {
            topic: format!("matching.{symbol}"),
        })
    }

    /// Number of live partitions
    pub fn partition_count(&self) -> usize {
        self.partitions.len()
    }
}

fn spawn_partition<M, H, Fut>(symbol: Symbol, capacity: usize, handler: H) -> mpsc::Sender<M>
where
    M: Send + 'static,
    H: Fn(M) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let (tx, mut rx) = mpsc::channel::<M>(capacity);
    tokio::spawn(async move {
        tracing::debug!(%symbol, "partition worker started");
        while let Some(message) = rx.recv().await {
            handler(message).await;
        }
        tracing::debug!(%symbol, "partition worker stopped");
    });
    tx
}

type BoxFuture = std::pin::Pin<Box<dyn Future<Output = ()> + Send>>;

/// Convenience wrapper binding a router to one handler for all partitions
pub struct PartitionedConsumer<M> {
    router: SymbolRouter<M>,
    handler: Arc<dyn Fn(M) -> BoxFuture + Send + Sync>,
}

impl<M: Send + 'static> PartitionedConsumer<M> {
    pub fn new<H, Fut>(capacity: usize, handler: H) -> Self
    where
        H: Fn(M) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self {
            router: SymbolRouter::new(capacity),
            handler: Arc::new(move |m| Box::pin(handler(m))),
        }
    }

    /// Publish into the symbol's ordered partition
    pub async fn publish(&self, symbol: &Symbol, message: M) -> Result<(), BusError> {
        let handler = Arc::clone(&self.handler);
        self.router
            .publish(symbol, message, move |m| (handler)(m))
            .await
    }

    pub fn partition_count(&self) -> usize {
        self.router.partition_count()
    }
}
