//! Service wiring over the in-process bus

use bus::{DeadLetterQueue, PartitionedConsumer, ProcessedMarkers, Queue, RetryPolicy};
use matching_engine::{BookOrder, MatchingEngine};
use oms::{
    OmsConfig, OmsEventHandlers, OrderService, OrderStore, QuoteSource, SagaOrchestrator,
    SagaRecovery, SagaStore,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use types::clock;
use types::ids::{OrderId, Symbol, UserId};
use types::messages::{
    MarketOrderUnfilledEvent, MatchingCommand, MatchingEvent, OrderBookUpdateEvent, SagaReply,
    TradeExecutedEvent, WalletCommand,
};
use types::numeric::{Amount, Price};
use types::order::{Order, OrderStatus};
use types::trade::Trade;
use wallet::{WalletCommandHandler, WalletConfig, WalletService};

/// Quote lookups answered straight from the live books
struct EngineQuotes(Arc<MatchingEngine>);

impl QuoteSource for EngineQuotes {
    fn best_ask(&self, symbol: &Symbol) -> Option<Price> {
        self.0.best_ask(symbol)
    }
}

/// The fully wired exchange pipeline
pub struct ExchangeHarness {
    pub engine: Arc<MatchingEngine>,
    pub wallet: Arc<WalletService>,
    pub orders: Arc<OrderService>,
    pub order_store: Arc<OrderStore>,
    pub saga_store: Arc<SagaStore>,
    pub orchestrator: Arc<SagaOrchestrator>,
    pub recovery: Arc<SagaRecovery>,
    pub dead_letters: Arc<DeadLetterQueue>,
    /// Book update broadcasts, as an external consumer would see them
    pub book_updates: Mutex<mpsc::Receiver<OrderBookUpdateEvent>>,
}

impl ExchangeHarness {
    /// Build and start the pipeline with the given configs
    pub fn start(oms_config: OmsConfig, wallet_config: WalletConfig) -> Arc<Self> {
        let engine = Arc::new(MatchingEngine::new());
        let wallet_service = Arc::new(WalletService::new(wallet_config));
        let order_store = Arc::new(OrderStore::new());
        let saga_store = Arc::new(SagaStore::new());
        let dead_letters = Arc::new(DeadLetterQueue::new());
        let retry = RetryPolicy::default();

        // Topics.
        let (wallet_commands, mut wallet_rx) = bus::channel::<WalletCommand>("wallet.commands", 256);
        let (saga_replies, mut reply_rx) = bus::channel::<SagaReply>("oms.saga-replies", 256);
        let (matching_events, mut match_rx) =
            bus::channel::<MatchingEvent>("oms.matching-events", 256);
        let (book_updates_tx, book_updates_rx) =
            bus::channel::<OrderBookUpdateEvent>("marketdata.book-updates", 256);

        // Matching partition worker: one single-writer task per symbol.
        let matching = {
            let engine = Arc::clone(&engine);
            let matching_events = matching_events.clone();
            let book_updates_tx = book_updates_tx.clone();
            let submit_markers = Arc::new(ProcessedMarkers::default());
            let depth = oms_config.book_update_depth;

            Arc::new(PartitionedConsumer::new(256, move |command: MatchingCommand| {
                let engine = Arc::clone(&engine);
                let matching_events = matching_events.clone();
                let book_updates_tx = book_updates_tx.clone();
                let submit_markers = Arc::clone(&submit_markers);
                async move {
                    handle_matching_command(
                        command,
                        &engine,
                        &matching_events,
                        &book_updates_tx,
                        &submit_markers,
                        depth,
                    )
                    .await;
                }
            }))
        };

        let orchestrator = Arc::new(SagaOrchestrator::new(
            Arc::clone(&order_store),
            Arc::clone(&saga_store),
            wallet_commands.clone(),
            Arc::clone(&matching),
            Arc::new(EngineQuotes(Arc::clone(&engine))),
            oms_config.clone(),
        ));
        let order_service = Arc::new(OrderService::new(
            Arc::clone(&order_store),
            Arc::clone(&orchestrator),
        ));
        let oms_handlers = Arc::new(OmsEventHandlers::new(
            Arc::clone(&orchestrator),
            wallet_commands.clone(),
        ));
        let wallet_handler = Arc::new(WalletCommandHandler::new(
            Arc::clone(&wallet_service),
            saga_replies.clone(),
        ));
        let recovery = Arc::new(SagaRecovery::new(
            Arc::clone(&saga_store),
            Arc::clone(&orchestrator),
            oms_config,
        ));

        // Wallet command consumer.
        {
            let handler = Arc::clone(&wallet_handler);
            let dead_letters = Arc::clone(&dead_letters);
            tokio::spawn(async move {
                while let Some(command) = wallet_rx.recv().await {
                    retry
                        .deliver("wallet.commands", command, &dead_letters, |c| {
                            handler.handle(c)
                        })
                        .await;
                }
            });
        }

        // Saga reply consumer.
        {
            let handlers = Arc::clone(&oms_handlers);
            let dead_letters = Arc::clone(&dead_letters);
            tokio::spawn(async move {
                while let Some(reply) = reply_rx.recv().await {
                    retry
                        .deliver("oms.saga-replies", reply, &dead_letters, |r| {
                            handlers.handle_saga_reply(r)
                        })
                        .await;
                }
            });
        }

        // Matching event consumer.
        {
            let handlers = Arc::clone(&oms_handlers);
            let dead_letters = Arc::clone(&dead_letters);
            tokio::spawn(async move {
                while let Some(event) = match_rx.recv().await {
                    retry
                        .deliver("oms.matching-events", event, &dead_letters, |e| {
                            handlers.handle_matching_event(e)
                        })
                        .await;
                }
            });
        }

        Arc::new(Self {
            engine,
            wallet: wallet_service,
            orders: order_service,
            order_store,
            saga_store,
            orchestrator,
            recovery,
            dead_letters,
            book_updates: Mutex::new(book_updates_rx),
        })
    }

    /// Start with default configuration
    pub fn start_default() -> Arc<Self> {
        Self::start(OmsConfig::default(), WalletConfig::default())
    }

    /// Credit a user's wallet directly (test fixture deposit)
    pub fn fund(&self, user_id: UserId, currency: &str, amount: Amount) {
        self.wallet
            .deposit(user_id, currency, amount, clock::now_nanos())
            .expect("fixture deposit");
    }

    /// Poll until the order reaches `status` or the timeout elapses
    pub async fn wait_for_status(
        &self,
        order_id: OrderId,
        status: OrderStatus,
        timeout: Duration,
    ) -> Order {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if let Ok(order) = self.order_store.get(&order_id) {
                if order.status == status {
                    return order;
                }
            }
            if tokio::time::Instant::now() >= deadline {
                let current = self
                    .order_store
                    .get(&order_id)
                    .map(|o| o.status.to_string())
                    .unwrap_or_else(|_| "<missing>".to_string());
                panic!("order {order_id} never reached {status}; currently {current}");
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    /// Give in-flight messages a moment to drain
    pub async fn quiesce(&self) {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}

/// One symbol partition's handler: match, then fan out the results
async fn handle_matching_command(
    command: MatchingCommand,
    engine: &MatchingEngine,
    matching_events: &Queue<MatchingEvent>,
    book_updates: &Queue<OrderBookUpdateEvent>,
    submit_markers: &ProcessedMarkers,
    depth: usize,
) {
    let now = clock::now_nanos();
    let symbol = command.symbol().clone();

    match command {
        MatchingCommand::Submit(event) => {
            // A re-driven submission must not be matched twice.
            let key = format!("submit:{}", event.order_id);
            if submit_markers.is_processed(&key) {
                tracing::debug!(order_id = %event.order_id, "duplicate submission skipped");
                return;
            }

            let order = BookOrder::new(
                event.order_id,
                event.user_id,
                event.symbol.clone(),
                event.side,
                event.order_type,
                event.price,
                event.quantity,
            );
            let result = engine.submit(order, event.timestamp);
            submit_markers.mark(key);

            for trade in &result.trades {
                if let Err(e) = matching_events
                    .publish(MatchingEvent::TradeExecuted(trade_event(trade)))
                    .await
                {
                    tracing::error!(error = %e, "trade event publish failed");
                }
            }

            if result.market_remainder_dropped() {
                let notice = MarketOrderUnfilledEvent {
                    order_id: event.order_id,
                    user_id: event.user_id,
                    symbol: event.symbol.clone(),
                    unfilled_quantity: result.unfilled_quantity(),
                    timestamp: now,
                };
                if let Err(e) = matching_events
                    .publish(MatchingEvent::MarketOrderUnfilled(notice))
                    .await
                {
                    tracing::error!(error = %e, "unfilled event publish failed");
                }
            }
        }
        MatchingCommand::Cancel(cancel) => {
            let removed = engine.cancel(&cancel.symbol, &cancel.order_id, cancel.side);
            tracing::debug!(order_id = %cancel.order_id, removed, "book cancel processed");
        }
    }

    if let Some(update) = engine.book_update(&symbol, depth, now) {
        // Snapshots supersede each other; drop rather than stall the
        // matching worker when the subscriber lags.
        if !book_updates.try_publish(update) {
            tracing::debug!(%symbol, "book update dropped under backpressure");
        }
    }
}

fn trade_event(trade: &Trade) -> TradeExecutedEvent {
    TradeExecutedEvent {
        trade_id: trade.trade_id,
        symbol: trade.symbol.clone(),
        buy_order_id: trade.buy_order_id,
        buy_user_id: trade.buy_user_id,
        sell_order_id: trade.sell_order_id,
        sell_user_id: trade.sell_user_id,
        price: trade.price,
        quantity: trade.quantity,
        timestamp: trade.executed_at,
    }
}
