//! Saga orchestrator
//!
//! Coordinates the distributed order transaction:
//! reserve funds → submit to matching → apply fills / settle → complete,
//! with release-funds compensation on rejection and cancellation.
//!
//! Every state transition is persisted before its triggering command is
//! emitted. A crash after persist-but-before-send is recovered by
//! re-drive; a crash after send is absorbed by idempotent receivers.

use bus::{PartitionedConsumer, Queue};
use std::sync::Arc;
use types::clock;
use types::errors::{OrderError, SagaError};
use types::ids::{CommandId, OrderId, SagaId, TradeId, TransactionId};
use types::messages::{
    CancelOrderCommand, MatchingCommand, OrderToMatchingEvent, ReleaseFundsCommand,
    ReserveFundsCommand, WalletCommand,
};
use types::numeric::{Amount, Price, Quantity};
use types::order::{Order, OrderStatus, OrderType, Side};

use crate::config::OmsConfig;
use crate::error::OmsError;
use crate::saga::{OrderSagaContext, SagaInstance, SagaState};
use crate::service::QuoteSource;
use crate::store::{OrderStore, SagaStore};

/// Drives one saga per order through its lifecycle
pub struct SagaOrchestrator {
    orders: Arc<OrderStore>,
    sagas: Arc<SagaStore>,
    wallet_commands: Queue<WalletCommand>,
    matching: Arc<PartitionedConsumer<MatchingCommand>>,
    quotes: Arc<dyn QuoteSource>,
    config: OmsConfig,
}

impl SagaOrchestrator {
    pub fn new(
        orders: Arc<OrderStore>,
        sagas: Arc<SagaStore>,
        wallet_commands: Queue<WalletCommand>,
        matching: Arc<PartitionedConsumer<MatchingCommand>>,
        quotes: Arc<dyn QuoteSource>,
        config: OmsConfig,
    ) -> Self {
        Self {
            orders,
            sagas,
            wallet_commands,
            matching,
            quotes,
            config,
        }
    }

    /// Start a new saga for an accepted order.
    ///
    /// Computes the reservation, persists saga and order, then emits the
    /// reserve-funds command. Returns the updated order.
    pub async fn start(&self, mut order: Order) -> Result<Order, OmsError> {
        let now = clock::now_nanos();

        let context = match order.order_type {
            OrderType::Limit => OrderSagaContext::for_limit_order(&order)?,
            OrderType::Market => OrderSagaContext::for_market_order(
                &order,
                self.quotes.best_ask(&order.symbol),
                self.config.market_buy_slippage,
            )?,
        };

        let mut saga = SagaInstance::new(context, self.config.max_retries, now);
        tracing::info!(saga_id = %saga.saga_id, order_id = %order.order_id, "saga started");

        order.set_reservation(
            saga.context.reserve_currency.clone(),
            saga.context.reserve_amount,
            now,
        );
        self.orders.save(order.clone());

        saga.transition_to(SagaState::AwaitingFunds, now)?;
        self.sagas.save(saga.clone());

        self.emit_reserve(&saga).await?;
        Ok(order)
    }

    /// Reservation succeeded: record it, submit the order to matching
    pub async fn on_funds_reserved(
        &self,
        saga_id: SagaId,
        transaction_id: TransactionId,
    ) -> Result<(), OmsError> {
        let now = clock::now_nanos();
        let mut saga = self.sagas.get(&saga_id)?;

        if saga.state != SagaState::AwaitingFunds {
            tracing::debug!(%saga_id, state = %saga.state, "duplicate funds-reserved reply skipped");
            return Ok(());
        }

        saga.context.funds_reserved = true;
        saga.context.wallet_transaction_id = Some(transaction_id);
        saga.transition_to(SagaState::FundsReserved, now)?;
        self.sagas.save(saga.clone());

        let mut order = self.orders.get(&saga.order_id)?;
        order.set_status(OrderStatus::FundsReserved, now);
        self.orders.save(order.clone());

        self.submit_to_matching(&mut saga, &mut order).await
    }

    /// Persist ORDER_SENT, mark the order OPEN, emit the submission
    async fn submit_to_matching(
        &self,
        saga: &mut SagaInstance,
        order: &mut Order,
    ) -> Result<(), OmsError> {
        let now = clock::now_nanos();

        saga.context.order_submitted = true;
        saga.transition_to(SagaState::OrderSent, now)?;
        self.sagas.save(saga.clone());

        order.set_status(OrderStatus::Open, now);
        self.orders.save(order.clone());

        let event = OrderToMatchingEvent {
            order_id: order.order_id,
            user_id: order.user_id,
            symbol: order.symbol.clone(),
            side: order.side,
            order_type: order.order_type,
            price: order.price,
            quantity: order.quantity,
            timestamp: now,
        };
        let symbol = event.symbol.clone();
        self.matching
            .publish(&symbol, MatchingCommand::Submit(event))
            .await?;

        tracing::info!(saga_id = %saga.saga_id, order_id = %order.order_id, "order sent to matching");
        Ok(())
    }

    /// Reservation rejected: fail the saga, reject the order.
    ///
    /// Nothing was reserved, so there is nothing to compensate.
    pub fn on_funds_reservation_failed(
        &self,
        saga_id: SagaId,
        reason: &str,
    ) -> Result<(), OmsError> {
        let now = clock::now_nanos();
        let mut saga = self.sagas.get(&saga_id)?;

        if saga.is_terminal() {
            tracing::debug!(%saga_id, "duplicate reservation-failed reply skipped");
            return Ok(());
        }

        saga.fail(format!("Fund reservation failed: {reason}"), now);
        self.sagas.save(saga.clone());

        let mut order = self.orders.get(&saga.order_id)?;
        order.reject(reason, now);
        self.orders.save(order);

        tracing::warn!(%saga_id, reason, "order rejected, reservation failed");
        Ok(())
    }

    /// Apply one fill to one side's order.
    ///
    /// Updates filled quantity and weighted-average price, releases the
    /// buy-side price improvement, and completes the saga when the order
    /// is fully filled. A fill for an order already CANCELLED still
    /// settles; the fill won the race for the quantity it matched.
    pub async fn on_trade_executed(
        &self,
        order_id: OrderId,
        quantity: Quantity,
        fill_price: Price,
        trade_id: TradeId,
    ) -> Result<(), OmsError> {
        let now = clock::now_nanos();

        let mut order = match self.orders.get(&order_id) {
            Ok(order) => order,
            Err(_) => {
                // A fill for an order this service never created (for
                // example liquidity seeded straight into the book).
                tracing::warn!(%order_id, %trade_id, "fill for unknown order ignored");
                return Ok(());
            }
        };
        let mut saga = self.sagas.get_by_order(&order_id)?;

        order.apply_fill(quantity, fill_price, now);
        let improvement = saga.context.apply_fill(quantity, fill_price);

        if !improvement.is_zero() {
            // The reservation was sized at the limit (or estimated)
            // price but the fill settled better; return the difference.
            self.emit_release(&saga, improvement, format!("IMPROVEMENT:{trade_id}"))
                .await?;
        }

        if order.is_fully_filled() {
            let residual = saga.context.take_remaining_reservation();
            if !residual.is_zero() {
                self.emit_release(&saga, residual, format!("UNUSED_RESERVATION:{}", order_id))
                    .await?;
            }
            if saga.state == SagaState::OrderSent {
                saga.complete(now)?;
                tracing::info!(saga_id = %saga.saga_id, %order_id, "saga completed, order filled");
            }
        }

        self.sagas.save(saga);
        self.orders.save(order);
        Ok(())
    }

    /// Cancel an order, compensating any outstanding reservation
    pub async fn cancel(&self, order_id: OrderId, reason: &str) -> Result<Order, OmsError> {
        let now = clock::now_nanos();
        let mut order = self.orders.get(&order_id)?;

        if !order.is_cancellable() {
            return Err(OrderError::NotCancellable {
                order_id,
                status: order.status.to_string(),
            }
            .into());
        }

        let mut saga = self.sagas.get_by_order(&order_id)?;

        // Retract from the book, through the same symbol partition as
        // the submission so the cancel cannot overtake it.
        if saga.context.order_submitted {
            let symbol = order.symbol.clone();
            self.matching
                .publish(
                    &symbol,
                    MatchingCommand::Cancel(CancelOrderCommand {
                        order_id,
                        symbol: symbol.clone(),
                        side: order.side,
                        timestamp: now,
                    }),
                )
                .await?;
        }

        self.compensate(&mut saga, "COMPENSATION").await?;

        order.cancel(reason, now)?;
        self.orders.save(order.clone());

        tracing::info!(%order_id, reason, "order cancelled");
        Ok(order)
    }

    /// A market order's remainder found no liquidity: finalize the order
    /// and return the unconsumed reservation
    pub async fn on_market_unfillable(
        &self,
        order_id: OrderId,
        unfilled_quantity: Quantity,
    ) -> Result<(), OmsError> {
        let now = clock::now_nanos();

        let mut order = match self.orders.get(&order_id) {
            Ok(order) => order,
            Err(_) => {
                tracing::warn!(%order_id, "unfillable notice for unknown order ignored");
                return Ok(());
            }
        };
        if order.status.is_terminal() {
            return Ok(());
        }

        let mut saga = self.sagas.get_by_order(&order_id)?;
        self.compensate(&mut saga, "UNFILLABLE").await?;

        order.cancel("UNFILLABLE", now)?;
        self.orders.save(order);

        tracing::info!(%order_id, %unfilled_quantity, "market remainder unfillable, order cancelled");
        Ok(())
    }

    /// Release whatever reservation is still outstanding, then mark the
    /// saga compensated.
    ///
    /// COMPENSATING is persisted with the outstanding amount still in
    /// the context so a crash before the send is re-driven; the release
    /// reason keys wallet-side deduplication across re-drives.
    async fn compensate(&self, saga: &mut SagaInstance, reason: &str) -> Result<(), OmsError> {
        let now = clock::now_nanos();

        saga.transition_to(SagaState::Compensating, now)?;
        self.sagas.save(saga.clone());

        let outstanding = saga.context.reserved_remaining;
        if saga.context.funds_reserved && !outstanding.is_zero() {
            self.emit_release(saga, outstanding, reason.to_string())
                .await?;
        }

        saga.context.take_remaining_reservation();
        saga.transition_to(SagaState::Compensated, now)?;
        self.sagas.save(saga.clone());
        Ok(())
    }

    /// Re-drive a stalled saga by re-emitting the command its state
    /// implies. Returns false when the state needs no re-drive (a
    /// resting order is healthy).
    pub async fn redrive(&self, saga_id: SagaId) -> Result<bool, OmsError> {
        let mut saga = self.sagas.get(&saga_id)?;
        let now = clock::now_nanos();

        match saga.state {
            SagaState::Started => {
                saga.transition_to(SagaState::AwaitingFunds, now)?;
                self.sagas.save(saga.clone());
                self.emit_reserve(&saga).await?;
                Ok(true)
            }
            SagaState::AwaitingFunds => {
                self.emit_reserve(&saga).await?;
                Ok(true)
            }
            SagaState::FundsReserved => {
                let mut order = self.orders.get(&saga.order_id)?;
                self.submit_to_matching(&mut saga, &mut order).await?;
                Ok(true)
            }
            SagaState::Compensating => {
                let outstanding = saga.context.reserved_remaining;
                if saga.context.funds_reserved && !outstanding.is_zero() {
                    self.emit_release(&saga, outstanding, "COMPENSATION".to_string())
                        .await?;
                }
                saga.context.take_remaining_reservation();
                saga.transition_to(SagaState::Compensated, now)?;
                self.sagas.save(saga.clone());
                Ok(true)
            }
            // Resting on the book, or already terminal.
            SagaState::OrderSent
            | SagaState::Completed
            | SagaState::Failed
            | SagaState::Compensated => Ok(false),
        }
    }

    async fn emit_reserve(&self, saga: &SagaInstance) -> Result<(), OmsError> {
        let side_tag = match saga.context.side {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
        };
        self.wallet_commands
            .publish(WalletCommand::Reserve(ReserveFundsCommand {
                command_id: CommandId::new(),
                saga_id: saga.saga_id,
                order_id: saga.order_id,
                user_id: saga.context.user_id,
                currency: saga.context.reserve_currency.clone(),
                amount: saga.context.reserve_amount,
                reason: format!("{side_tag}_ORDER:{}", saga.context.symbol),
            }))
            .await?;
        Ok(())
    }

    async fn emit_release(
        &self,
        saga: &SagaInstance,
        amount: Amount,
        reason: String,
    ) -> Result<(), OmsError> {
        self.wallet_commands
            .publish(WalletCommand::Release(ReleaseFundsCommand {
                command_id: CommandId::new(),
                saga_id: saga.saga_id,
                order_id: saga.order_id,
                user_id: saga.context.user_id,
                currency: saga.context.reserve_currency.clone(),
                amount,
                reason,
            }))
            .await?;
        Ok(())
    }

    /// Saga lookup for callers outside the orchestrator
    pub fn saga_for_order(&self, order_id: &OrderId) -> Result<SagaInstance, SagaError> {
        self.sagas.get_by_order(order_id)
    }
}
