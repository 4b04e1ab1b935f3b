//! Inbound event handling for the order service
//!
//! Consumes wallet replies and matching events from the bus. Both paths
//! are idempotent: replies dedupe on saga state, matching events on a
//! processed-marker per logical action, so at-least-once delivery and
//! re-drive duplicates collapse to no-ops.

use bus::{ProcessedMarkers, Queue};
use std::sync::Arc;
use types::ids::{CommandId, SagaId};
use types::messages::{
    MatchingEvent, SagaReply, SettleTradeCommand, TradeExecutedEvent, WalletCommand,
};
use types::numeric::Amount;

use crate::error::OmsError;
use crate::saga::SagaOrchestrator;

/// Event-side handlers for the order service
pub struct OmsEventHandlers {
    orchestrator: Arc<SagaOrchestrator>,
    wallet_commands: Queue<WalletCommand>,
    markers: ProcessedMarkers,
}

impl OmsEventHandlers {
    pub fn new(orchestrator: Arc<SagaOrchestrator>, wallet_commands: Queue<WalletCommand>) -> Self {
        Self {
            orchestrator,
            wallet_commands,
            markers: ProcessedMarkers::default(),
        }
    }

    /// Wallet reply: advance or fail the saga
    pub async fn handle_saga_reply(&self, reply: SagaReply) -> Result<(), OmsError> {
        match reply {
            SagaReply::FundsReserved(event) => {
                self.orchestrator
                    .on_funds_reserved(event.saga_id, event.transaction_id)
                    .await
            }
            SagaReply::FundsReservationFailed(event) => self
                .orchestrator
                .on_funds_reservation_failed(event.saga_id, &event.reason),
        }
    }

    /// Matching event: settle fills, finalize unfillable market orders
    pub async fn handle_matching_event(&self, event: MatchingEvent) -> Result<(), OmsError> {
        match event {
            MatchingEvent::TradeExecuted(event) => self.handle_trade(event).await,
            MatchingEvent::MarketOrderUnfilled(event) => {
                let key = format!("unfilled:{}", event.order_id);
                if self.markers.is_processed(&key) {
                    return Ok(());
                }
                self.orchestrator
                    .on_market_unfillable(event.order_id, event.unfilled_quantity)
                    .await?;
                self.markers.mark(key);
                Ok(())
            }
        }
    }

    /// One trade: emit the settlement command once, then apply the fill
    /// to the buy and sell orders.
    ///
    /// Each action carries its own marker so a retry after a partial
    /// failure only redoes the unfinished parts.
    async fn handle_trade(&self, event: TradeExecutedEvent) -> Result<(), OmsError> {
        let settle_key = format!("settle-emit:{}", event.trade_id);
        if !self.markers.is_processed(&settle_key) {
            self.publish_settlement(&event).await?;
            self.markers.mark(settle_key);
        }

        for order_id in [event.buy_order_id, event.sell_order_id] {
            let fill_key = format!("fill:{}:{}", event.trade_id, order_id);
            if self.markers.is_processed(&fill_key) {
                continue;
            }
            self.orchestrator
                .on_trade_executed(order_id, event.quantity, event.price, event.trade_id)
                .await?;
            self.markers.mark(fill_key);
        }

        Ok(())
    }

    /// Turn a trade into the four-leg settlement command
    async fn publish_settlement(&self, event: &TradeExecutedEvent) -> Result<(), OmsError> {
        let base_currency = event.symbol.base().to_string();
        let quote_currency = event.symbol.quote().to_string();

        let base_amount =
            Amount::try_new(event.quantity.as_decimal()).unwrap_or_else(Amount::zero);
        let quote_amount = Amount::from_price_quantity(event.price, event.quantity);

        self.wallet_commands
            .publish(WalletCommand::Settle(SettleTradeCommand {
                command_id: CommandId::new(),
                // Settlement is scoped to the trade, not one order's saga.
                saga_id: SagaId::from_uuid(*event.trade_id.as_uuid()),
                trade_id: event.trade_id,
                symbol: event.symbol.clone(),
                buyer_id: event.buy_user_id,
                buyer_debit_currency: quote_currency.clone(),
                buyer_debit_amount: quote_amount,
                buyer_credit_currency: base_currency.clone(),
                buyer_credit_amount: base_amount,
                seller_id: event.sell_user_id,
                seller_debit_currency: base_currency,
                seller_debit_amount: base_amount,
                seller_credit_currency: quote_currency,
                seller_credit_amount: quote_amount,
            }))
            .await?;

        tracing::info!(trade_id = %event.trade_id, "settlement command published");
        Ok(())
    }

    /// Marker store, exposed for maintenance purges
    pub fn markers(&self) -> &ProcessedMarkers {
        &self.markers
    }
}
