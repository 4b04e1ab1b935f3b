//! Wallet command handler
//!
//! Consumes saga commands from the bus with at-least-once semantics.
//! Every command is idempotent: a processed-marker keyed by the logical
//! operation absorbs duplicate deliveries. Business rejections (such as
//! insufficient funds) are answered with failure events and acknowledged;
//! only infrastructure failures propagate for retry/dead-letter.

use bus::{BusError, ProcessedMarkers, Queue};
use dashmap::DashMap;
use std::sync::Arc;
use thiserror::Error;
use types::clock;
use types::errors::LedgerError;
use types::messages::{
    FundsReservationFailedEvent, FundsReservedEvent, ReleaseFundsCommand, ReserveFundsCommand,
    SagaReply, SettleTradeCommand, WalletCommand,
};
use types::numeric::Amount;

use crate::service::WalletService;

/// Errors that should be retried and eventually dead-lettered
#[derive(Error, Debug)]
pub enum HandlerError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Bus(#[from] BusError),
}

/// Handles wallet commands from the order saga
pub struct WalletCommandHandler {
    service: Arc<WalletService>,
    markers: ProcessedMarkers,
    replies: Queue<SagaReply>,
    /// Last reply per reservation, re-published on duplicate delivery so
    /// a re-driven saga whose reply was lost still gets its answer
    reply_cache: DashMap<String, SagaReply>,
}

impl WalletCommandHandler {
    pub fn new(service: Arc<WalletService>, replies: Queue<SagaReply>) -> Self {
        Self {
            service,
            markers: ProcessedMarkers::default(),
            replies,
            reply_cache: DashMap::new(),
        }
    }

    /// Process one command; duplicate deliveries are no-ops, except that
    /// a duplicate reserve re-sends its original reply
    pub async fn handle(&self, command: WalletCommand) -> Result<(), HandlerError> {
        let key = command.idempotency_key();
        if self.markers.is_processed(&key) {
            tracing::debug!(%key, "duplicate command delivery skipped");
            let cached = self.reply_cache.get(&key).map(|r| r.value().clone());
            if let Some(reply) = cached {
                self.replies.publish(reply).await?;
            }
            return Ok(());
        }

        match command {
            WalletCommand::Reserve(command) => {
                let reply = self.handle_reserve(command).await?;
                // Cache and mark before replying: if the publish fails,
                // the redelivery must re-send this reply, not reserve a
                // second time.
                self.reply_cache.insert(key.clone(), reply.clone());
                self.markers.mark(key);
                self.replies.publish(reply).await?;
            }
            WalletCommand::Release(command) => {
                self.handle_release(command)?;
                self.markers.mark(key);
            }
            WalletCommand::Settle(command) => {
                self.handle_settle(command)?;
                self.markers.mark(key);
            }
        }
        Ok(())
    }

    async fn handle_reserve(&self, command: ReserveFundsCommand) -> Result<SagaReply, HandlerError> {
        tracing::info!(saga_id = %command.saga_id, amount = %command.amount, "reserve funds");

        let result = self.service.reserve_funds(
            command.user_id,
            &command.currency,
            command.amount,
            command.order_id,
            clock::now_nanos(),
        );

        match result {
            Ok((wallet_id, transaction_id)) => {
                Ok(SagaReply::FundsReserved(FundsReservedEvent {
                    saga_id: command.saga_id,
                    order_id: command.order_id,
                    user_id: command.user_id,
                    wallet_id,
                    currency: command.currency,
                    amount: command.amount,
                    transaction_id,
                }))
            }
            Err(LedgerError::InsufficientFunds {
                requested: _,
                available,
            }) => Ok(Self::failed_reply(command, Some(available), "INSUFFICIENT_FUNDS")),
            Err(LedgerError::WalletNotFound { .. }) => {
                Ok(Self::failed_reply(command, None, "WALLET_NOT_FOUND"))
            }
            // Frozen wallet or invariant violation: not answerable, let
            // the transport retry and dead-letter.
            Err(other) => Err(other.into()),
        }
    }

    fn failed_reply(
        command: ReserveFundsCommand,
        available: Option<rust_decimal::Decimal>,
        reason: &str,
    ) -> SagaReply {
        tracing::warn!(saga_id = %command.saga_id, reason, "fund reservation failed");
        SagaReply::FundsReservationFailed(FundsReservationFailedEvent {
            saga_id: command.saga_id,
            order_id: command.order_id,
            user_id: command.user_id,
            currency: command.currency,
            requested_amount: command.amount,
            available_balance: available.and_then(Amount::try_new),
            reason: reason.to_string(),
        })
    }

    fn handle_release(&self, command: ReleaseFundsCommand) -> Result<(), HandlerError> {
        tracing::info!(saga_id = %command.saga_id, amount = %command.amount, reason = %command.reason, "release funds");
        self.service.release_funds(
            command.user_id,
            &command.currency,
            command.amount,
            command.order_id,
            clock::now_nanos(),
        )?;
        Ok(())
    }

    fn handle_settle(&self, command: SettleTradeCommand) -> Result<(), HandlerError> {
        tracing::info!(trade_id = %command.trade_id, "settle trade");
        // The buyer's credit currency is the base; the buyer's debit
        // currency is the quote. The seller's legs mirror them.
        self.service.settle_trade(
            command.buyer_id,
            command.seller_id,
            &command.buyer_credit_currency,
            &command.buyer_debit_currency,
            command.buyer_credit_amount,
            command.buyer_debit_amount,
            command.trade_id,
            clock::now_nanos(),
        )?;
        Ok(())
    }

    /// Marker store, exposed for maintenance purges
    pub fn markers(&self) -> &ProcessedMarkers {
        &self.markers
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WalletConfig;
    use std::str::FromStr;
    use types::ids::{CommandId, OrderId, SagaId, Symbol, TradeId, UserId};

    fn setup() -> (
        WalletCommandHandler,
        Arc<WalletService>,
        tokio::sync::mpsc::Receiver<SagaReply>,
    ) {
        let service = Arc::new(WalletService::new(WalletConfig::default()));
        let (replies, rx) = bus::channel("saga.replies", 64);
        let handler = WalletCommandHandler::new(Arc::clone(&service), replies);
        (handler, service, rx)
    }

    fn amt(s: &str) -> Amount {
        Amount::from_str(s).unwrap()
    }

    fn reserve_command(user: UserId, amount: &str) -> WalletCommand {
        WalletCommand::Reserve(ReserveFundsCommand {
            command_id: CommandId::new(),
            saga_id: SagaId::new(),
            order_id: OrderId::new(),
            user_id: user,
            currency: "USDT".to_string(),
            amount: amt(amount),
            reason: "BUY_ORDER:BTC/USDT".to_string(),
        })
    }

    #[tokio::test]
    async fn test_reserve_success_replies_with_event() {
        let (handler, service, mut rx) = setup();
        let user = UserId::new();
        service.deposit(user, "USDT", amt("1000"), 1).unwrap();

        handler.handle(reserve_command(user, "400")).await.unwrap();

        match rx.recv().await.unwrap() {
            SagaReply::FundsReserved(event) => {
                assert_eq!(event.amount, amt("400"));
            }
            other => panic!("unexpected reply: {other:?}"),
        }
        assert_eq!(service.balance(user, "USDT").unwrap().reserved, amt("400"));
    }

    #[tokio::test]
    async fn test_reserve_insufficient_replies_with_failure() {
        let (handler, service, mut rx) = setup();
        let user = UserId::new();
        service.deposit(user, "USDT", amt("100"), 1).unwrap();

        handler.handle(reserve_command(user, "400")).await.unwrap();

        match rx.recv().await.unwrap() {
            SagaReply::FundsReservationFailed(event) => {
                assert_eq!(event.reason, "INSUFFICIENT_FUNDS");
                assert_eq!(event.available_balance, Some(amt("100")));
            }
            other => panic!("unexpected reply: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_reserve_missing_wallet_replies_with_failure() {
        let (handler, _service, mut rx) = setup();

        handler
            .handle(reserve_command(UserId::new(), "400"))
            .await
            .unwrap();

        match rx.recv().await.unwrap() {
            SagaReply::FundsReservationFailed(event) => {
                assert_eq!(event.reason, "WALLET_NOT_FOUND");
                assert_eq!(event.available_balance, None);
            }
            other => panic!("unexpected reply: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_duplicate_reserve_reserves_once_and_resends_reply() {
        let (handler, service, mut rx) = setup();
        let user = UserId::new();
        service.deposit(user, "USDT", amt("1000"), 1).unwrap();

        let command = reserve_command(user, "400");
        handler.handle(command.clone()).await.unwrap();
        handler.handle(command).await.unwrap();

        // The duplicate re-sent the original reply (same transaction)
        // but the funds moved only once.
        let first = match rx.recv().await.unwrap() {
            SagaReply::FundsReserved(event) => event,
            other => panic!("unexpected reply: {other:?}"),
        };
        let second = match rx.recv().await.unwrap() {
            SagaReply::FundsReserved(event) => event,
            other => panic!("unexpected reply: {other:?}"),
        };
        assert_eq!(first.transaction_id, second.transaction_id);
        assert_eq!(service.balance(user, "USDT").unwrap().reserved, amt("400"));
    }

    #[tokio::test]
    async fn test_duplicate_settle_is_noop() {
        let (handler, service, _rx) = setup();
        let buyer = UserId::new();
        let seller = UserId::new();
        service.deposit(buyer, "USDT", amt("1000"), 1).unwrap();
        service
            .reserve_funds(buyer, "USDT", amt("990"), OrderId::new(), 2)
            .unwrap();
        service.deposit(seller, "BTC", amt("0.1"), 3).unwrap();
        service
            .reserve_funds(seller, "BTC", amt("0.1"), OrderId::new(), 4)
            .unwrap();

        let command = WalletCommand::Settle(SettleTradeCommand {
            command_id: CommandId::new(),
            saga_id: SagaId::new(),
            trade_id: TradeId::new(),
            symbol: Symbol::new("BTC/USDT"),
            buyer_id: buyer,
            buyer_debit_currency: "USDT".to_string(),
            buyer_debit_amount: amt("990"),
            buyer_credit_currency: "BTC".to_string(),
            buyer_credit_amount: amt("0.1"),
            seller_id: seller,
            seller_debit_currency: "BTC".to_string(),
            seller_debit_amount: amt("0.1"),
            seller_credit_currency: "USDT".to_string(),
            seller_credit_amount: amt("990"),
        });

        handler.handle(command.clone()).await.unwrap();
        handler.handle(command).await.unwrap();

        // Settled exactly once.
        assert_eq!(service.balance(buyer, "BTC").unwrap().available, amt("0.1"));
        assert_eq!(
            service.balance(seller, "USDT").unwrap().available,
            amt("990")
        );
    }

    #[tokio::test]
    async fn test_release_applies_once() {
        let (handler, service, _rx) = setup();
        let user = UserId::new();
        let order = OrderId::new();
        service.deposit(user, "USDT", amt("1000"), 1).unwrap();
        service
            .reserve_funds(user, "USDT", amt("500"), order, 2)
            .unwrap();

        let command = WalletCommand::Release(ReleaseFundsCommand {
            command_id: CommandId::new(),
            saga_id: SagaId::new(),
            order_id: order,
            user_id: user,
            currency: "USDT".to_string(),
            amount: amt("500"),
            reason: "COMPENSATION".to_string(),
        });

        handler.handle(command.clone()).await.unwrap();
        handler.handle(command).await.unwrap();

        let view = service.balance(user, "USDT").unwrap();
        assert_eq!(view.available, amt("1000"));
        assert_eq!(view.reserved, Amount::zero());
    }
}
