//! Cross-service command and event contracts
//!
//! Commands flow saga → wallet; events flow wallet → saga and matching →
//! everyone. Field sets are the contract; the wire format is whatever the
//! transport serializes them to. Order-to-matching traffic is routed by
//! symbol so per-symbol ordering survives the trip.

use crate::ids::{CommandId, OrderId, SagaId, Symbol, TradeId, TransactionId, UserId, WalletId};
use crate::numeric::{Amount, Price, Quantity};
use crate::order::{OrderType, Side};
use serde::{Deserialize, Serialize};

/// Ask the wallet to earmark funds for a pending order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReserveFundsCommand {
    pub command_id: CommandId,
    pub saga_id: SagaId,
    pub order_id: OrderId,
    pub user_id: UserId,
    pub currency: String,
    pub amount: Amount,
    pub reason: String,
}

/// Reservation succeeded
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundsReservedEvent {
    pub saga_id: SagaId,
    pub order_id: OrderId,
    pub user_id: UserId,
    pub wallet_id: WalletId,
    pub currency: String,
    pub amount: Amount,
    pub transaction_id: TransactionId,
}

/// Reservation rejected (insufficient funds or missing wallet)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundsReservationFailedEvent {
    pub saga_id: SagaId,
    pub order_id: OrderId,
    pub user_id: UserId,
    pub currency: String,
    pub requested_amount: Amount,
    pub available_balance: Option<Amount>,
    pub reason: String,
}

/// Return reserved funds to available (compensation / price improvement)
///
/// Fire-and-forget: no reply event, duplicate deliveries are absorbed by
/// the wallet's processed-marker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReleaseFundsCommand {
    pub command_id: CommandId,
    pub saga_id: SagaId,
    pub order_id: OrderId,
    pub user_id: UserId,
    pub currency: String,
    pub amount: Amount,
    pub reason: String,
}

/// Order submission to the matching engine, partitioned by symbol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderToMatchingEvent {
    pub order_id: OrderId,
    pub user_id: UserId,
    pub symbol: Symbol,
    pub side: Side,
    pub order_type: OrderType,
    pub price: Option<Price>,
    pub quantity: Quantity,
    pub timestamp: i64,
}

/// Retract a resting order from the book
///
/// Routed through the same symbol partition as submissions so a cancel
/// can never overtake the submit it follows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CancelOrderCommand {
    pub order_id: OrderId,
    pub symbol: Symbol,
    pub side: Side,
    pub timestamp: i64,
}

/// Everything the matching partition worker consumes for one symbol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command")]
pub enum MatchingCommand {
    Submit(OrderToMatchingEvent),
    Cancel(CancelOrderCommand),
}

impl MatchingCommand {
    /// Partition key
    pub fn symbol(&self) -> &Symbol {
        match self {
            MatchingCommand::Submit(e) => &e.symbol,
            MatchingCommand::Cancel(c) => &c.symbol,
        }
    }
}

/// A fill happened
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeExecutedEvent {
    pub trade_id: TradeId,
    pub symbol: Symbol,
    pub buy_order_id: OrderId,
    pub buy_user_id: UserId,
    pub sell_order_id: OrderId,
    pub sell_user_id: UserId,
    pub price: Price,
    pub quantity: Quantity,
    pub timestamp: i64,
}

/// A market order's remainder found no liquidity and was dropped
///
/// Lets the saga drive the order to a terminal status instead of leaving
/// it open against a book it is no longer on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketOrderUnfilledEvent {
    pub order_id: OrderId,
    pub user_id: UserId,
    pub symbol: Symbol,
    pub unfilled_quantity: Quantity,
    pub timestamp: i64,
}

/// Events the order service consumes from the matching engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum MatchingEvent {
    TradeExecuted(TradeExecutedEvent),
    MarketOrderUnfilled(MarketOrderUnfilledEvent),
}

/// One aggregated side level of a book update
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookLevel {
    pub price: Price,
    pub quantity: Quantity,
}

/// Book state broadcast after every mutation of a symbol's book
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderBookUpdateEvent {
    pub symbol: Symbol,
    pub bids: Vec<BookLevel>,
    pub asks: Vec<BookLevel>,
    pub timestamp: i64,
}

/// Move settled funds between buyer and seller wallets
///
/// The four legs are spelled out by the producer so the wallet applies
/// them mechanically without re-deriving currencies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettleTradeCommand {
    pub command_id: CommandId,
    pub saga_id: SagaId,
    pub trade_id: TradeId,
    pub symbol: Symbol,
    pub buyer_id: UserId,
    pub buyer_debit_currency: String,
    pub buyer_debit_amount: Amount,
    pub buyer_credit_currency: String,
    pub buyer_credit_amount: Amount,
    pub seller_id: UserId,
    pub seller_debit_currency: String,
    pub seller_debit_amount: Amount,
    pub seller_credit_currency: String,
    pub seller_credit_amount: Amount,
}

/// Everything the wallet command handler consumes, as one routable enum
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command")]
pub enum WalletCommand {
    Reserve(ReserveFundsCommand),
    Release(ReleaseFundsCommand),
    Settle(SettleTradeCommand),
}

impl WalletCommand {
    /// Idempotency key: one logical operation per saga/trade, regardless
    /// of how many times the transport delivers it.
    ///
    /// Releases key on the reason so a re-driven compensation dedupes
    /// against the original send while a price-improvement release for a
    /// different trade does not.
    pub fn idempotency_key(&self) -> String {
        match self {
            WalletCommand::Reserve(c) => format!("reserve:{}", c.saga_id),
            WalletCommand::Release(c) => format!("release:{}:{}", c.saga_id, c.reason),
            WalletCommand::Settle(c) => format!("settle:{}", c.trade_id),
        }
    }
}

/// Replies the saga consumes from the wallet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum SagaReply {
    FundsReserved(FundsReservedEvent),
    FundsReservationFailed(FundsReservationFailedEvent),
}
