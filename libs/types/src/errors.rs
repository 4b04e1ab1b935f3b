//! Error taxonomy for the order-lifecycle pipeline
//!
//! Validation failures reject synchronously, insufficient funds rejects the
//! order without compensation, not-found is fatal to the operation only,
//! state conflicts reject illegal transitions, and transient transport
//! failures are retried by the bus until dead-lettered.

use crate::ids::{OrderId, SagaId, UserId, WalletId};
use rust_decimal::Decimal;
use thiserror::Error;

/// Numeric parse/range errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum NumericError {
    #[error("Unparseable decimal: {0}")]
    Unparseable(String),

    #[error("Price must be strictly positive, got {0}")]
    NonPositivePrice(Decimal),

    #[error("Quantity must be non-negative, got {0}")]
    NegativeQuantity(Decimal),

    #[error("Amount must be non-negative, got {0}")]
    NegativeAmount(Decimal),
}

/// Order validation and lifecycle errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OrderError {
    #[error("Invalid quantity: must be strictly positive")]
    InvalidQuantity,

    #[error("Limit orders require a positive limit price")]
    MissingLimitPrice,

    #[error("Market orders must not carry a limit price")]
    UnexpectedLimitPrice,

    #[error("Invalid symbol: {0}")]
    InvalidSymbol(String),

    #[error("Duplicate client order id: {0}")]
    DuplicateClientOrderId(String),

    #[error("Order not found: {order_id}")]
    NotFound { order_id: OrderId },

    #[error("Order {order_id} does not belong to user {user_id}")]
    NotOwner { order_id: OrderId, user_id: UserId },

    #[error("Order {order_id} cannot be cancelled in status {status}")]
    NotCancellable { order_id: OrderId, status: String },

    #[error("No resting liquidity to price market order for {symbol}")]
    NoLiquidity { symbol: String },
}

/// Wallet ledger errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LedgerError {
    #[error("Wallet not found for user {user_id} currency {currency}")]
    WalletNotFound { user_id: UserId, currency: String },

    #[error("Insufficient funds: requested {requested}, available {available}")]
    InsufficientFunds {
        requested: Decimal,
        available: Decimal,
    },

    #[error("Release of {requested} exceeds reserved balance {reserved}")]
    ReleaseExceedsReserved {
        requested: Decimal,
        reserved: Decimal,
    },

    #[error("Debit of {requested} exceeds balances (reserved {reserved}, available {available})")]
    DebitExceedsBalance {
        requested: Decimal,
        reserved: Decimal,
        available: Decimal,
    },

    #[error("Balance diverged from ledger sum for wallet {wallet_id}; wallet frozen")]
    InvariantViolation { wallet_id: WalletId },

    #[error("Wallet {wallet_id} is frozen pending reconciliation")]
    WalletFrozen { wallet_id: WalletId },

    #[error("Faucet cooldown active for user {user_id}: {remaining_secs}s remaining")]
    FaucetCooldown { user_id: UserId, remaining_secs: u64 },
}

/// Saga state machine errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SagaError {
    #[error("Saga not found: {saga_id}")]
    NotFound { saga_id: SagaId },

    #[error("Saga for order {order_id} not found")]
    NotFoundForOrder { order_id: OrderId },

    #[error("Illegal saga transition from {from} to {to}")]
    IllegalTransition { from: String, to: String },

    #[error("Saga {saga_id} exhausted its {max_retries} retries")]
    RetriesExhausted { saga_id: SagaId, max_retries: u32 },

    #[error("Saga context serialization failed: {0}")]
    ContextCodec(String),
}
