//! Immutable ledger rows
//!
//! A transaction row is written once and never updated. Credits are
//! positive, debits negative; the running sum of a wallet's rows must
//! always equal `available + reserved`.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use types::balance::TransactionType;
use types::ids::{OrderId, TradeId, TransactionId, WalletId};
use types::numeric::{normalize, Amount};

/// What a ledger row refers back to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id")]
pub enum LedgerRef {
    Order(OrderId),
    Trade(TradeId),
}

/// One immutable ledger entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalletTransaction {
    pub transaction_id: TransactionId,
    pub wallet_id: WalletId,
    /// Signed amount: credit positive, debit negative
    pub amount: Decimal,
    pub transaction_type: TransactionType,
    pub reference: Option<LedgerRef>,
    pub description: String,
    pub created_at: i64, // Unix nanos
}

impl WalletTransaction {
    /// Build a credit row (positive amount)
    pub fn credit(
        wallet_id: WalletId,
        amount: Amount,
        transaction_type: TransactionType,
        reference: Option<LedgerRef>,
        description: impl Into<String>,
        timestamp: i64,
    ) -> Self {
        Self {
            transaction_id: TransactionId::new(),
            wallet_id,
            amount: normalize(amount.as_decimal()),
            transaction_type,
            reference,
            description: description.into(),
            created_at: timestamp,
        }
    }

    /// Build a debit row (negative amount)
    pub fn debit(
        wallet_id: WalletId,
        amount: Amount,
        transaction_type: TransactionType,
        reference: Option<LedgerRef>,
        description: impl Into<String>,
        timestamp: i64,
    ) -> Self {
        Self {
            transaction_id: TransactionId::new(),
            wallet_id,
            amount: normalize(-amount.as_decimal()),
            transaction_type,
            reference,
            description: description.into(),
            created_at: timestamp,
        }
    }
}
