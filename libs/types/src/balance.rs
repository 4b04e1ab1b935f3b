//! Wallet balance pair and ledger entry kinds
//!
//! The balance is a cached projection of the append-only transaction log:
//! `available + reserved` must always equal the running sum of the wallet's
//! ledger rows. All mutations return errors instead of going negative.

use crate::errors::LedgerError;
use crate::numeric::Amount;
use serde::{Deserialize, Serialize};

/// Kind of ledger entry, carried on every transaction row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    /// External deposit (faucet, admin credit)
    Deposit,
    /// Funds earmarked for a pending order
    Reserve,
    /// Reserved funds returned to available
    Release,
    /// Debit from a completed trade
    TradeDebit,
    /// Credit from a completed trade
    TradeCredit,
    /// Trading fee deduction
    Fee,
}

/// Balance pair for one (user, currency) wallet
///
/// Invariant: `available >= 0` and `reserved >= 0` at all times; the Amount
/// type makes negative values unrepresentable, so every mutation that would
/// underflow fails before touching state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    pub available: Amount,
    pub reserved: Amount,
}

impl Balance {
    /// A zeroed balance
    pub fn zero() -> Self {
        Self {
            available: Amount::zero(),
            reserved: Amount::zero(),
        }
    }

    /// Total funds in the wallet
    pub fn total(&self) -> Amount {
        self.available + self.reserved
    }

    /// Check whether `amount` can be reserved
    pub fn has_available(&self, amount: Amount) -> bool {
        self.available >= amount
    }

    /// Credit the available side (deposit, trade credit)
    pub fn credit_available(&mut self, amount: Amount) {
        self.available = self.available + amount;
    }

    /// Move funds from available to reserved
    pub fn reserve(&mut self, amount: Amount) -> Result<(), LedgerError> {
        let available = self.available.checked_sub(amount).ok_or_else(|| {
            LedgerError::InsufficientFunds {
                requested: amount.as_decimal(),
                available: self.available.as_decimal(),
            }
        })?;
        self.available = available;
        self.reserved = self.reserved + amount;
        Ok(())
    }

    /// Move funds from reserved back to available
    pub fn release(&mut self, amount: Amount) -> Result<(), LedgerError> {
        let reserved = self.reserved.checked_sub(amount).ok_or_else(|| {
            LedgerError::ReleaseExceedsReserved {
                requested: amount.as_decimal(),
                reserved: self.reserved.as_decimal(),
            }
        })?;
        self.reserved = reserved;
        self.available = self.available + amount;
        Ok(())
    }

    /// Remove funds from the reserved side (trade settlement debit).
    ///
    /// A shortfall in reserved falls through to available: a fill that
    /// raced a cancel finds its reservation already released, and the
    /// released funds are still sitting in available. Returns the amount
    /// that was taken from available (zero in the normal path).
    pub fn debit_reserved(&mut self, amount: Amount) -> Result<Amount, LedgerError> {
        match self.reserved.checked_sub(amount) {
            Some(reserved) => {
                self.reserved = reserved;
                Ok(Amount::zero())
            }
            None => {
                let shortfall = amount.saturating_sub(self.reserved);
                let available = self.available.checked_sub(shortfall).ok_or_else(|| {
                    LedgerError::DebitExceedsBalance {
                        requested: amount.as_decimal(),
                        reserved: self.reserved.as_decimal(),
                        available: self.available.as_decimal(),
                    }
                })?;
                self.reserved = Amount::zero();
                self.available = available;
                Ok(shortfall)
            }
        }
    }
}
