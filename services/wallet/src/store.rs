//! Wallet storage with per-wallet exclusive locking
//!
//! One entry per (user, currency). Each entry guards its balance pair and
//! transaction log behind a single mutex scoped to one read-check-write;
//! the lock is never held across an await point. After every mutation the
//! cached balance is verified against the running ledger sum; divergence
//! freezes the wallet for further mutation.

use dashmap::DashMap;
use rust_decimal::Decimal;
use std::sync::{Arc, Mutex, MutexGuard};
use types::balance::Balance;
use types::errors::LedgerError;
use types::ids::{UserId, WalletId};

use crate::ledger::WalletTransaction;

/// Mutable wallet state, guarded by the entry mutex
#[derive(Debug)]
pub struct WalletState {
    pub balance: Balance,
    pub transactions: Vec<WalletTransaction>,
    /// Running sum of all transaction amounts
    ledger_sum: Decimal,
    /// Set when the projection diverged from the ledger sum
    frozen: bool,
}

impl WalletState {
    fn new() -> Self {
        Self {
            balance: Balance::zero(),
            transactions: Vec::new(),
            ledger_sum: Decimal::ZERO,
            frozen: false,
        }
    }

    /// Append a row and verify the projection still matches the log.
    ///
    /// Call after the balance mutation of the same unit of work. On
    /// divergence the wallet is frozen and the violation returned.
    pub fn append_verified(
        &mut self,
        wallet_id: WalletId,
        row: WalletTransaction,
    ) -> Result<(), LedgerError> {
        self.ledger_sum += row.amount;
        self.transactions.push(row);

        if self.balance.total().as_decimal() != self.ledger_sum {
            self.frozen = true;
            tracing::error!(
                %wallet_id,
                balance_total = %self.balance.total(),
                ledger_sum = %self.ledger_sum,
                "balance projection diverged from ledger sum; wallet frozen"
            );
            return Err(LedgerError::InvariantViolation { wallet_id });
        }
        Ok(())
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    pub fn ledger_sum(&self) -> Decimal {
        self.ledger_sum
    }
}

/// One wallet: identity plus guarded state
#[derive(Debug)]
pub struct Wallet {
    pub wallet_id: WalletId,
    pub user_id: UserId,
    pub currency: String,
    state: Mutex<WalletState>,
}

impl Wallet {
    /// Take the exclusive per-wallet lock.
    ///
    /// Fails if the wallet was frozen by an earlier invariant violation.
    pub fn lock(&self) -> Result<MutexGuard<'_, WalletState>, LedgerError> {
        let state = self.state.lock().expect("wallet lock");
        if state.is_frozen() {
            return Err(LedgerError::WalletFrozen {
                wallet_id: self.wallet_id,
            });
        }
        Ok(state)
    }

    /// Read a consistent copy of the balance pair
    pub fn balance(&self) -> Balance {
        self.state.lock().expect("wallet lock").balance
    }
}

/// All wallets, keyed by (user, currency)
#[derive(Default)]
pub struct WalletStore {
    wallets: DashMap<(UserId, String), Arc<Wallet>>,
}

impl WalletStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Find a wallet, or fail with not-found
    pub fn get(&self, user_id: UserId, currency: &str) -> Result<Arc<Wallet>, LedgerError> {
        self.wallets
            .get(&(user_id, currency.to_string()))
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| LedgerError::WalletNotFound {
                user_id,
                currency: currency.to_string(),
            })
    }

    /// Find or create the wallet for (user, currency)
    pub fn get_or_create(&self, user_id: UserId, currency: &str) -> Arc<Wallet> {
        let key = (user_id, currency.to_string());
        let entry = self.wallets.entry(key).or_insert_with(|| {
            let wallet_id = WalletId::new();
            tracing::info!(%wallet_id, %user_id, currency, "wallet created");
            Arc::new(Wallet {
                wallet_id,
                user_id,
                currency: currency.to_string(),
                state: Mutex::new(WalletState::new()),
            })
        });
        Arc::clone(entry.value())
    }

    /// All wallets belonging to a user
    pub fn for_user(&self, user_id: UserId) -> Vec<Arc<Wallet>> {
        self.wallets
            .iter()
            .filter(|entry| entry.key().0 == user_id)
            .map(|entry| Arc::clone(entry.value()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.wallets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.wallets.is_empty()
    }
}
