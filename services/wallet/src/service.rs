//! Core wallet service implementing the double-entry ledger operations
//!
//! All balance modification happens through this service. Every mutation
//! pairs one immutable ledger row with one balance update under the
//! wallet's exclusive lock, then verifies the projection against the
//! running ledger sum.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use types::balance::TransactionType;
use types::errors::LedgerError;
use types::ids::{OrderId, TradeId, TransactionId, UserId, WalletId};
use types::numeric::Amount;

use crate::config::WalletConfig;
use crate::ledger::{LedgerRef, WalletTransaction};
use crate::store::{Wallet, WalletStore};

/// Read-model of one wallet's balance pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceView {
    pub wallet_id: WalletId,
    pub user_id: UserId,
    pub currency: String,
    pub available: Amount,
    pub reserved: Amount,
}

/// Wallet service
pub struct WalletService {
    store: WalletStore,
    config: WalletConfig,
    faucet_claims: DashMap<UserId, Instant>,
}

impl WalletService {
    pub fn new(config: WalletConfig) -> Self {
        Self {
            store: WalletStore::new(),
            config,
            faucet_claims: DashMap::new(),
        }
    }

    /// Get or create a wallet for user and currency
    pub fn get_or_create_wallet(&self, user_id: UserId, currency: &str) -> Arc<Wallet> {
        self.store.get_or_create(user_id, currency)
    }

    /// All balances for a user
    pub fn balances(&self, user_id: UserId) -> Vec<BalanceView> {
        let mut views: Vec<BalanceView> = self
            .store
            .for_user(user_id)
            .iter()
            .map(|wallet| Self::view(wallet))
            .collect();
        views.sort_by(|a, b| a.currency.cmp(&b.currency));
        views
    }

    /// Balance for a specific currency
    pub fn balance(&self, user_id: UserId, currency: &str) -> Result<BalanceView, LedgerError> {
        let wallet = self.store.get(user_id, currency)?;
        Ok(Self::view(&wallet))
    }

    /// Credit an external deposit to available
    pub fn deposit(
        &self,
        user_id: UserId,
        currency: &str,
        amount: Amount,
        timestamp: i64,
    ) -> Result<BalanceView, LedgerError> {
        let wallet = self.store.get_or_create(user_id, currency);
        {
            let mut state = wallet.lock()?;
            state.balance.credit_available(amount);
            state.append_verified(
                wallet.wallet_id,
                WalletTransaction::credit(
                    wallet.wallet_id,
                    amount,
                    TransactionType::Deposit,
                    None,
                    format!("Deposit {amount} {currency}"),
                    timestamp,
                ),
            )?;
        }
        tracing::info!(%user_id, currency, %amount, "deposit credited");
        Ok(Self::view(&wallet))
    }

    /// Faucet claim: a configured deposit, rate-limited per user
    pub fn claim_faucet(&self, user_id: UserId, timestamp: i64) -> Result<BalanceView, LedgerError> {
        if let Some(last) = self.faucet_claims.get(&user_id) {
            let elapsed = last.elapsed();
            let cooldown = self.config.faucet_cooldown();
            if elapsed < cooldown {
                return Err(LedgerError::FaucetCooldown {
                    user_id,
                    remaining_secs: (cooldown - elapsed).as_secs(),
                });
            }
        }

        let view = self.deposit(
            user_id,
            &self.config.faucet_currency,
            self.config.faucet_amount,
            timestamp,
        )?;
        self.faucet_claims.insert(user_id, Instant::now());
        tracing::info!(%user_id, amount = %self.config.faucet_amount, "faucet claimed");
        Ok(view)
    }

    /// Reserve funds for a pending order.
    ///
    /// Under the wallet lock: check `available >= amount`, append a
    /// RESERVE debit row, move the amount from available to reserved.
    pub fn reserve_funds(
        &self,
        user_id: UserId,
        currency: &str,
        amount: Amount,
        order_id: OrderId,
        timestamp: i64,
    ) -> Result<(WalletId, TransactionId), LedgerError> {
        let wallet = self.store.get(user_id, currency)?;
        let transaction_id = {
            let mut state = wallet.lock()?;
            state.balance.reserve(amount)?;
            let row = WalletTransaction::debit(
                wallet.wallet_id,
                amount,
                TransactionType::Reserve,
                Some(LedgerRef::Order(order_id)),
                format!("Reserve for order {order_id}"),
                timestamp,
            );
            let transaction_id = row.transaction_id;
            state.append_verified(wallet.wallet_id, row)?;
            transaction_id
        };
        tracing::info!(%user_id, currency, %amount, %order_id, "funds reserved");
        Ok((wallet.wallet_id, transaction_id))
    }

    /// Release reserved funds back to available (cancel / rejection /
    /// price improvement).
    pub fn release_funds(
        &self,
        user_id: UserId,
        currency: &str,
        amount: Amount,
        order_id: OrderId,
        timestamp: i64,
    ) -> Result<(), LedgerError> {
        let wallet = self.store.get(user_id, currency)?;
        {
            let mut state = wallet.lock()?;
            state.balance.release(amount)?;
            state.append_verified(
                wallet.wallet_id,
                WalletTransaction::credit(
                    wallet.wallet_id,
                    amount,
                    TransactionType::Release,
                    Some(LedgerRef::Order(order_id)),
                    format!("Release from order {order_id}"),
                    timestamp,
                ),
            )?;
        }
        tracing::info!(%user_id, currency, %amount, %order_id, "funds released");
        Ok(())
    }

    /// Settle a trade: four ledger legs across the two parties.
    ///
    /// Buyer pays `quote_amount` from reserved quote and receives
    /// `base_amount` into available base; seller mirrors. Each wallet is
    /// locked independently for exactly its own row + balance update;
    /// the four legs are not one cross-wallet transaction.
    #[allow(clippy::too_many_arguments)]
    pub fn settle_trade(
        &self,
        buyer_id: UserId,
        seller_id: UserId,
        base_currency: &str,
        quote_currency: &str,
        base_amount: Amount,
        quote_amount: Amount,
        trade_id: TradeId,
        timestamp: i64,
    ) -> Result<(), LedgerError> {
        // Buyer: quote out of reserved, base into available.
        self.settle_debit(buyer_id, quote_currency, quote_amount, trade_id, timestamp)?;
        self.settle_credit(buyer_id, base_currency, base_amount, trade_id, timestamp)?;

        // Seller: base out of reserved, quote into available.
        self.settle_debit(seller_id, base_currency, base_amount, trade_id, timestamp)?;
        self.settle_credit(seller_id, quote_currency, quote_amount, trade_id, timestamp)?;

        tracing::info!(%trade_id, %buyer_id, %seller_id, "trade settled");
        Ok(())
    }

    fn settle_debit(
        &self,
        user_id: UserId,
        currency: &str,
        amount: Amount,
        trade_id: TradeId,
        timestamp: i64,
    ) -> Result<(), LedgerError> {
        let wallet = self.store.get(user_id, currency)?;
        let mut state = wallet.lock()?;
        let from_available = state.balance.debit_reserved(amount)?;
        if !from_available.is_zero() {
            // Reservation already released by a racing cancel; the fill
            // wins against the funds sitting back in available.
            tracing::warn!(
                %user_id, currency, %trade_id, %from_available,
                "settlement debit drew on available after reservation release"
            );
        }
        state.append_verified(
            wallet.wallet_id,
            WalletTransaction::debit(
                wallet.wallet_id,
                amount,
                TransactionType::TradeDebit,
                Some(LedgerRef::Trade(trade_id)),
                format!("Trade debit {trade_id}"),
                timestamp,
            ),
        )
    }

    fn settle_credit(
        &self,
        user_id: UserId,
        currency: &str,
        amount: Amount,
        trade_id: TradeId,
        timestamp: i64,
    ) -> Result<(), LedgerError> {
        let wallet = self.store.get_or_create(user_id, currency);
        let mut state = wallet.lock()?;
        state.balance.credit_available(amount);
        state.append_verified(
            wallet.wallet_id,
            WalletTransaction::credit(
                wallet.wallet_id,
                amount,
                TransactionType::TradeCredit,
                Some(LedgerRef::Trade(trade_id)),
                format!("Trade credit {trade_id}"),
                timestamp,
            ),
        )
    }

    fn view(wallet: &Arc<Wallet>) -> BalanceView {
        let balance = wallet.balance();
        BalanceView {
            wallet_id: wallet.wallet_id,
            user_id: wallet.user_id,
            currency: wallet.currency.clone(),
            available: balance.available,
            reserved: balance.reserved,
        }
    }
}
