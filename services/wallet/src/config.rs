//! Wallet service configuration

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;
use types::numeric::Amount;

/// Tunables for the wallet service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletConfig {
    /// Amount credited per faucet claim
    pub faucet_amount: Amount,
    /// Currency the faucet pays out
    pub faucet_currency: String,
    /// Seconds a user must wait between faucet claims
    pub faucet_cooldown_secs: u64,
}

impl WalletConfig {
    pub fn faucet_cooldown(&self) -> Duration {
        Duration::from_secs(self.faucet_cooldown_secs)
    }
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            faucet_amount: Amount::from_str("10000").expect("static amount"),
            faucet_currency: "USDT".to_string(),
            faucet_cooldown_secs: 24 * 60 * 60,
        }
    }
}
