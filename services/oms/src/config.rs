//! Order service configuration

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tunables for the order service and saga orchestrator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OmsConfig {
    /// Re-drive attempts before a stuck saga is failed
    pub max_retries: u32,
    /// Seconds without progress before a non-terminal saga is stale
    pub staleness_secs: u64,
    /// Buffer applied on top of the best ask when sizing market-buy
    /// reservations (0.05 = 5%)
    pub market_buy_slippage: Decimal,
    /// Levels per side included in book update broadcasts
    pub book_update_depth: usize,
}

impl OmsConfig {
    pub fn staleness(&self) -> Duration {
        Duration::from_secs(self.staleness_secs)
    }

    /// Staleness threshold in nanoseconds, for timestamp comparison
    pub fn staleness_nanos(&self) -> i64 {
        (self.staleness_secs as i64).saturating_mul(1_000_000_000)
    }
}

impl Default for OmsConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            staleness_secs: 60,
            market_buy_slippage: Decimal::new(5, 2), // 5%
            book_update_depth: 20,
        }
    }
}
