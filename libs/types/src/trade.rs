//! Trade execution types
//!
//! A trade is created once per fill by the matching engine and never
//! mutated afterwards.

use crate::ids::{OrderId, Symbol, TradeId, UserId};
use crate::numeric::{Amount, Price, Quantity};
use serde::{Deserialize, Serialize};

/// An executed fill between a maker and a taker order
///
/// The execution price is always the resting (maker) order's price. The
/// buy/sell fields are derived from which side the taker was on, so
/// settlement never has to re-derive direction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub trade_id: TradeId,
    pub symbol: Symbol,

    // Liquidity roles
    pub maker_order_id: OrderId,
    pub maker_user_id: UserId,
    pub taker_order_id: OrderId,
    pub taker_user_id: UserId,

    // Direction roles
    pub buy_order_id: OrderId,
    pub buy_user_id: UserId,
    pub sell_order_id: OrderId,
    pub sell_user_id: UserId,

    pub price: Price,
    pub quantity: Quantity,
    pub executed_at: i64, // Unix nanos
}

impl Trade {
    /// Trade value in quote currency (price × quantity)
    pub fn quote_value(&self) -> Amount {
        Amount::from_price_quantity(self.price, self.quantity)
    }
}
