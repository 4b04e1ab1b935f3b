//! Matching logic
//!
//! Crossing predicates and trade construction, plus the result type
//! returned for every submitted order.

pub mod crossing;
pub mod executor;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use types::numeric::{normalize, Price, Quantity};
use types::order::OrderType;
use types::trade::Trade;

use crate::book::BookOrder;

/// Outcome of submitting one order to a book
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    /// Trades generated, in execution order
    pub trades: Vec<Trade>,
    /// The incoming order after matching (remaining quantity updated)
    pub remaining_order: BookOrder,
    /// Total quantity filled across all trades
    pub filled_quantity: Quantity,
    /// Whether the incoming order was completely filled
    pub fully_filled: bool,
    /// Value-weighted mean fill price; None when nothing filled
    pub avg_price: Option<Price>,
    /// Whether a limit remainder was added to the book
    pub rested: bool,
}

impl MatchResult {
    pub(crate) fn new(remaining_order: BookOrder, trades: Vec<Trade>, rested: bool) -> Self {
        let mut filled = Quantity::zero();
        let mut value = Decimal::ZERO;
        for trade in &trades {
            filled = filled + trade.quantity;
            value += trade.price.as_decimal() * trade.quantity.as_decimal();
        }

        let avg_price = if filled.is_zero() {
            None
        } else {
            Price::try_new(normalize(value / filled.as_decimal()))
        };

        Self {
            fully_filled: remaining_order.is_exhausted(),
            filled_quantity: filled,
            avg_price,
            rested,
            trades,
            remaining_order,
        }
    }

    /// Check whether any trade happened
    pub fn has_trades(&self) -> bool {
        !self.trades.is_empty()
    }

    /// Quantity neither filled nor rested (dropped market remainder)
    pub fn unfilled_quantity(&self) -> Quantity {
        if self.rested {
            Quantity::zero()
        } else {
            self.remaining_order.remaining_quantity
        }
    }

    /// True when a market order's remainder was dropped as unfillable
    pub fn market_remainder_dropped(&self) -> bool {
        self.remaining_order.order_type == OrderType::Market && !self.unfilled_quantity().is_zero()
    }
}
