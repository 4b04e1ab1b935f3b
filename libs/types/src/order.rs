//! Order lifecycle types
//!
//! The order record is owned and mutated exclusively by the saga
//! orchestrator; everything else sees read-only copies.

use crate::errors::OrderError;
use crate::ids::{OrderId, Symbol, UserId};
use crate::numeric::{normalize, Amount, Price, Quantity};
use serde::{Deserialize, Serialize};

/// Order side (buyer or seller)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    /// Buy order (bid)
    Buy,
    /// Sell order (ask)
    Sell,
}

impl Side {
    /// Get the opposite side
    pub fn opposite(&self) -> Self {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

/// Order type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderType {
    /// Execute at the given price or better; remainder rests on the book
    Limit,
    /// Execute against whatever is resting; unfilled remainder is dropped
    Market,
}

/// Order status over the full lifecycle
///
/// Statuses only move forward: an order never returns to an earlier state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// Created, awaiting fund reservation
    PendingValidation,
    /// Wallet has reserved the required funds
    FundsReserved,
    /// Submitted to the matching engine
    Open,
    /// Some quantity matched, remainder still working
    PartiallyFilled,
    /// Completely matched (terminal)
    Filled,
    /// Cancelled by user or system (terminal)
    Cancelled,
    /// Rejected by validation or fund reservation (terminal)
    Rejected,
}

impl OrderStatus {
    /// Check if status is terminal (no further transitions possible)
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Filled | OrderStatus::Cancelled | OrderStatus::Rejected
        )
    }

    /// Statuses from which a user cancel is legal
    pub fn is_cancellable(&self) -> bool {
        matches!(
            self,
            OrderStatus::PendingValidation
                | OrderStatus::FundsReserved
                | OrderStatus::Open
                | OrderStatus::PartiallyFilled
        )
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            OrderStatus::PendingValidation => "PENDING_VALIDATION",
            OrderStatus::FundsReserved => "FUNDS_RESERVED",
            OrderStatus::Open => "OPEN",
            OrderStatus::PartiallyFilled => "PARTIALLY_FILLED",
            OrderStatus::Filled => "FILLED",
            OrderStatus::Cancelled => "CANCELLED",
            OrderStatus::Rejected => "REJECTED",
        };
        write!(f, "{s}")
    }
}

/// Persisted order record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub order_id: OrderId,
    pub user_id: UserId,
    pub symbol: Symbol,
    pub side: Side,
    pub order_type: OrderType,
    /// Limit price; absent for market orders
    pub price: Option<Price>,
    pub quantity: Quantity,
    pub filled_quantity: Quantity,
    /// Value-weighted average of all fills so far
    pub avg_fill_price: Option<Price>,
    pub status: OrderStatus,
    /// Amount earmarked in the wallet while the order is working
    pub reserved_amount: Option<Amount>,
    pub reserved_currency: Option<String>,
    /// Client-supplied idempotency token, unique when present
    pub client_order_id: Option<String>,
    pub reject_reason: Option<String>,
    pub created_at: i64, // Unix nanos
    pub updated_at: i64, // Unix nanos
    pub filled_at: Option<i64>,
    pub version: u64,
}

impl Order {
    /// Create a new order in PENDING_VALIDATION
    pub fn new(
        user_id: UserId,
        symbol: Symbol,
        side: Side,
        order_type: OrderType,
        price: Option<Price>,
        quantity: Quantity,
        client_order_id: Option<String>,
        timestamp: i64,
    ) -> Self {
        Self {
            order_id: OrderId::new(),
            user_id,
            symbol,
            side,
            order_type,
            price,
            quantity,
            filled_quantity: Quantity::zero(),
            avg_fill_price: None,
            status: OrderStatus::PendingValidation,
            reserved_amount: None,
            reserved_currency: None,
            client_order_id,
            reject_reason: None,
            created_at: timestamp,
            updated_at: timestamp,
            filled_at: None,
            version: 0,
        }
    }

    /// Quantity still unfilled
    pub fn remaining_quantity(&self) -> Quantity {
        self.quantity
            .checked_sub(self.filled_quantity)
            .unwrap_or_else(Quantity::zero)
    }

    /// Check if the order is completely filled
    pub fn is_fully_filled(&self) -> bool {
        self.filled_quantity >= self.quantity
    }

    /// Check if the order has any fills
    pub fn has_fills(&self) -> bool {
        !self.filled_quantity.is_zero()
    }

    /// Check if the order can still be cancelled by the user
    pub fn is_cancellable(&self) -> bool {
        self.status.is_cancellable()
    }

    /// Apply a fill, updating filled quantity, weighted-average price,
    /// and status.
    ///
    /// A fill arriving after the order was cancelled still updates the
    /// quantities (the fill wins for quantity already matched) but leaves
    /// the terminal status untouched.
    ///
    /// # Panics
    /// Panics if the fill would exceed the order quantity.
    pub fn apply_fill(&mut self, fill_quantity: Quantity, fill_price: Price, timestamp: i64) {
        let new_filled = self.filled_quantity + fill_quantity;
        assert!(
            new_filled <= self.quantity,
            "Fill would exceed order quantity"
        );

        // Weighted average: (old_value + fill_value) / new_filled
        self.avg_fill_price = match self.avg_fill_price {
            None => Some(fill_price),
            Some(avg) => {
                let old_value = avg.as_decimal() * self.filled_quantity.as_decimal();
                let fill_value = fill_price.as_decimal() * fill_quantity.as_decimal();
                Price::try_new(normalize(
                    (old_value + fill_value) / new_filled.as_decimal(),
                ))
            }
        };

        self.filled_quantity = new_filled;

        if !self.status.is_terminal() {
            if self.is_fully_filled() {
                self.status = OrderStatus::Filled;
                self.filled_at = Some(timestamp);
            } else {
                self.status = OrderStatus::PartiallyFilled;
            }
        }

        self.updated_at = timestamp;
        self.version += 1;
    }

    /// Cancel the order
    pub fn cancel(&mut self, reason: impl Into<String>, timestamp: i64) -> Result<(), OrderError> {
        if !self.is_cancellable() {
            return Err(OrderError::NotCancellable {
                order_id: self.order_id,
                status: self.status.to_string(),
            });
        }
        self.status = OrderStatus::Cancelled;
        self.reject_reason = Some(reason.into());
        self.updated_at = timestamp;
        self.version += 1;
        Ok(())
    }

    /// Reject the order (validation or reservation failure)
    pub fn reject(&mut self, reason: impl Into<String>, timestamp: i64) {
        self.status = OrderStatus::Rejected;
        self.reject_reason = Some(reason.into());
        self.updated_at = timestamp;
        self.version += 1;
    }

    /// Record the wallet reservation backing this order
    pub fn set_reservation(&mut self, currency: impl Into<String>, amount: Amount, timestamp: i64) {
        self.reserved_currency = Some(currency.into());
        self.reserved_amount = Some(amount);
        self.updated_at = timestamp;
        self.version += 1;
    }

    /// Advance status, used by the saga for forward transitions
    pub fn set_status(&mut self, status: OrderStatus, timestamp: i64) {
        self.status = status;
        self.updated_at = timestamp;
        self.version += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn limit_buy(qty: &str, price: u64) -> Order {
        Order::new(
            UserId::new(),
            Symbol::new("BTC/USDT"),
            Side::Buy,
            OrderType::Limit,
            Some(Price::from_u64(price)),
            Quantity::from_str(qty).unwrap(),
            None,
            1_708_123_456_789_000_000,
        )
    }

    #[test]
    fn test_side_opposite() {
        assert_eq!(Side::Buy.opposite(), Side::Sell);
        assert_eq!(Side::Sell.opposite(), Side::Buy);
    }

    #[test]
    fn test_new_order_is_pending() {
        let order = limit_buy("1.0", 50000);
        assert_eq!(order.status, OrderStatus::PendingValidation);
        assert!(!order.has_fills());
        assert_eq!(order.remaining_quantity(), order.quantity);
    }

    #[test]
    fn test_fill_transitions_partial_then_filled() {
        let mut order = limit_buy("1.0", 50000);

        order.apply_fill(
            Quantity::from_str("0.3").unwrap(),
            Price::from_u64(50000),
            1,
        );
        assert_eq!(order.status, OrderStatus::PartiallyFilled);
        assert!(order.has_fills());
        assert!(!order.is_fully_filled());

        order.apply_fill(
            Quantity::from_str("0.7").unwrap(),
            Price::from_u64(50000),
            2,
        );
        assert_eq!(order.status, OrderStatus::Filled);
        assert!(order.is_fully_filled());
        assert_eq!(order.filled_at, Some(2));
    }

    #[test]
    fn test_weighted_average_fill_price() {
        let mut order = limit_buy("1.0", 50000);

        order.apply_fill(
            Quantity::from_str("0.5").unwrap(),
            Price::from_u64(49000),
            1,
        );
        order.apply_fill(
            Quantity::from_str("0.5").unwrap(),
            Price::from_u64(50000),
            2,
        );

        // (49000*0.5 + 50000*0.5) / 1.0 = 49500
        assert_eq!(order.avg_fill_price, Some(Price::from_u64(49500)));
    }

    #[test]
    #[should_panic(expected = "Fill would exceed order quantity")]
    fn test_overfill_panics() {
        let mut order = limit_buy("1.0", 50000);
        order.apply_fill(
            Quantity::from_str("1.5").unwrap(),
            Price::from_u64(50000),
            1,
        );
    }

    #[test]
    fn test_cancel_keeps_filled_quantity() {
        let mut order = limit_buy("1.0", 50000);
        order.apply_fill(
            Quantity::from_str("0.4").unwrap(),
            Price::from_u64(50000),
            1,
        );

        order.cancel("user requested", 2).unwrap();
        assert_eq!(order.status, OrderStatus::Cancelled);
        assert_eq!(order.filled_quantity, Quantity::from_str("0.4").unwrap());
    }

    #[test]
    fn test_cancel_terminal_is_state_conflict() {
        let mut order = limit_buy("1.0", 50000);
        order.apply_fill(Quantity::from_str("1.0").unwrap(), Price::from_u64(50000), 1);

        let err = order.cancel("too late", 2).unwrap_err();
        assert!(matches!(err, OrderError::NotCancellable { .. }));
    }

    #[test]
    fn test_late_fill_after_cancel_keeps_cancelled_status() {
        let mut order = limit_buy("1.0", 50000);
        order.cancel("user requested", 1).unwrap();

        // A fill that raced the cancel still lands, but the order stays
        // CANCELLED.
        order.apply_fill(
            Quantity::from_str("0.2").unwrap(),
            Price::from_u64(50000),
            2,
        );
        assert_eq!(order.status, OrderStatus::Cancelled);
        assert_eq!(order.filled_quantity, Quantity::from_str("0.2").unwrap());
    }

    #[test]
    fn test_order_serialization_round_trip() {
        let order = limit_buy("2.5", 3000);
        let json = serde_json::to_string(&order).unwrap();
        let back: Order = serde_json::from_str(&json).unwrap();
        assert_eq!(order, back);
    }
}
