//! Bid (buy-side) order book
//!
//! Maintains buy orders sorted by price descending (best bid first).
//! Uses BTreeMap for deterministic iteration order; the best bid is the
//! last key.

use std::collections::BTreeMap;
use types::ids::OrderId;
use types::numeric::Price;

use super::price_level::PriceLevel;
use super::{BookOrder, LevelSummary};

/// Bid (buy) side of the book
///
/// At each price level, orders are maintained in FIFO order.
#[derive(Debug, Clone, Default)]
pub struct BidBook {
    /// Price levels; BTreeMap iterates ascending, so best bid is last
    levels: BTreeMap<Price, PriceLevel>,
}

impl BidBook {
    /// Create a new empty bid book
    pub fn new() -> Self {
        Self {
            levels: BTreeMap::new(),
        }
    }

    /// Insert an order at the FIFO tail of its price level
    pub fn insert(&mut self, order: BookOrder) {
        let Some(price) = order.price else {
            // Market orders never rest.
            return;
        };
        self.levels.entry(price).or_default().push_back(order);
    }

    /// Remove an order by id, scanning levels from the best bid down.
    ///
    /// Prunes the level if it becomes empty.
    pub fn remove_order(&mut self, order_id: &OrderId) -> Option<BookOrder> {
        let mut found: Option<(Price, BookOrder)> = None;
        for (price, level) in self.levels.iter_mut().rev() {
            if let Some(order) = level.remove(order_id) {
                found = Some((*price, order));
                break;
            }
        }
        let (price, order) = found?;
        self.prune_if_empty(price);
        Some(order)
    }

    /// Best (highest) bid price
    pub fn best_price(&self) -> Option<Price> {
        self.levels.keys().next_back().copied()
    }

    /// Mutable access to a price level
    pub(crate) fn level_mut(&mut self, price: Price) -> Option<&mut PriceLevel> {
        self.levels.get_mut(&price)
    }

    /// Drop a level that has no orders left
    pub(crate) fn prune_if_empty(&mut self, price: Price) {
        if self.levels.get(&price).is_some_and(PriceLevel::is_empty) {
            self.levels.remove(&price);
        }
    }

    /// Aggregated top `depth` levels, best bid first
    pub fn depth_snapshot(&self, depth: usize) -> Vec<LevelSummary> {
        self.levels
            .iter()
            .rev()
            .take(depth)
            .map(|(price, level)| LevelSummary {
                price: *price,
                quantity: level.total_quantity(),
                order_count: level.order_count(),
            })
            .collect()
    }

    /// Number of price levels
    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use types::ids::{Symbol, UserId};
    use types::numeric::Quantity;
    use types::order::{OrderType, Side};

    fn bid(price: u64, qty: &str) -> BookOrder {
        BookOrder::new(
            OrderId::new(),
            UserId::new(),
            Symbol::new("BTC/USDT"),
            Side::Buy,
            OrderType::Limit,
            Some(Price::from_u64(price)),
            Quantity::from_str(qty).unwrap(),
        )
    }

    #[test]
    fn test_best_price_is_highest() {
        let mut book = BidBook::new();
        book.insert(bid(50000, "1.0"));
        book.insert(bid(51000, "2.0"));
        book.insert(bid(49000, "1.5"));

        assert_eq!(book.best_price(), Some(Price::from_u64(51000)));
    }

    #[test]
    fn test_remove_order_prunes_level() {
        let mut book = BidBook::new();
        let order = bid(50000, "1.0");
        let order_id = order.order_id;
        book.insert(order);

        assert!(book.remove_order(&order_id).is_some());
        assert!(book.is_empty());
        assert!(book.remove_order(&order_id).is_none());
    }

    #[test]
    fn test_depth_snapshot_highest_first() {
        let mut book = BidBook::new();
        book.insert(bid(50000, "1.0"));
        book.insert(bid(51000, "2.0"));
        book.insert(bid(49000, "1.5"));
        book.insert(bid(52000, "0.5"));

        let depth = book.depth_snapshot(2);
        assert_eq!(depth.len(), 2);
        assert_eq!(depth[0].price, Price::from_u64(52000));
        assert_eq!(depth[1].price, Price::from_u64(51000));
    }

    #[test]
    fn test_same_price_shares_level() {
        let mut book = BidBook::new();
        book.insert(bid(50000, "1.0"));
        book.insert(bid(50000, "2.0"));

        assert_eq!(book.level_count(), 1);
        let depth = book.depth_snapshot(1);
        assert_eq!(depth[0].quantity, Quantity::from_str("3.0").unwrap());
        assert_eq!(depth[0].order_count, 2);
    }
}
