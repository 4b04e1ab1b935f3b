//! Ask (sell-side) order book
//!
//! Maintains sell orders sorted by price ascending (best ask first);
//! the BTreeMap's natural order already puts the best ask first.

use std::collections::BTreeMap;
use types::ids::OrderId;
use types::numeric::Price;

use super::price_level::PriceLevel;
use super::{BookOrder, LevelSummary};

/// Ask (sell) side of the book
#[derive(Debug, Clone, Default)]
pub struct AskBook {
    /// Price levels; BTreeMap iterates ascending, so best ask is first
    levels: BTreeMap<Price, PriceLevel>,
}

impl AskBook {
    /// Create a new empty ask book
    pub fn new() -> Self {
        Self {
            levels: BTreeMap::new(),
        }
    }

    /// Insert an order at the FIFO tail of its price level
    pub fn insert(&mut self, order: BookOrder) {
        let Some(price) = order.price else {
            return;
        };
        self.levels.entry(price).or_default().push_back(order);
    }

    /// Remove an order by id, scanning levels from the best ask up.
    ///
    /// Prunes the level if it becomes empty.
    pub fn remove_order(&mut self, order_id: &OrderId) -> Option<BookOrder> {
        let mut found: Option<(Price, BookOrder)> = None;
        for (price, level) in self.levels.iter_mut() {
            if let Some(order) = level.remove(order_id) {
                found = Some((*price, order));
                break;
            }
        }
        let (price, order) = found?;
        self.prune_if_empty(price);
        Some(order)
    }

    /// Best (lowest) ask price
    pub fn best_price(&self) -> Option<Price> {
        self.levels.keys().next().copied()
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

    /// Aggregated top `depth` levels, best ask first
    pub fn depth_snapshot(&self, depth: usize) -> Vec<LevelSummary> {
        self.levels
            .iter()
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

    fn ask(price: u64, qty: &str) -> BookOrder {
        BookOrder::new(
            OrderId::new(),
            UserId::new(),
            Symbol::new("BTC/USDT"),
            Side::Sell,
            OrderType::Limit,
            Some(Price::from_u64(price)),
            Quantity::from_str(qty).unwrap(),
        )
    }

    #[test]
    fn test_best_price_is_lowest() {
        let mut book = AskBook::new();
        book.insert(ask(50000, "1.0"));
        book.insert(ask(49000, "2.0"));
        book.insert(ask(51000, "1.5"));

        assert_eq!(book.best_price(), Some(Price::from_u64(49000)));
    }

    #[test]
    fn test_depth_snapshot_lowest_first() {
        let mut book = AskBook::new();
        book.insert(ask(50000, "1.0"));
        book.insert(ask(49000, "2.0"));
        book.insert(ask(51000, "1.5"));

        let depth = book.depth_snapshot(2);
        assert_eq!(depth.len(), 2);
        assert_eq!(depth[0].price, Price::from_u64(49000));
        assert_eq!(depth[1].price, Price::from_u64(50000));
    }

    #[test]
    fn test_remove_order() {
        let mut book = AskBook::new();
        let order = ask(50000, "1.0");
        let order_id = order.order_id;
        book.insert(order);
        book.insert(ask(50000, "2.0"));

        let removed = book.remove_order(&order_id).unwrap();
        assert_eq!(
            removed.remaining_quantity,
            Quantity::from_str("1.0").unwrap()
        );
        assert_eq!(book.level_count(), 1);
    }
}
