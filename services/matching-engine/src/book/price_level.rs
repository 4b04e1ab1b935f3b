//! Price level implementation with FIFO queue
//!
//! A price level contains all resting orders at a specific price point,
//! in arrival order to enforce time priority. Orders are immutable
//! values; a partial fill replaces the front entry with a reduced copy,
//! so the level (not the order) is the unit of mutation.

use std::collections::VecDeque;
use types::numeric::Quantity;
use types::ids::OrderId;

use super::BookOrder;

/// A price level containing orders at a specific price
///
/// Maintains strict FIFO ordering for time-priority matching and caches
/// the total resting quantity.
#[derive(Debug, Clone, Default)]
pub struct PriceLevel {
    orders: VecDeque<BookOrder>,
    total_quantity: Quantity,
}

impl PriceLevel {
    /// Create a new empty price level
    pub fn new() -> Self {
        Self {
            orders: VecDeque::new(),
            total_quantity: Quantity::zero(),
        }
    }

    /// Append an order at the back of the queue (time priority)
    pub fn push_back(&mut self, order: BookOrder) {
        self.total_quantity = self.total_quantity + order.remaining_quantity;
        self.orders.push_back(order);
    }

    /// Remove an order from the queue by id
    ///
    /// Returns the removed order, or None if not found
    pub fn remove(&mut self, order_id: &OrderId) -> Option<BookOrder> {
        let position = self
            .orders
            .iter()
            .position(|entry| &entry.order_id == order_id)?;
        let entry = self.orders.remove(position)?;

        self.total_quantity = self
            .total_quantity
            .checked_sub(entry.remaining_quantity)
            .unwrap_or_else(Quantity::zero);

        Some(entry)
    }

    /// Peek at the front order without removing it
    pub fn front(&self) -> Option<&BookOrder> {
        self.orders.front()
    }

    /// Reduce the front order by a fill quantity.
    ///
    /// A fully filled front order is removed; a partial fill replaces it
    /// with a reduced copy at the front of the queue.
    pub fn reduce_front(&mut self, fill: Quantity) {
        let Some(front) = self.orders.pop_front() else {
            return;
        };

        self.total_quantity = self
            .total_quantity
            .checked_sub(fill)
            .unwrap_or_else(Quantity::zero);

        if let Some(reduced) = front.with_reduced_quantity(fill) {
            self.orders.push_front(reduced);
        }
    }

    /// Check if the price level is empty
    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    /// Get the total quantity at this price level
    pub fn total_quantity(&self) -> Quantity {
        self.total_quantity
    }

    /// Get the number of orders at this level
    pub fn order_count(&self) -> usize {
        self.orders.len()
    }
}
