//! Order book infrastructure
//!
//! Contains the resting-order value type, price levels, and the bid/ask
//! books, plus the per-symbol book that matches incoming orders.

pub mod ask_book;
pub mod bid_book;
pub mod price_level;

pub use ask_book::AskBook;
pub use bid_book::BidBook;
pub use price_level::PriceLevel;

use serde::{Deserialize, Serialize};
use types::ids::{OrderId, Symbol, UserId};
use types::messages::{BookLevel, OrderBookUpdateEvent};
use types::numeric::{Price, Quantity};
use types::order::{OrderType, Side};
use types::trade::Trade;

use crate::matching::{crossing, executor, MatchResult};

/// The matching engine's view of an order, resting or incoming
///
/// Immutable value: a partial fill produces a new `BookOrder` via
/// [`BookOrder::with_reduced_quantity`] instead of mutating in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookOrder {
    pub order_id: OrderId,
    pub user_id: UserId,
    pub symbol: Symbol,
    pub side: Side,
    pub order_type: OrderType,
    /// Limit price; absent for market orders
    pub price: Option<Price>,
    pub original_quantity: Quantity,
    pub remaining_quantity: Quantity,
    /// Arrival sequence, monotonic per book, used for FIFO tie-break
    pub sequence: u64,
}

impl BookOrder {
    /// Create an order not yet sequenced by a book
    pub fn new(
        order_id: OrderId,
        user_id: UserId,
        symbol: Symbol,
        side: Side,
        order_type: OrderType,
        price: Option<Price>,
        quantity: Quantity,
    ) -> Self {
        Self {
            order_id,
            user_id,
            symbol,
            side,
            order_type,
            price,
            original_quantity: quantity,
            remaining_quantity: quantity,
            sequence: 0,
        }
    }

    /// Copy with the book-assigned arrival sequence
    fn with_sequence(self, sequence: u64) -> Self {
        Self { sequence, ..self }
    }

    /// Copy with `fill` removed from the remaining quantity.
    ///
    /// Returns None when the fill consumes the order entirely.
    pub fn with_reduced_quantity(&self, fill: Quantity) -> Option<Self> {
        let remaining = self.remaining_quantity.checked_sub(fill)?;
        if remaining.is_zero() {
            return None;
        }
        Some(Self {
            remaining_quantity: remaining,
            ..self.clone()
        })
    }

    /// Check if nothing remains to fill
    pub fn is_exhausted(&self) -> bool {
        self.remaining_quantity.is_zero()
    }
}

/// Aggregated view of one price level for snapshots
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelSummary {
    pub price: Price,
    pub quantity: Quantity,
    pub order_count: usize,
}

/// Depth snapshot of one symbol's book, most aggressive levels first
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookSnapshot {
    pub symbol: Symbol,
    pub bids: Vec<LevelSummary>,
    pub asks: Vec<LevelSummary>,
    pub timestamp: i64,
}

impl BookSnapshot {
    /// Flatten into the cross-service book update contract
    pub fn to_update_event(&self) -> OrderBookUpdateEvent {
        let levels = |side: &[LevelSummary]| {
            side.iter()
                .map(|level| BookLevel {
                    price: level.price,
                    quantity: level.quantity,
                })
                .collect()
        };
        OrderBookUpdateEvent {
            symbol: self.symbol.clone(),
            bids: levels(&self.bids),
            asks: levels(&self.asks),
            timestamp: self.timestamp,
        }
    }
}

/// Order book for a single symbol
///
/// All mutating calls for one symbol must be serialized by the caller;
/// the engine wraps each book in its own exclusive section.
#[derive(Debug)]
pub struct OrderBook {
    symbol: Symbol,
    bids: BidBook,
    asks: AskBook,
    next_sequence: u64,
}

impl OrderBook {
    /// Create an empty book for a symbol
    pub fn new(symbol: Symbol) -> Self {
        Self {
            symbol,
            bids: BidBook::new(),
            asks: AskBook::new(),
            next_sequence: 0,
        }
    }

    fn next_sequence(&mut self) -> u64 {
        self.next_sequence += 1;
        self.next_sequence
    }

    /// Submit an incoming order: match against the opposite side, then
    /// rest any limit remainder on the book.
    ///
    /// A market order's unfilled remainder is dropped as unfillable, not
    /// rested. This is a modeled outcome, not an error.
    pub fn submit(&mut self, order: BookOrder, timestamp: i64) -> MatchResult {
        let order = order.with_sequence(self.next_sequence());

        let mut taker = order;
        let trades = match taker.side {
            Side::Buy => Self::match_against_asks(&mut self.asks, &mut taker, timestamp),
            Side::Sell => Self::match_against_bids(&mut self.bids, &mut taker, timestamp),
        };

        let mut rested = false;
        if !taker.is_exhausted() && taker.order_type == OrderType::Limit {
            // FIFO tail of its price level.
            match taker.side {
                Side::Buy => self.bids.insert(taker.clone()),
                Side::Sell => self.asks.insert(taker.clone()),
            }
            rested = true;
        }

        MatchResult::new(taker, trades, rested)
    }

    /// Match an incoming buy against the ask side, best price first
    fn match_against_asks(
        asks: &mut AskBook,
        taker: &mut BookOrder,
        timestamp: i64,
    ) -> Vec<Trade> {
        let mut trades = Vec::new();

        while !taker.is_exhausted() {
            let Some(best_price) = asks.best_price() else {
                break;
            };
            if !crossing::marketable(taker.side, taker.price, best_price) {
                break;
            }

            Self::fill_level(asks.level_mut(best_price), taker, best_price, timestamp, &mut trades);
            asks.prune_if_empty(best_price);
        }

        trades
    }

    /// Match an incoming sell against the bid side, best price first
    fn match_against_bids(
        bids: &mut BidBook,
        taker: &mut BookOrder,
        timestamp: i64,
    ) -> Vec<Trade> {
        let mut trades = Vec::new();

        while !taker.is_exhausted() {
            let Some(best_price) = bids.best_price() else {
                break;
            };
            if !crossing::marketable(taker.side, taker.price, best_price) {
                break;
            }

            Self::fill_level(bids.level_mut(best_price), taker, best_price, timestamp, &mut trades);
            bids.prune_if_empty(best_price);
        }

        trades
    }

    /// Drain one price level against the taker, FIFO, at the level price
    fn fill_level(
        level: Option<&mut PriceLevel>,
        taker: &mut BookOrder,
        level_price: Price,
        timestamp: i64,
        trades: &mut Vec<Trade>,
    ) {
        let Some(level) = level else {
            return;
        };

        while !taker.is_exhausted() {
            let Some(maker) = level.front() else {
                break;
            };

            let fill = taker.remaining_quantity.min(maker.remaining_quantity);
            // Execution price is always the maker's (resting) price.
            trades.push(executor::build_trade(taker, maker, level_price, fill, timestamp));

            taker.remaining_quantity = taker
                .remaining_quantity
                .checked_sub(fill)
                .unwrap_or_else(Quantity::zero);
            level.reduce_front(fill);
        }
    }

    /// Cancel a resting order by id: linear scan of the side's levels.
    ///
    /// Returns true if found and removed; empty price levels are pruned.
    pub fn cancel(&mut self, order_id: &OrderId, side: Side) -> bool {
        match side {
            Side::Buy => self.bids.remove_order(order_id).is_some(),
            Side::Sell => self.asks.remove_order(order_id).is_some(),
        }
    }

    /// Aggregated snapshot of the top `depth` levels per side
    pub fn snapshot(&self, depth: usize, timestamp: i64) -> BookSnapshot {
        BookSnapshot {
            symbol: self.symbol.clone(),
            bids: self.bids.depth_snapshot(depth),
            asks: self.asks.depth_snapshot(depth),
            timestamp,
        }
    }

    /// Best bid price, if any
    pub fn best_bid(&self) -> Option<Price> {
        self.bids.best_price()
    }

    /// Best ask price, if any
    pub fn best_ask(&self) -> Option<Price> {
        self.asks.best_price()
    }

    /// Number of bid price levels
    pub fn bid_depth(&self) -> usize {
        self.bids.level_count()
    }

    /// Number of ask price levels
    pub fn ask_depth(&self) -> usize {
        self.asks.level_count()
    }
}
