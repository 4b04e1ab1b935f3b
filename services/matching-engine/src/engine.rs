//! Matching engine core
//!
//! Owns one order book per symbol. Each book sits behind its own mutex so
//! all mutations for a symbol are serialized (one logical writer) while
//! different symbols proceed in full parallel.

use dashmap::DashMap;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use types::ids::{OrderId, Symbol};
use types::messages::OrderBookUpdateEvent;
use types::numeric::Price;
use types::order::Side;

use crate::book::{BookOrder, BookSnapshot, OrderBook};
use crate::matching::MatchResult;

/// Best-of-book statistics for one symbol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookStats {
    pub symbol: Symbol,
    pub best_bid: Option<Price>,
    pub best_ask: Option<Price>,
    pub spread: Option<Decimal>,
    pub bid_depth: usize,
    pub ask_depth: usize,
}

/// Matching engine managing one book per symbol
#[derive(Default)]
pub struct MatchingEngine {
    books: DashMap<Symbol, Mutex<OrderBook>>,
}

impl MatchingEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Submit an order: match it against its symbol's book.
    ///
    /// Serialized per symbol by the book mutex; never blocks on I/O.
    pub fn submit(&self, order: BookOrder, timestamp: i64) -> MatchResult {
        let symbol = order.symbol.clone();
        if !self.books.contains_key(&symbol) {
            self.books
                .entry(symbol.clone())
                .or_insert_with(|| Mutex::new(OrderBook::new(symbol.clone())));
        }
        // Holds only the shard read lock while the per-book mutex
        // serializes writers for this symbol.
        let book = self.books.get(&symbol).expect("book just inserted");
        let mut book = book.lock().expect("order book lock");
        book.submit(order, timestamp)
    }

    /// Cancel a resting order; true if it was found on the book
    pub fn cancel(&self, symbol: &Symbol, order_id: &OrderId, side: Side) -> bool {
        match self.books.get(symbol) {
            Some(book) => book.lock().expect("order book lock").cancel(order_id, side),
            None => false,
        }
    }

    /// Aggregated depth snapshot for a symbol
    pub fn snapshot(&self, symbol: &Symbol, depth: usize, timestamp: i64) -> Option<BookSnapshot> {
        self.books
            .get(symbol)
            .map(|book| book.lock().expect("order book lock").snapshot(depth, timestamp))
    }

    /// Book update event for broadcast, top `depth` levels
    pub fn book_update(
        &self,
        symbol: &Symbol,
        depth: usize,
        timestamp: i64,
    ) -> Option<OrderBookUpdateEvent> {
        self.snapshot(symbol, depth, timestamp)
            .map(|snapshot| snapshot.to_update_event())
    }

    /// Best bid/ask, spread, and per-side depth counts
    pub fn stats(&self, symbol: &Symbol) -> Option<BookStats> {
        self.books.get(symbol).map(|book| {
            let book = book.lock().expect("order book lock");
            let best_bid = book.best_bid();
            let best_ask = book.best_ask();
            let spread = match (best_bid, best_ask) {
                (Some(bid), Some(ask)) => Some(ask.as_decimal() - bid.as_decimal()),
                _ => None,
            };
            BookStats {
                symbol: symbol.clone(),
                best_bid,
                best_ask,
                spread,
                bid_depth: book.bid_depth(),
                ask_depth: book.ask_depth(),
            }
        })
    }

    /// Best ask for a symbol, used to size market-buy reservations
    pub fn best_ask(&self, symbol: &Symbol) -> Option<Price> {
        self.books
            .get(symbol)
            .and_then(|book| book.lock().expect("order book lock").best_ask())
    }

    /// Symbols with live books
    pub fn active_symbols(&self) -> Vec<Symbol> {
        self.books.iter().map(|entry| entry.key().clone()).collect()
    }
}
