//! Matching engine service
//!
//! Maintains one in-memory order book per trading symbol and matches
//! incoming orders against resting liquidity by price-time priority.
//! Matching is pure and CPU-bound: no persistence, no I/O, one logical
//! writer per symbol.

pub mod book;
pub mod engine;
pub mod matching;

pub use book::{BookOrder, OrderBook};
pub use engine::{BookStats, MatchingEngine};
pub use matching::MatchResult;
