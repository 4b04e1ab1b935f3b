//! End-to-end exchange harness
//!
//! Wires the order service, matching engine, and wallet ledger together
//! over the in-process bus exactly as a deployment would over a broker:
//! wallet commands and saga replies on their own queues, order traffic
//! partitioned by symbol, fills and book updates flowing back to the
//! order service and outward to subscribers.

pub mod harness;

pub use harness::ExchangeHarness;
