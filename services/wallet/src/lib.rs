//! Wallet ledger service
//!
//! Owns all money-moving invariants: per-user per-currency balance pairs
//! (available, reserved) backed by an immutable, append-only transaction
//! log. The log is the source of truth; the balance row is a cached
//! projection verified against the running ledger sum on every mutation.

pub mod config;
pub mod handler;
pub mod ledger;
pub mod service;
pub mod store;

pub use config::WalletConfig;
pub use handler::WalletCommandHandler;
pub use ledger::{LedgerRef, WalletTransaction};
pub use service::{BalanceView, WalletService};
pub use store::WalletStore;
