//! Order management service
//!
//! Owns the order aggregate and drives each order through the
//! reserve-funds → submit-to-matching → settle-trade saga, with
//! compensation (release-funds) on rejection and cancellation. The saga
//! is a durable state machine: every transition is persisted before its
//! triggering side effect is emitted, so a crash at any step is
//! recoverable by re-drive.

pub mod config;
pub mod error;
pub mod messaging;
pub mod saga;
pub mod service;
pub mod store;

pub use config::OmsConfig;
pub use error::OmsError;
pub use messaging::OmsEventHandlers;
pub use saga::{OrderSagaContext, SagaInstance, SagaOrchestrator, SagaRecovery, SagaState};
pub use service::{OrderService, PlaceOrderRequest, QuoteSource};
pub use store::{OrderStore, SagaStore};
