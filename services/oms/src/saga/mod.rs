//! Order saga: durable state machine driving the order lifecycle
//!
//! One saga per order coordinates reserve-funds → submit-to-matching →
//! settle-trade, compensating with release-funds on rejection or
//! cancellation.

pub mod context;
pub mod orchestrator;
pub mod recovery;
pub mod state;

pub use context::OrderSagaContext;
pub use orchestrator::SagaOrchestrator;
pub use recovery::{RecoverySweep, SagaRecovery};
pub use state::{SagaInstance, SagaState};
