//! Saga states and the persisted saga instance

use serde::{Deserialize, Serialize};
use types::errors::SagaError;
use types::ids::{OrderId, SagaId};

use super::context::OrderSagaContext;

/// Saga state over the distributed order transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SagaState {
    /// Saga created, nothing emitted yet
    Started,
    /// Reserve-funds command sent, waiting for the wallet's answer
    AwaitingFunds,
    /// Wallet reserved the funds
    FundsReserved,
    /// Order submitted to the matching engine; stays here through
    /// partial fills until fully filled
    OrderSent,
    /// Compensation (release-funds) in progress
    Compensating,
    /// Compensation finished (terminal)
    Compensated,
    /// Order fully filled (terminal)
    Completed,
    /// Reservation rejected or retries exhausted (terminal)
    Failed,
}

impl SagaState {
    /// Check if no further transitions are possible
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SagaState::Completed | SagaState::Failed | SagaState::Compensated
        )
    }

    /// Legal forward transitions
    fn can_transition_to(&self, next: SagaState) -> bool {
        use SagaState::*;
        match self {
            Started => matches!(next, AwaitingFunds | Compensating | Failed),
            AwaitingFunds => matches!(next, FundsReserved | Compensating | Failed),
            FundsReserved => matches!(next, OrderSent | Compensating | Failed),
            OrderSent => matches!(next, Completed | Compensating | Failed),
            Compensating => matches!(next, Compensated | Failed),
            Completed | Failed | Compensated => false,
        }
    }
}

impl std::fmt::Display for SagaState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SagaState::Started => "STARTED",
            SagaState::AwaitingFunds => "AWAITING_FUNDS",
            SagaState::FundsReserved => "FUNDS_RESERVED",
            SagaState::OrderSent => "ORDER_SENT",
            SagaState::Compensating => "COMPENSATING",
            SagaState::Compensated => "COMPENSATED",
            SagaState::Completed => "COMPLETED",
            SagaState::Failed => "FAILED",
        };
        write!(f, "{s}")
    }
}

/// Persisted saga instance, 1:1 with an order
///
/// The context is typed but must survive serialization so the saga can be
/// re-driven from storage after a restart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SagaInstance {
    pub saga_id: SagaId,
    pub order_id: OrderId,
    pub state: SagaState,
    pub context: OrderSagaContext,
    pub retry_count: u32,
    pub max_retries: u32,
    pub error_message: Option<String>,
    pub last_processed_at: i64, // Unix nanos
    pub completed_at: Option<i64>,
    pub created_at: i64,
    pub version: u64,
}

impl SagaInstance {
    /// Create a new saga in STARTED
    pub fn new(context: OrderSagaContext, max_retries: u32, timestamp: i64) -> Self {
        Self {
            saga_id: SagaId::new(),
            order_id: context.order_id,
            state: SagaState::Started,
            context,
            retry_count: 0,
            max_retries,
            error_message: None,
            last_processed_at: timestamp,
            completed_at: None,
            created_at: timestamp,
            version: 0,
        }
    }

    /// Move to the next state, rejecting illegal transitions
    pub fn transition_to(&mut self, next: SagaState, timestamp: i64) -> Result<(), SagaError> {
        if !self.state.can_transition_to(next) {
            return Err(SagaError::IllegalTransition {
                from: self.state.to_string(),
                to: next.to_string(),
            });
        }
        self.state = next;
        self.touch(timestamp);
        if next.is_terminal() {
            self.completed_at = Some(timestamp);
        }
        Ok(())
    }

    /// Mark the saga completed
    pub fn complete(&mut self, timestamp: i64) -> Result<(), SagaError> {
        self.transition_to(SagaState::Completed, timestamp)
    }

    /// Mark the saga failed with an error message
    pub fn fail(&mut self, error: impl Into<String>, timestamp: i64) {
        self.state = SagaState::Failed;
        self.error_message = Some(error.into());
        self.completed_at = Some(timestamp);
        self.touch(timestamp);
    }

    /// Check if a re-drive attempt remains
    pub fn can_retry(&self) -> bool {
        self.retry_count < self.max_retries
    }

    /// Count a re-drive attempt
    pub fn increment_retry(&mut self, timestamp: i64) {
        self.retry_count += 1;
        self.touch(timestamp);
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Whether the saga has gone `staleness_nanos` without progress
    pub fn is_stale(&self, now: i64, staleness_nanos: i64) -> bool {
        !self.is_terminal() && now.saturating_sub(self.last_processed_at) > staleness_nanos
    }

    /// Serialized context payload, as it would be stored in a row
    pub fn payload(&self) -> Result<String, SagaError> {
        serde_json::to_string(&self.context).map_err(|e| SagaError::ContextCodec(e.to_string()))
    }

    fn touch(&mut self, timestamp: i64) {
        self.last_processed_at = timestamp;
        self.version += 1;
    }
}
