//! Stale-saga recovery
//!
//! A saga stuck in a non-terminal state past the staleness threshold is
//! re-driven: the command its state implies is re-emitted, relying on
//! receiver-side idempotency to absorb the duplicate if the original was
//! in fact delivered. A saga that exhausts its retry budget is failed
//! and left for operator intervention.

use std::sync::Arc;
use types::clock;

use crate::config::OmsConfig;
use crate::saga::{SagaOrchestrator, SagaState};
use crate::store::SagaStore;

/// Result of one recovery sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecoverySweep {
    /// Sagas whose last command was re-emitted
    pub re_driven: usize,
    /// Sagas failed for exhausting their retries
    pub failed: usize,
    /// Stale sagas whose state needs no re-drive (resting orders)
    pub skipped: usize,
}

/// Periodic recovery pass over stale sagas
pub struct SagaRecovery {
    sagas: Arc<SagaStore>,
    orchestrator: Arc<SagaOrchestrator>,
    config: OmsConfig,
}

impl SagaRecovery {
    pub fn new(
        sagas: Arc<SagaStore>,
        orchestrator: Arc<SagaOrchestrator>,
        config: OmsConfig,
    ) -> Self {
        Self {
            sagas,
            orchestrator,
            config,
        }
    }

    /// Sweep once: re-drive or fail every stale saga
    pub async fn run_once(&self) -> RecoverySweep {
        let now = clock::now_nanos();
        let staleness = self.config.staleness_nanos();
        let mut sweep = RecoverySweep::default();

        for saga in self.sagas.non_terminal() {
            if !saga.is_stale(now, staleness) {
                continue;
            }
            // An ORDER_SENT saga is a resting order: waiting is its
            // normal condition, not a stall.
            if saga.state == SagaState::OrderSent {
                sweep.skipped += 1;
                continue;
            }

            if !saga.can_retry() {
                let mut saga = saga;
                saga.fail(
                    format!("retries exhausted after {} attempts", saga.retry_count),
                    now,
                );
                tracing::error!(
                    saga_id = %saga.saga_id,
                    order_id = %saga.order_id,
                    "stale saga failed, operator intervention required"
                );
                self.sagas.save(saga);
                sweep.failed += 1;
                continue;
            }

            let mut counted = saga.clone();
            counted.increment_retry(now);
            self.sagas.save(counted);

            match self.orchestrator.redrive(saga.saga_id).await {
                Ok(true) => {
                    tracing::warn!(
                        saga_id = %saga.saga_id,
                        state = %saga.state,
                        retry = saga.retry_count + 1,
                        "stale saga re-driven"
                    );
                    sweep.re_driven += 1;
                }
                Ok(false) => sweep.skipped += 1,
                Err(e) => {
                    tracing::error!(saga_id = %saga.saga_id, error = %e, "re-drive failed");
                }
            }
        }

        sweep
    }
}
