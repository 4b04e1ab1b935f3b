//! Service-level error type

use bus::BusError;
use thiserror::Error;
use types::errors::{OrderError, SagaError};

/// Central error type for the order service
#[derive(Error, Debug)]
pub enum OmsError {
    #[error(transparent)]
    Order(#[from] OrderError),

    #[error(transparent)]
    Saga(#[from] SagaError),

    #[error(transparent)]
    Bus(#[from] BusError),
}
