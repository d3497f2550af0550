use thiserror::Error;

use commerce_core::DomainError;

use crate::command_dispatcher::DispatchError;
use crate::projections::ProjectionError;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    /// Startup replay failed.
    #[error("projection rebuild failed: {0}")]
    Projection(#[from] ProjectionError),

    #[error("service lock poisoned")]
    LockPoisoned,
}

impl From<DomainError> for ServiceError {
    fn from(value: DomainError) -> Self {
        ServiceError::Dispatch(DispatchError::Domain(value))
    }
}

impl ServiceError {
    /// The business-rule failure behind this error, if that is what it is.
    pub fn domain_error(&self) -> Option<&DomainError> {
        match self {
            ServiceError::Dispatch(DispatchError::Domain(e)) => Some(e),
            _ => None,
        }
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;
