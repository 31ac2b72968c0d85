use crate::services::ordering::OrderError;
use crate::services::store::StoreError;
use service_core::error::AppError;
use service_core::retry::Retryable;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Authentication required: {0}")]
    Authentication(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("Referential integrity error: {0}")]
    ReferentialIntegrity(String),

    #[error("Concurrent modification, please retry")]
    ConcurrencyConflict,

    /// The caller's view of the ordering is out of date. Retrying with the
    /// same indices cannot succeed, so this is never retried.
    #[error("Stale index: {0}")]
    StaleIndex(String),

    #[error("Entity store unavailable")]
    StoreUnavailable(#[source] anyhow::Error),

    #[error("User already exists")]
    UserAlreadyExists,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl Retryable for ServiceError {
    fn is_retryable(&self) -> bool {
        matches!(
            self,
            ServiceError::ConcurrencyConflict | ServiceError::StoreUnavailable(_)
        )
    }
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => ServiceError::NotFound(what),
            StoreError::Conflict => ServiceError::ConcurrencyConflict,
            StoreError::Duplicate(what) => {
                ServiceError::Internal(anyhow::anyhow!("Unexpected duplicate {}", what))
            }
            StoreError::Unavailable(e) => {
                tracing::error!(error = %e, "Entity store failure");
                ServiceError::StoreUnavailable(e)
            }
        }
    }
}

impl From<OrderError> for ServiceError {
    fn from(err: OrderError) -> Self {
        match err {
            OrderError::IndexOutOfRange { .. } => ServiceError::Validation(err.to_string()),
            OrderError::StaleIndex { .. } => ServiceError::StaleIndex(err.to_string()),
            OrderError::NotAChild { .. }
            | OrderError::AlreadyPresent { .. }
            | OrderError::DanglingChild { .. } => ServiceError::ReferentialIntegrity(err.to_string()),
        }
    }
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Validation(msg) => AppError::BadRequest(anyhow::anyhow!(msg)),
            ServiceError::Authentication(msg) => AppError::Unauthorized(anyhow::anyhow!(msg)),
            ServiceError::InvalidCredentials => {
                AppError::Unauthorized(anyhow::anyhow!("Invalid credentials"))
            }
            ServiceError::PermissionDenied(msg) => AppError::Forbidden(anyhow::anyhow!(msg)),
            ServiceError::NotFound(what) => AppError::NotFound(anyhow::anyhow!("{} not found", what)),
            ServiceError::ReferentialIntegrity(msg) => AppError::BadRequest(anyhow::anyhow!(msg)),
            ServiceError::ConcurrencyConflict => AppError::Conflict(anyhow::anyhow!(
                "Concurrent modification, please retry"
            )),
            ServiceError::StaleIndex(msg) => AppError::Conflict(anyhow::anyhow!(msg)),
            ServiceError::UserAlreadyExists => {
                AppError::Conflict(anyhow::anyhow!("User already exists"))
            }
            ServiceError::StoreUnavailable(_) => AppError::ServiceUnavailable,
            ServiceError::Internal(e) => AppError::InternalError(e),
        }
    }
}
