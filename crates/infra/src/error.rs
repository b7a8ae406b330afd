//! Infrastructure error model shared by the stores and services.

use thiserror::Error;

use shopforge_core::DomainError;

/// Store-level error.
///
/// The stores translate backend outcomes (conditional updates, constraint
/// failures, connectivity) into this taxonomy; the services lift it into
/// [`ServiceError`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("not found")]
    NotFound,

    /// A conditional reserve matched nothing because availability was short.
    #[error("insufficient stock: {available} available")]
    InsufficientStock { available: i64 },

    /// A conditional update lost a race (caller may retry with fresh state).
    #[error("conflict: {0}")]
    Conflict(String),

    /// A persisted invariant would have been violated.
    #[error("invariant violated: {0}")]
    Invariant(String),

    #[error("storage backend failure: {0}")]
    Backend(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => Self::NotFound,
            other => Self::Backend(other.to_string()),
        }
    }
}

/// Service-level error: a typed business outcome or an infrastructure failure.
///
/// Business failures (availability, ownership, validation) are results, not
/// exceptions; the API layer maps them to status codes.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ServiceError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("storage failure: {0}")]
    Storage(String),

    #[error("payment gateway failure: {0}")]
    Payment(String),
}

impl ServiceError {
    pub fn as_domain(&self) -> Option<&DomainError> {
        match self {
            Self::Domain(err) => Some(err),
            _ => None,
        }
    }
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => Self::Domain(DomainError::NotFound),
            StoreError::InsufficientStock { available } => {
                Self::Domain(DomainError::InsufficientStock { available })
            }
            StoreError::Conflict(msg) => Self::Domain(DomainError::Conflict(msg)),
            StoreError::Invariant(msg) => Self::Domain(DomainError::InvariantViolation(msg)),
            StoreError::Backend(msg) => Self::Storage(msg),
        }
    }
}
