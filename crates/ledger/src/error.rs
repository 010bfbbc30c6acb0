//! Unified error handling for the ledger services.

use thiserror::Error;

use stockroom_core::CustomerOrderId;

use crate::db::RepositoryError;

/// Error type returned by every ledger operation.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Malformed input, rejected before any write.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A referenced variant, order or line does not exist.
    #[error("{entity} {id} not found")]
    NotFound {
        /// Kind of record, e.g. `purchase order`.
        entity: &'static str,
        /// The identifier that did not resolve.
        id: i32,
    },

    /// The variant's lots hold fewer units than requested.
    #[error("Insufficient stock for {variant}: {available} available, {requested} requested")]
    InsufficientStock {
        /// Human-readable variant label.
        variant: String,
        /// Units across all lots.
        available: i64,
        /// Units asked for.
        requested: i32,
    },

    /// The change contradicts recorded state.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The customer order is already cancelled.
    #[error("Customer order {0} is already voided")]
    AlreadyVoided(CustomerOrderId),

    /// Store operation failed; the transaction was rolled back.
    #[error("Store error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Coarse classification for callers that map errors onto responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    NotFound,
    InsufficientStock,
    Conflict,
    Store,
}

impl LedgerError {
    /// Shorthand for [`LedgerError::NotFound`].
    #[must_use]
    pub fn not_found(entity: &'static str, id: impl Into<i32>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// The kind of failure.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::NotFound { .. } | Self::Repository(RepositoryError::NotFound) => {
                ErrorKind::NotFound
            }
            Self::InsufficientStock { .. } => ErrorKind::InsufficientStock,
            Self::Conflict(_)
            | Self::AlreadyVoided(_)
            | Self::Repository(RepositoryError::Conflict(_)) => ErrorKind::Conflict,
            Self::Repository(_) => ErrorKind::Store,
        }
    }
}

#[cfg(test)]
mod tests {
    use stockroom_core::VariantId;

    use super::*;

    #[test]
    fn test_kinds() {
        assert_eq!(
            LedgerError::Validation("empty".to_string()).kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            LedgerError::not_found("variant", VariantId::new(4)).kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            LedgerError::AlreadyVoided(CustomerOrderId::new(1)).kind(),
            ErrorKind::Conflict
        );
        assert_eq!(
            LedgerError::from(RepositoryError::Conflict("dup".to_string())).kind(),
            ErrorKind::Conflict
        );
        assert_eq!(
            LedgerError::from(RepositoryError::DataCorruption("bad".to_string())).kind(),
            ErrorKind::Store
        );
    }

    #[test]
    fn test_insufficient_stock_message() {
        let err = LedgerError::InsufficientStock {
            variant: "Linen Shirt (Blue, M) - SKU: LS-01".to_string(),
            available: 2,
            requested: 5,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient stock for Linen Shirt (Blue, M) - SKU: LS-01: 2 available, 5 requested"
        );
    }
}
