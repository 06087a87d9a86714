//! Unified error type for the points ledger.
//!
//! Every engine failure is reported synchronously to the immediate caller.
//! Storage failures are classified so callers can tell a retryable
//! [`Error::Transient`] apart from a hard [`Error::Database`] failure.

use rust_decimal::Decimal;
use sea_orm::{ConnAcquireErr, DbErr, SqlErr};
use thiserror::Error;

/// All errors surfaced by the ledger engine and its collaborators.
#[derive(Debug, Error)]
pub enum Error {
    /// A money or points value that must be positive (or a whole number of paise) was not
    #[error("Invalid amount: {amount}")]
    InvalidAmount {
        /// The rejected value
        amount: Decimal,
    },

    /// Purchase bill below the minimum qualifying amount
    #[error("Bill amount {amount} is below the minimum of {minimum}")]
    BelowMinimumAmount {
        /// The rejected bill amount
        amount: Decimal,
        /// Configured minimum
        minimum: Decimal,
    },

    /// Bill amount above the accepted maximum
    #[error("Bill amount {amount} exceeds the maximum of {maximum}")]
    AmountOutOfRange {
        /// The rejected bill amount
        amount: Decimal,
        /// Configured maximum
        maximum: Decimal,
    },

    /// Redemption request exceeds the available balance
    #[error("Insufficient points: available {available}, requested {requested}")]
    InsufficientPoints {
        /// Spendable balance at the time of the check
        available: i64,
        /// Points the caller asked to redeem
        requested: i64,
    },

    /// A referenced record does not exist
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Kind of record ("customer", "transaction", ...)
        entity: &'static str,
        /// Identifier that failed to resolve
        id: String,
    },

    /// Customer exists but has been deactivated
    #[error("Customer {code} is inactive")]
    CustomerInactive {
        /// Sequential code of the customer
        code: String,
    },

    /// A unique identifier is already in use
    #[error("Conflict: {field} already registered")]
    Conflict {
        /// Name of the conflicting field
        field: String,
    },

    /// Input failed a shape check
    #[error("Invalid input: {message}")]
    InvalidInput {
        /// What was wrong
        message: String,
    },

    /// Storage unavailable or the operation timed out; nothing was written
    #[error("Transient storage error: {message}")]
    Transient {
        /// Underlying cause
        message: String,
    },

    /// Non-retryable storage failure
    #[error("Database error: {0}")]
    Database(DbErr),

    /// Configuration could not be loaded or is inconsistent
    #[error("Configuration error: {message}")]
    Config {
        /// What was wrong
        message: String,
    },

    /// I/O failure outside the database, such as reading the config file
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether the caller may safely retry the failed operation.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }

    pub(crate) fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

impl From<DbErr> for Error {
    fn from(err: DbErr) -> Self {
        if let Some(SqlErr::UniqueConstraintViolation(detail)) = err.sql_err() {
            return Self::Conflict { field: detail };
        }

        match &err {
            DbErr::ConnectionAcquire(ConnAcquireErr::Timeout | ConnAcquireErr::ConnectionClosed) => {
                Self::Transient {
                    message: err.to_string(),
                }
            }
            _ if err.to_string().contains("database is locked") => Self::Transient {
                message: err.to_string(),
            },
            _ => Self::Database(err),
        }
    }
}

impl From<tokio::time::error::Elapsed> for Error {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        Self::Transient {
            message: "operation timed out".to_string(),
        }
    }
}

/// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acquire_timeout_is_transient() {
        let err = Error::from(DbErr::ConnectionAcquire(ConnAcquireErr::Timeout));
        assert!(err.is_transient());
    }

    #[test]
    fn test_other_db_errors_are_not_transient() {
        let err = Error::from(DbErr::Custom("boom".to_string()));
        assert!(matches!(err, Error::Database(_)));
        assert!(!err.is_transient());
    }

    #[test]
    fn test_insufficient_points_message() {
        let err = Error::InsufficientPoints {
            available: 300,
            requested: 5000,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient points: available 300, requested 5000"
        );
    }
}
