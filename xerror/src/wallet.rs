use err_derive::Error;
use serde::{Deserialize, Serialize};

/// User-facing failure kinds. Every ledger-mutating path rolls back and
/// surfaces exactly one of these; each produces a single chat notification.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
pub enum WalletError {
    /// Carries the missing amount in millisatoshi.
    #[error(display = "Insufficient balance. Needs {} msat more.", _0)]
    InsufficientBalance(i64),
    #[error(display = "Payment already in course.")]
    DuplicatePayment,
    #[error(display = "No amount provided.")]
    AmountMissing,
    #[error(display = "Can't pay yourself.")]
    SelfPayment,
    #[error(display = "Failed to decode invoice: {}.", _0)]
    InvoiceDecodeFailed(String),
    #[error(display = "The Lightning node is unreachable. Try again later.")]
    NodeUnavailable,
    /// Carries the payment hash whose pending row was cancelled.
    #[error(display = "Payment failed. /log{}", _0)]
    RoutingFailure(String),
    #[error(display = "Inconsistent wallet state. Please report.")]
    InternalConsistency,
    #[error(display = "{} error: {}", _0, _1)]
    ExternalServiceError(String, String),
    #[error(display = "Database error.")]
    Database,
}

/// Duplicate keys on insert mean the payment hash is already in the
/// ledger; everything else from the database is opaque to users.
impl From<diesel::result::Error> for WalletError {
    fn from(err: diesel::result::Error) -> Self {
        match err {
            diesel::result::Error::DatabaseError(
                diesel::result::DatabaseErrorKind::UniqueViolation,
                _,
            ) => WalletError::DuplicatePayment,
            _ => WalletError::Database,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deficit_is_part_of_the_message() {
        let err = WalletError::InsufficientBalance(2500);
        assert!(err.to_string().contains("2500"));
    }

    #[test]
    fn round_trips_through_serde() {
        let err = WalletError::RoutingFailure("ab12cd".to_string());
        let json = serde_json::to_string(&err).unwrap();
        assert_eq!(serde_json::from_str::<WalletError>(&json).unwrap(), err);
    }
}
