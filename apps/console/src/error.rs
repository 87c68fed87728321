//! # Console Error Type
//!
//! Unified error type for every service call.
//!
//! ## Error Handling Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Flow in the Console                            │
//! │                                                                         │
//! │  Service call                                                           │
//! │  Result<T, ClinicError>                                                 │
//! │         │                                                               │
//! │         ├── Domain error (AuthError, DispenseError, ...) ── #[from] ──┐ │
//! │         │                                                             │ │
//! │         ├── DbError, constraint failed ──► IntegrityViolation ────────┤ │
//! │         │                                                             │ │
//! │         ├── DbError, anything else ──────► Database ──────────────────┤ │
//! │         │                                                             ▼ │
//! │         │                                          menu prints          │
//! │         │                                          "[CODE] message"     │
//! │         ▼                                                               │
//! │  Success                                                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every variant is recoverable; the menu loop reports it and carries on.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

use clinic_core::{
    AuthError, AuthzError, DispenseError, InventoryError, RegistrationError, ValidationError,
};
use clinic_db::DbError;

/// Result type for service operations.
pub type ClinicResult<T> = Result<T, ClinicError>;

/// Error returned from every console service.
#[derive(Debug, Error)]
pub enum ClinicError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Registration(#[from] RegistrationError),

    #[error(transparent)]
    Authz(#[from] AuthzError),

    #[error(transparent)]
    Dispense(#[from] DispenseError),

    #[error(transparent)]
    Inventory(#[from] InventoryError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// A UNIQUE, FOREIGN KEY or CHECK constraint rejected a write.
    #[error("Integrity violation: {0}")]
    IntegrityViolation(DbError),

    #[error("Database error: {0}")]
    Database(DbError),

    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    #[error("Credential hashing failed: {0}")]
    Hashing(String),
}

impl ClinicError {
    pub fn not_found(entity: impl Into<String>, id: impl ToString) -> Self {
        ClinicError::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    /// Machine-readable code for display.
    pub fn code(&self) -> ErrorCode {
        match self {
            ClinicError::Auth(AuthError::InvalidCredentials) => ErrorCode::InvalidCredentials,
            ClinicError::Auth(AuthError::TooManyAttempts { .. }) => ErrorCode::TooManyAttempts,
            ClinicError::Registration(_) => ErrorCode::RegistrationRejected,
            ClinicError::Authz(_) => ErrorCode::Forbidden,
            ClinicError::Dispense(DispenseError::PrescriptionNotFound(_)) => ErrorCode::NotFound,
            ClinicError::Dispense(DispenseError::AlreadyDispensed(_)) => ErrorCode::AlreadyDispensed,
            ClinicError::Dispense(DispenseError::NoMedicationsLinked(_)) => ErrorCode::BusinessLogic,
            ClinicError::Dispense(DispenseError::InsufficientStock(_)) => {
                ErrorCode::InsufficientStock
            }
            ClinicError::Inventory(InventoryError::MedicationNotFound(_)) => ErrorCode::NotFound,
            ClinicError::Inventory(_) => ErrorCode::ValidationError,
            ClinicError::Validation(_) => ErrorCode::ValidationError,
            ClinicError::IntegrityViolation(_) => ErrorCode::IntegrityViolation,
            ClinicError::Database(_) => ErrorCode::DatabaseError,
            ClinicError::NotFound { .. } => ErrorCode::NotFound,
            ClinicError::Hashing(_) => ErrorCode::Internal,
        }
    }
}

/// Converts database errors, splitting constraint failures off.
impl From<DbError> for ClinicError {
    fn from(err: DbError) -> Self {
        if err.is_integrity_violation() {
            return ClinicError::IntegrityViolation(err);
        }

        match err {
            DbError::NotFound { entity, id } => ClinicError::NotFound { entity, id },
            other => {
                if let DbError::QueryFailed(e)
                | DbError::TransactionFailed(e)
                | DbError::Internal(e) = &other
                {
                    tracing::error!("Database operation failed: {}", e);
                }
                ClinicError::Database(other)
            }
        }
    }
}

/// Error codes shown next to each failure message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    InvalidCredentials,
    TooManyAttempts,
    RegistrationRejected,
    Forbidden,
    NotFound,
    AlreadyDispensed,
    InsufficientStock,
    BusinessLogic,
    ValidationError,
    IntegrityViolation,
    DatabaseError,
    Internal,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let code = match self {
            ErrorCode::InvalidCredentials => "INVALID_CREDENTIALS",
            ErrorCode::TooManyAttempts => "TOO_MANY_ATTEMPTS",
            ErrorCode::RegistrationRejected => "REGISTRATION_REJECTED",
            ErrorCode::Forbidden => "FORBIDDEN",
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::AlreadyDispensed => "ALREADY_DISPENSED",
            ErrorCode::InsufficientStock => "INSUFFICIENT_STOCK",
            ErrorCode::BusinessLogic => "BUSINESS_LOGIC",
            ErrorCode::ValidationError => "VALIDATION_ERROR",
            ErrorCode::IntegrityViolation => "INTEGRITY_VIOLATION",
            ErrorCode::DatabaseError => "DATABASE_ERROR",
            ErrorCode::Internal => "INTERNAL",
        };
        f.write_str(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constraint_failures_become_integrity_violations() {
        let unique: ClinicError = DbError::duplicate("Contains.medication_name", "x").into();
        assert!(matches!(unique, ClinicError::IntegrityViolation(_)));
        assert_eq!(unique.code(), ErrorCode::IntegrityViolation);

        let fk: ClinicError = DbError::ForeignKeyViolation {
            message: "FOREIGN KEY constraint failed".into(),
        }
        .into();
        assert!(matches!(fk, ClinicError::IntegrityViolation(_)));

        let pool: ClinicError = DbError::PoolExhausted.into();
        assert_eq!(pool.code(), ErrorCode::DatabaseError);
    }

    #[test]
    fn test_domain_codes() {
        let err: ClinicError = DispenseError::AlreadyDispensed(4).into();
        assert_eq!(err.code(), ErrorCode::AlreadyDispensed);
        assert_eq!(err.to_string(), "Prescription #4 has already been dispensed");

        let err: ClinicError = AuthzError::NotDispenser.into();
        assert_eq!(err.code().to_string(), "FORBIDDEN");
    }
}
