//! # Validation Module
//!
//! Input validation run before any store access.
//!
//! ## Validation Layers
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Console prompt                                               │
//! │  └── Trimming, numeric parsing                                         │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE                                                  │
//! │  └── Required fields, lengths, restock quantities, date formats        │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── UNIQUE constraints (username, dispense record, composition)       │
//! │  ├── CHECK constraints (stock >= 0, role/link agreement)               │
//! │  └── Foreign key constraints                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::NaiveDateTime;

use crate::error::{InventoryError, ValidationError};
use crate::{APPOINTMENT_TIME_FORMAT, MAX_DOSAGE_LEN, MAX_NAME_LEN, MAX_USERNAME_LEN};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

fn required_bounded(field: &str, value: &str, max: usize) -> ValidationResult<()> {
    let value = value.trim();

    if value.is_empty() {
        return Err(ValidationError::required(field));
    }

    if value.chars().count() > max {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        });
    }

    Ok(())
}

/// Validates a username.
///
/// ## Rules
/// - Must not be empty
/// - At most 64 characters
/// - No whitespace (lookup is an exact match)
pub fn validate_username(username: &str) -> ValidationResult<()> {
    required_bounded("username", username, MAX_USERNAME_LEN)?;

    if username.chars().any(char::is_whitespace) {
        return Err(ValidationError::InvalidFormat {
            field: "username".to_string(),
            reason: "must not contain whitespace".to_string(),
        });
    }

    Ok(())
}

/// Validates a password before hashing. Only emptiness is checked.
pub fn validate_password(password: &str) -> ValidationResult<()> {
    if password.is_empty() {
        return Err(ValidationError::required("password"));
    }
    Ok(())
}

/// Validates free-text dosage instructions.
pub fn validate_dosage(dosage: &str) -> ValidationResult<()> {
    required_bounded("dosage", dosage, MAX_DOSAGE_LEN)
}

/// Validates a medication name.
pub fn validate_medication_name(name: &str) -> ValidationResult<()> {
    required_bounded("medication name", name, MAX_NAME_LEN)
}

/// Validates both halves of a patient key.
pub fn validate_patient_key(ssn: &str, name: &str) -> ValidationResult<()> {
    required_bounded("ssn", ssn, MAX_NAME_LEN)?;
    required_bounded("patient name", name, MAX_NAME_LEN)
}

// =============================================================================
// Date Validators
// =============================================================================

/// Parses an appointment time in `YYYY-MM-DD HH:MM:SS` form.
///
/// ## Example
/// ```rust
/// use clinic_core::validation::parse_appointment_time;
///
/// assert!(parse_appointment_time("2025-04-01 09:30:00").is_ok());
/// assert!(parse_appointment_time("tomorrow").is_err());
/// ```
pub fn parse_appointment_time(value: &str) -> ValidationResult<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value.trim(), APPOINTMENT_TIME_FORMAT).map_err(|e| {
        ValidationError::InvalidFormat {
            field: "appointment time".to_string(),
            reason: format!("expected YYYY-MM-DD HH:MM:SS ({})", e),
        }
    })
}

// =============================================================================
// Inventory Validators
// =============================================================================

/// Validates new restock figures.
///
/// ## Rules
/// ```text
/// new_stock   <= 0           → NonPositiveQuantity("quantity in stock")
/// new_ordered <= 0           → NonPositiveQuantity("quantity ordered")
/// new_ordered >= new_stock   → OrderedExceedsStock
/// ```
///
/// ## Example
/// ```rust
/// use clinic_core::validation::validate_restock;
///
/// assert!(validate_restock(50, 10).is_ok());
/// assert!(validate_restock(5, 10).is_err());
/// ```
pub fn validate_restock(new_stock: i64, new_ordered: i64) -> Result<(), InventoryError> {
    if new_stock <= 0 {
        return Err(InventoryError::NonPositiveQuantity {
            field: "quantity in stock".to_string(),
        });
    }

    if new_ordered <= 0 {
        return Err(InventoryError::NonPositiveQuantity {
            field: "quantity ordered".to_string(),
        });
    }

    if new_ordered >= new_stock {
        return Err(InventoryError::OrderedExceedsStock {
            stock: new_stock,
            ordered: new_ordered,
        });
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
