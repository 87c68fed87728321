//! # Error Types
//!
//! Domain error taxonomy for clinic-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  clinic-core errors (this file)                                        │
//! │  ├── AuthError          - Login failures                               │
//! │  ├── RegistrationError  - Account creation failures                    │
//! │  ├── AuthzError         - Access table denials                         │
//! │  ├── DispenseError      - Fulfillment workflow failures                │
//! │  ├── InventoryError     - Restock failures                             │
//! │  └── ValidationError    - Field-level input failures                   │
//! │                                                                         │
//! │  clinic-db errors (separate crate)                                     │
//! │  └── DbError            - Database operation failures                  │
//! │                                                                         │
//! │  Console errors (in app)                                               │
//! │  └── ClinicError        - What the caller sees                         │
//! │                                                                         │
//! │  Flow: domain error / DbError → ClinicError → console message          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (ids, medication names)
//! 3. Never echo credentials or SSNs in messages
//! 4. Every variant is recoverable; none terminates the process

use thiserror::Error;

use crate::access::{Operation, Resource};
use crate::types::{PrescriptionId, Role};

// =============================================================================
// Authentication
// =============================================================================

/// Login failures.
///
/// An unknown username and a wrong password produce the same variant so the
/// caller cannot tell which accounts exist.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("Invalid username or password")]
    InvalidCredentials,

    /// The login flow used up its attempt budget.
    #[error("Too many failed login attempts ({attempts})")]
    TooManyAttempts { attempts: u32 },
}

// =============================================================================
// Registration
// =============================================================================

/// Account creation failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistrationError {
    #[error("Username '{0}' is already taken")]
    DuplicateUsername(String),

    #[error("Password and confirmation do not match")]
    PasswordMismatch,

    #[error("Unknown role '{0}'. Valid roles: patient, doctor, pharmacist, admin")]
    InvalidRole(String),

    /// No patient row matches the supplied (ssn, name) pair.
    #[error("No patient record matches '{name}' with the given SSN")]
    UnknownPatientLink { name: String },

    #[error("No doctor with id {0}")]
    UnknownDoctorLink(i64),

    #[error("No pharmacist with id {0}")]
    UnknownPharmacistLink(i64),
}

// =============================================================================
// Authorization
// =============================================================================

/// Reasons the access table denied a request.
///
/// A denial is always reported; it is never turned into an empty result.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthzError {
    #[error("{resource} belong to another identity")]
    NotOwner { resource: Resource },

    #[error("Pharmacist is not registered as a dispenser")]
    NotDispenser,

    #[error("Pharmacist is not registered as an inventory manager")]
    NotInventoryManager,

    #[error("Role {role} may not {operation} {resource}")]
    RoleNotPermitted {
        role: Role,
        operation: Operation,
        resource: Resource,
    },
}

// =============================================================================
// Dispensing
// =============================================================================

/// Fulfillment workflow failures.
///
/// ## Workflow
/// ```text
/// dispense(session, id)
///      │
///      ├── no prescription row ──────────► PrescriptionNotFound
///      ├── dispense record exists ───────► AlreadyDispensed
///      ├── session not a dispenser ──────► AuthzError::NotDispenser
///      ├── empty composition ────────────► NoMedicationsLinked
///      │
///      ▼  (atomic unit)
///      └── some medication at 0 stock ───► InsufficientStock (rolled back)
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispenseError {
    #[error("Prescription #{0} not found")]
    PrescriptionNotFound(PrescriptionId),

    #[error("Prescription #{0} has already been dispensed")]
    AlreadyDispensed(PrescriptionId),

    #[error("Prescription #{0} has no medications linked")]
    NoMedicationsLinked(PrescriptionId),

    #[error("Insufficient stock for {0}")]
    InsufficientStock(String),
}

// =============================================================================
// Inventory
// =============================================================================

/// Restock failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InventoryError {
    #[error("Medication '{0}' not found")]
    MedicationNotFound(String),

    #[error("{field} must be greater than zero")]
    NonPositiveQuantity { field: String },

    /// Units on order must stay strictly below units on hand.
    #[error("Quantity ordered ({ordered}) must be less than quantity in stock ({stock})")]
    OrderedExceedsStock { stock: i64, ordered: i64 },
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Used for early validation before any store access.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Invalid format (e.g., unparseable date).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// A stored account whose role tag disagrees with its populated links.
    #[error("Account role '{role}' does not match its identity link")]
    InconsistentRoleLink { role: String },
}

impl ValidationError {
    pub fn required(field: impl Into<String>) -> Self {
        ValidationError::Required {
            field: field.into(),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
