//! # clinic-core: Pure Domain Logic for the Clinic Records Console
//!
//! Record types, the role union, the access table and the error taxonomy.
//! Nothing in this crate touches the database, the file system or a clock
//! beyond stamping new sessions.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Clinic Records Architecture                         │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    Console (role menus)                         │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │   Services: authenticate, register, dispense, restock, records  │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ clinic-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │  access   │  │   error   │  │ validation│  │   │
//! │  │   │ Principal │  │  POLICY   │  │ AuthError │  │  restock  │  │   │
//! │  │   │  Session  │  │ authorize │  │ Dispense..│  │  dates    │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    clinic-db (Database Layer)                   │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Accounts, sessions, prescriptions, medications
//! - [`access`] - The static authorization table
//! - [`error`] - Domain error types
//! - [`validation`] - Input validation
//!
//! ## Example Usage
//!
//! ```rust
//! use clinic_core::access::{authorize, AccessRequest, Resource, Target};
//! use clinic_core::{Account, PatientKey, PharmacistCapabilities, Principal, Session};
//!
//! let me = PatientKey::new("111-22-3333", "Ana Li");
//! let account = Account {
//!     id: 1,
//!     username: "ana".into(),
//!     password_hash: String::new(),
//!     principal: Principal::Patient(me.clone()),
//!     created_at: chrono::Utc::now(),
//! };
//! let session = Session::for_account(&account);
//!
//! let own = AccessRequest::read(Resource::Prescriptions, Target::Patient(me));
//! assert!(authorize(&session, &own, PharmacistCapabilities::none()).is_ok());
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod access;
pub mod error;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use access::{authorize, AccessRequest, Operation, Resource, Target};
pub use error::{
    AuthError, AuthzError, DispenseError, InventoryError, RegistrationError, ValidationError,
};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Failed attempts allowed in one login flow.
pub const MAX_LOGIN_ATTEMPTS: u32 = 3;

pub const MAX_USERNAME_LEN: usize = 64;

pub const MAX_NAME_LEN: usize = 120;

pub const MAX_DOSAGE_LEN: usize = 500;

/// Storage and input format of appointment times.
pub const APPOINTMENT_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
