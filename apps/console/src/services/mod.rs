//! Console service implementations.
//!
//! Each service holds the shared [`AppState`](crate::AppState) and takes the
//! caller's [`Session`](clinic_core::Session) on every protected call.

pub mod auth_service;
pub mod dispense_service;
pub mod guard;
pub mod inventory_service;
pub mod records_service;
pub mod registration_service;

pub use auth_service::{Authenticator, LoginFlow};
pub use dispense_service::DispensingEngine;
pub use guard::Guard;
pub use inventory_service::InventoryLedger;
pub use records_service::Records;
pub use registration_service::{Registration, RegistrationRequest, RoleLinkInput};
