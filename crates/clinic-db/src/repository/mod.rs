//! # Repository Module
//!
//! One repository per table family. Each holds a pool clone and is handed
//! out by [`crate::Database`].
//!
//! ## Pooled vs Transaction-Scoped
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  db.medications().list()                 ← &self, runs on the pool      │
//! │                                                                         │
//! │  MedicationRepository::take_one(         ← associated fn, runs on the   │
//! │      &mut *tx, "Amoxicillin")               caller's open transaction   │
//! │                                                                         │
//! │  The caller owns begin / commit / rollback. A transaction-scoped        │
//! │  function never opens or closes one itself.                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`AccountRepository`](account::AccountRepository) - Login accounts
//! - [`DirectoryRepository`](directory::DirectoryRepository) - Patients, doctors, pharmacists, insurance
//! - [`PrescriptionRepository`](prescription::PrescriptionRepository) - Prescriptions and composition
//! - [`MedicationRepository`](medication::MedicationRepository) - Inventory ledger
//! - [`DispenseRepository`](dispense::DispenseRepository) - Dispense records
//! - [`AppointmentRepository`](appointment::AppointmentRepository) - Appointments

pub mod account;
pub mod appointment;
pub mod directory;
pub mod dispense;
pub mod medication;
pub mod prescription;
