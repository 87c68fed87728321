//! # clinic-db: Database Layer for the Clinic Records Console
//!
//! SQLite storage through sqlx: the pool, embedded migrations, one
//! repository per table family, and the seed loader.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Clinic Records Data Flow                         │
//! │                                                                         │
//! │  Console service (dispense, restock, register, ...)                    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     clinic-db (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌────────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories  │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │                │    │  (embedded)  │  │   │
//! │  │   │               │    │ AccountRepo    │    │              │  │   │
//! │  │   │ SqlitePool    │◄───│ PrescriptionRe │    │ 001_init.sql │  │   │
//! │  │   │ begin() → tx  │    │ MedicationRepo │    │              │  │   │
//! │  │   └───────────────┘    └────────────────┘    └──────────────┘  │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     SQLite Database (clinic.db)                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation, configuration, transactions
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Repository implementations
//! - [`seed`] - Sample data loading
//!
//! ## Usage
//!
//! ```rust,ignore
//! use clinic_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("clinic.db")).await?;
//! let inventory = db.medications().list().await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;
pub mod seed;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::account::{AccountRepository, NewAccount};
pub use repository::appointment::AppointmentRepository;
pub use repository::directory::DirectoryRepository;
pub use repository::dispense::DispenseRepository;
pub use repository::medication::MedicationRepository;
pub use repository::prescription::PrescriptionRepository;
