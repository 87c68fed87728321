//! # Clinic Console
//!
//! Service layer and role menus for the clinic records console.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Console Services                                │
//! │                                                                         │
//! │  ┌────────────────┐  ┌────────────────┐  ┌────────────────────────────┐│
//! │  │ Authenticator  │  │ Registration   │  │ DispensingEngine           ││
//! │  │                │  │                │  │                            ││
//! │  │ • authenticate │  │ • register     │  │ • dispense (atomic)        ││
//! │  │ • LoginFlow    │  │   (role links) │  │                            ││
//! │  └────────────────┘  └────────────────┘  └────────────────────────────┘│
//! │                                                                         │
//! │  ┌────────────────┐  ┌────────────────┐  ┌────────────────────────────┐│
//! │  │InventoryLedger │  │ Records        │  │ Guard                      ││
//! │  │                │  │                │  │                            ││
//! │  │ • list         │  │ • patients     │  │ • check (access table +    ││
//! │  │ • restock      │  │ • appointments │  │   fresh capability lookup) ││
//! │  │                │  │ • prescriptions│  │                            ││
//! │  └────────────────┘  └────────────────┘  └────────────────────────────┘│
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │  AppState: Database (SQLite pool) + ClinicConfig + hasher        │  │
//! │  └──────────────────────────────────────────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration
//! See [`config`] for the TOML file and the `CLINIC_*` environment variables.

use std::sync::Arc;

pub mod config;
pub mod error;
pub mod hasher;
pub mod menu;
pub mod services;

// Re-exports
pub use config::ClinicConfig;
pub use error::{ClinicError, ClinicResult, ErrorCode};
pub use hasher::{Argon2Hasher, CredentialHasher};

use clinic_db::Database;

/// Shared application state.
pub struct AppState {
    pub db: Database,
    pub config: ClinicConfig,
    pub hasher: Arc<dyn CredentialHasher>,
}

impl AppState {
    /// Builds state with an Argon2 hasher configured from `config.auth`.
    pub fn new(db: Database, config: ClinicConfig) -> ClinicResult<Self> {
        let hasher = Argon2Hasher::from_settings(&config.auth)?;
        Ok(AppState {
            db,
            config,
            hasher: Arc::new(hasher),
        })
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Shared fixtures: an in-memory database loaded with the sample seed.

    use super::*;
    use clinic_core::{Principal, Session};
    use clinic_db::seed::{self, SeedData};
    use clinic_db::{DbConfig, NewAccount};

    pub const PASSWORD: &str = "correct horse";

    pub async fn seeded_state() -> Arc<AppState> {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        seed::apply(&db, &SeedData::sample().unwrap()).await.unwrap();

        Arc::new(AppState {
            db,
            config: ClinicConfig::default(),
            hasher: Arc::new(Argon2Hasher::new(1024, 1, 1).unwrap()),
        })
    }

    /// Sample-seeded database in a scratch file with a four-connection pool.
    ///
    /// The caller closes the pool and removes the file.
    pub async fn file_state() -> (Arc<AppState>, std::path::PathBuf) {
        let path = std::env::temp_dir().join(format!("clinic-{}.db", uuid::Uuid::new_v4()));
        let db = Database::new(DbConfig::new(&path).max_connections(4))
            .await
            .unwrap();
        seed::apply(&db, &SeedData::sample().unwrap()).await.unwrap();

        let state = Arc::new(AppState {
            db,
            config: ClinicConfig::default(),
            hasher: Arc::new(Argon2Hasher::new(1024, 1, 1).unwrap()),
        });
        (state, path)
    }

    /// Inserts an account with [`PASSWORD`] and returns a session for it.
    pub async fn session_for(state: &AppState, username: &str, principal: Principal) -> Session {
        let password_hash = state.hasher.hash(PASSWORD).unwrap();
        let account = state
            .db
            .accounts()
            .insert(&NewAccount {
                username: username.to_string(),
                password_hash,
                principal,
            })
            .await
            .unwrap();

        Session::for_account(&account)
    }
}
