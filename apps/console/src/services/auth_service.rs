//! Authentication service.
//!
//! ## Login Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  begin_login() ──► LoginFlow { failures: 0, max_attempts: 3 }           │
//! │                                                                         │
//! │  attempt(user, pw)                                                      │
//! │     ├── budget already spent ────────────► TooManyAttempts (no lookup) │
//! │     ├── match ───────────────────────────► Session                      │
//! │     └── mismatch / unknown user                                         │
//! │            ├── failures < max ───────────► InvalidCredentials           │
//! │            └── failures == max ──────────► TooManyAttempts              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The budget belongs to one flow, not to the account: a new flow starts
//! from zero.

use std::sync::Arc;

use tracing::{info, warn};

use clinic_core::{AuthError, Session};

use crate::error::{ClinicError, ClinicResult};
use crate::AppState;

/// Checks usernames and passwords against stored accounts.
#[derive(Clone)]
pub struct Authenticator {
    state: Arc<AppState>,
}

impl Authenticator {
    pub fn new(state: Arc<AppState>) -> Self {
        Authenticator { state }
    }

    /// Single credential check.
    ///
    /// An unknown username and a wrong password both yield
    /// `AuthError::InvalidCredentials`.
    pub async fn authenticate(&self, username: &str, password: &str) -> ClinicResult<Session> {
        let account = match self.state.db.accounts().get_by_username(username).await? {
            Some(account) => account,
            None => return Err(AuthError::InvalidCredentials.into()),
        };

        if !self.state.hasher.verify(password, &account.password_hash) {
            return Err(AuthError::InvalidCredentials.into());
        }

        let session = Session::for_account(&account);

        info!(
            session_id = %session.session_id,
            username = %session.username,
            role = %session.role(),
            "Login succeeded"
        );

        Ok(session)
    }

    /// Starts a login flow with the configured attempt budget.
    pub fn begin_login(&self) -> LoginFlow {
        LoginFlow {
            authenticator: self.clone(),
            max_attempts: self.state.config.auth.max_login_attempts,
            failures: 0,
        }
    }
}

/// One interactive login with a bounded number of failures.
pub struct LoginFlow {
    authenticator: Authenticator,
    max_attempts: u32,
    failures: u32,
}

impl LoginFlow {
    /// Tries one username/password pair.
    ///
    /// ## Returns
    /// * `Ok(Session)` - credentials matched
    /// * `Err(AuthError::InvalidCredentials)` - mismatch, budget left
    /// * `Err(AuthError::TooManyAttempts)` - budget spent; later calls keep
    ///   returning this without looking anything up
    ///
    /// Store failures propagate and do not count as attempts.
    pub async fn attempt(&mut self, username: &str, password: &str) -> ClinicResult<Session> {
        if self.is_exhausted() {
            return Err(self.exhausted());
        }

        match self.authenticator.authenticate(username, password).await {
            Err(ClinicError::Auth(AuthError::InvalidCredentials)) => {
                self.failures += 1;
                warn!(
                    username = %username,
                    failures = self.failures,
                    max_attempts = self.max_attempts,
                    "Login failed"
                );

                if self.is_exhausted() {
                    Err(self.exhausted())
                } else {
                    Err(AuthError::InvalidCredentials.into())
                }
            }
            other => other,
        }
    }

    pub fn failures(&self) -> u32 {
        self.failures
    }

    pub fn remaining(&self) -> u32 {
        self.max_attempts.saturating_sub(self.failures)
    }

    pub fn is_exhausted(&self) -> bool {
        self.failures >= self.max_attempts
    }

    fn exhausted(&self) -> ClinicError {
        AuthError::TooManyAttempts {
            attempts: self.failures,
        }
        .into()
    }
}
