//! Authorization guard.
//!
//! Wraps the static access table with a fresh capability lookup, so a
//! pharmacist whose dispenser or inventory-manager marker was removed loses
//! access on the very next call.

use std::sync::Arc;

use tracing::warn;

use clinic_core::{authorize, AccessRequest, PharmacistCapabilities, Session};

use crate::error::ClinicResult;
use crate::AppState;

#[derive(Clone)]
pub struct Guard {
    state: Arc<AppState>,
}

impl Guard {
    pub fn new(state: Arc<AppState>) -> Self {
        Guard { state }
    }

    /// Current capability markers of the session's pharmacist, if any.
    pub async fn capabilities(&self, session: &Session) -> ClinicResult<PharmacistCapabilities> {
        match session.principal.pharmacist_id() {
            Some(id) => Ok(self.state.db.directory().capabilities(id).await?),
            None => Ok(PharmacistCapabilities::none()),
        }
    }

    /// Permits or denies `request` for `session`.
    ///
    /// ## Returns
    /// * `Ok(())` - permitted
    /// * `Err(ClinicError::Authz)` - denied; never an empty result
    pub async fn check(&self, session: &Session, request: &AccessRequest) -> ClinicResult<()> {
        let capabilities = self.capabilities(session).await?;

        authorize(session, request, capabilities).map_err(|e| {
            warn!(
                session_id = %session.session_id,
                role = %session.role(),
                resource = %request.resource,
                operation = %request.operation,
                reason = %e,
                "Access denied"
            );
            e.into()
        })
    }
}
