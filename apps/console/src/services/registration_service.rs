//! Account registration.
//!
//! ## Check Order
//! ```text
//! username/password present
//!   → username free            (DuplicateUsername)
//!   → confirmation matches     (PasswordMismatch)
//!   → role name known          (InvalidRole)
//!   → link fits the role       (InconsistentRoleLink)
//!   → linked identity exists   (UnknownPatientLink / Doctor / Pharmacist)
//!   → hash, insert
//! ```
//! Nothing is written unless every check passes.

use std::sync::Arc;

use tracing::{debug, info};

use clinic_core::validation::{validate_password, validate_patient_key, validate_username};
use clinic_core::{
    Account, DoctorId, PatientKey, PharmacistId, Principal, RegistrationError, Role,
    ValidationError,
};
use clinic_db::NewAccount;

use crate::error::{ClinicError, ClinicResult};
use crate::AppState;

/// Identity link supplied at registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoleLinkInput {
    /// Admin accounts carry no link.
    None,
    Patient(PatientKey),
    Doctor(DoctorId),
    Pharmacist(PharmacistId),
}

#[derive(Debug, Clone)]
pub struct RegistrationRequest {
    pub username: String,
    pub password: String,
    pub confirm_password: String,
    /// Role name as typed; parsed case-insensitively.
    pub role: String,
    pub link: RoleLinkInput,
}

#[derive(Clone)]
pub struct Registration {
    state: Arc<AppState>,
}

impl Registration {
    pub fn new(state: Arc<AppState>) -> Self {
        Registration { state }
    }

    /// Creates an account bound to exactly one identity.
    ///
    /// ## Returns
    /// The stored account. No session is opened; the caller logs in next.
    pub async fn register(&self, request: &RegistrationRequest) -> ClinicResult<Account> {
        // Stored exactly as given; login matches byte for byte
        let username = request.username.as_str();
        validate_username(username)?;
        validate_password(&request.password)?;

        let accounts = self.state.db.accounts();

        if accounts.username_exists(username).await? {
            return Err(RegistrationError::DuplicateUsername(username.to_string()).into());
        }

        if request.password != request.confirm_password {
            return Err(RegistrationError::PasswordMismatch.into());
        }

        let role: Role = request.role.parse()?;
        let principal = principal_for(role, &request.link)?;
        self.ensure_link_exists(&principal).await?;

        let password_hash = self.state.hasher.hash(&request.password)?;

        debug!(username = %username, role = %role, "Inserting account");

        let account = accounts
            .insert(&NewAccount {
                username: username.to_string(),
                password_hash,
                principal,
            })
            .await
            .map_err(|e| {
                // Lost a race with another registration of the same name
                if e.is_unique_violation_on("Account") {
                    ClinicError::from(RegistrationError::DuplicateUsername(username.to_string()))
                } else {
                    ClinicError::from(e)
                }
            })?;

        info!(account_id = account.id, username = %account.username, role = %role, "Account registered");
        Ok(account)
    }

    async fn ensure_link_exists(&self, principal: &Principal) -> ClinicResult<()> {
        let directory = self.state.db.directory();

        match principal {
            Principal::Patient(key) => {
                if !directory.patient_exists(key).await? {
                    return Err(RegistrationError::UnknownPatientLink {
                        name: key.name.clone(),
                    }
                    .into());
                }
            }
            Principal::Doctor { doctor_id } => {
                if directory.get_doctor(*doctor_id).await?.is_none() {
                    return Err(RegistrationError::UnknownDoctorLink(*doctor_id).into());
                }
            }
            Principal::Pharmacist { pharmacist_id } => {
                if directory.get_pharmacist(*pharmacist_id).await?.is_none() {
                    return Err(RegistrationError::UnknownPharmacistLink(*pharmacist_id).into());
                }
            }
            Principal::Admin => {}
        }

        Ok(())
    }
}

/// Pairs the parsed role with the supplied link.
fn principal_for(role: Role, link: &RoleLinkInput) -> ClinicResult<Principal> {
    let principal = match (role, link) {
        (Role::Admin, RoleLinkInput::None) => Principal::Admin,
        (Role::Patient, RoleLinkInput::Patient(key)) => {
            validate_patient_key(&key.ssn, &key.name)?;
            Principal::Patient(PatientKey::new(key.ssn.trim(), key.name.trim()))
        }
        (Role::Doctor, RoleLinkInput::Doctor(id)) => Principal::Doctor { doctor_id: *id },
        (Role::Pharmacist, RoleLinkInput::Pharmacist(id)) => {
            Principal::Pharmacist { pharmacist_id: *id }
        }
        _ => {
            return Err(ValidationError::InconsistentRoleLink {
                role: role.to_string(),
            }
            .into())
        }
    };

    Ok(principal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::Authenticator;
    use crate::testing::seeded_state;

    fn request(username: &str, role: &str, link: RoleLinkInput) -> RegistrationRequest {
        RegistrationRequest {
            username: username.to_string(),
            password: "pw-123".to_string(),
            confirm_password: "pw-123".to_string(),
            role: role.to_string(),
            link,
        }
    }

    fn ana() -> PatientKey {
        PatientKey::new("111-22-3333", "Ana Li")
    }

    #[tokio::test]
    async fn test_register_then_login() {
        let state = seeded_state().await;
        let registration = Registration::new(state.clone());

        let account = registration
            .register(&request("ana", "Patient", RoleLinkInput::Patient(ana())))
            .await
            .unwrap();
        assert_eq!(account.principal, Principal::Patient(ana()));
        assert_ne!(account.password_hash, "pw-123");

        let session = Authenticator::new(state)
            .authenticate("ana", "pw-123")
            .await
            .unwrap();
        assert_eq!(session.principal, Principal::Patient(ana()));
    }

    #[tokio::test]
    async fn test_duplicate_username_rejected_and_no_row_written() {
        let state = seeded_state().await;
        let registration = Registration::new(state.clone());

        registration
            .register(&request("osei", "doctor", RoleLinkInput::Doctor(1)))
            .await
            .unwrap();

        let err = registration
            .register(&request("osei", "admin", RoleLinkInput::None))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ClinicError::Registration(RegistrationError::DuplicateUsername(_))
        ));
        assert_eq!(state.db.accounts().count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_password_mismatch() {
        let state = seeded_state().await;
        let mut req = request("lee", "pharmacist", RoleLinkInput::Pharmacist(2));
        req.confirm_password = "pw-124".to_string();

        let err = Registration::new(state.clone()).register(&req).await.unwrap_err();
        assert!(matches!(
            err,
            ClinicError::Registration(RegistrationError::PasswordMismatch)
        ));
        assert_eq!(state.db.accounts().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_invalid_role() {
        let state = seeded_state().await;
        let err = Registration::new(state)
            .register(&request("nurse", "nurse", RoleLinkInput::None))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ClinicError::Registration(RegistrationError::InvalidRole(ref r)) if r == "nurse"
        ));
    }

    #[tokio::test]
    async fn test_unknown_links() {
        let state = seeded_state().await;
        let registration = Registration::new(state.clone());

        let err = registration
            .register(&request(
                "ghost",
                "patient",
                RoleLinkInput::Patient(PatientKey::new("111-22-3333", "Someone Else")),
            ))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ClinicError::Registration(RegistrationError::UnknownPatientLink { .. })
        ));

        let err = registration
            .register(&request("drx", "doctor", RoleLinkInput::Doctor(99)))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ClinicError::Registration(RegistrationError::UnknownDoctorLink(99))
        ));

        let err = registration
            .register(&request("phx", "pharmacist", RoleLinkInput::Pharmacist(99)))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ClinicError::Registration(RegistrationError::UnknownPharmacistLink(99))
        ));

        assert_eq!(state.db.accounts().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_link_must_fit_role() {
        let state = seeded_state().await;
        let err = Registration::new(state)
            .register(&request("mixed", "doctor", RoleLinkInput::Pharmacist(1)))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ClinicError::Validation(ValidationError::InconsistentRoleLink { .. })
        ));
    }

    #[tokio::test]
    async fn test_empty_username_rejected() {
        let state = seeded_state().await;
        let err = Registration::new(state)
            .register(&request("  ", "admin", RoleLinkInput::None))
            .await
            .unwrap_err();

        assert!(matches!(err, ClinicError::Validation(ValidationError::Required { .. })));
    }

    #[tokio::test]
    async fn test_padded_username_rejected_not_trimmed() {
        let state = seeded_state().await;
        let registration = Registration::new(state.clone());

        let err = registration
            .register(&request(" ana", "Patient", RoleLinkInput::Patient(ana())))
            .await
            .unwrap_err();
        assert!(matches!(err, ClinicError::Validation(ValidationError::InvalidFormat { .. })));
        assert_eq!(state.db.accounts().count().await.unwrap(), 0);

        // The exact name still registers and logs in
        registration
            .register(&request("ana", "Patient", RoleLinkInput::Patient(ana())))
            .await
            .unwrap();
        assert!(Authenticator::new(state).authenticate("ana", "pw-123").await.is_ok());
    }
}
