//! Inventory ledger: stock listing and restock.

use std::sync::Arc;

use tracing::info;

use clinic_core::validation::validate_restock;
use clinic_core::{AccessRequest, InventoryError, Medication, Resource, Session, Target};

use crate::error::ClinicResult;
use crate::services::Guard;
use crate::AppState;

#[derive(Clone)]
pub struct InventoryLedger {
    state: Arc<AppState>,
    guard: Guard,
}

impl InventoryLedger {
    pub fn new(state: Arc<AppState>) -> Self {
        let guard = Guard::new(state.clone());
        InventoryLedger { state, guard }
    }

    /// Every medication, name ascending.
    pub async fn list(&self, session: &Session) -> ClinicResult<Vec<Medication>> {
        self.guard
            .check(session, &AccessRequest::read(Resource::Inventory, Target::Any))
            .await?;

        Ok(self.state.db.medications().list().await?)
    }

    /// Replaces the stock and on-order figures of one medication.
    ///
    /// ## Arguments
    /// * `new_stock` - units on hand, > 0
    /// * `new_ordered` - units on order, > 0 and < `new_stock`
    ///
    /// ## Returns
    /// The medication as stored after the update.
    pub async fn restock(
        &self,
        session: &Session,
        name: &str,
        new_stock: i64,
        new_ordered: i64,
    ) -> ClinicResult<Medication> {
        self.guard
            .check(session, &AccessRequest::update(Resource::Inventory, Target::Any))
            .await?;

        let medications = self.state.db.medications();
        let name = name.trim();

        if medications.get_by_name(name).await?.is_none() {
            return Err(InventoryError::MedicationNotFound(name.to_string()).into());
        }

        validate_restock(new_stock, new_ordered)?;

        if !medications.restock(name, new_stock, new_ordered).await? {
            return Err(InventoryError::MedicationNotFound(name.to_string()).into());
        }

        info!(
            session_id = %session.session_id,
            medication = %name,
            new_stock,
            new_ordered,
            "Medication restocked"
        );

        medications
            .get_by_name(name)
            .await?
            .ok_or_else(|| InventoryError::MedicationNotFound(name.to_string()).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{seeded_state, session_for};
    use crate::ClinicError;
    use clinic_core::{AuthzError, Principal};

    #[tokio::test]
    async fn test_manager_restocks() {
        let state = seeded_state().await;
        let rae = session_for(&state, "rae", Principal::Pharmacist { pharmacist_id: 3 }).await;

        let updated = InventoryLedger::new(state)
            .restock(&rae, "Salbutamol", 30, 5)
            .await
            .unwrap();

        assert_eq!(updated.quantity_in_stock, 30);
        assert_eq!(updated.quantity_ordered, 5);
        assert_eq!(updated.location.as_deref(), Some("Fridge 2"));
    }

    #[tokio::test]
    async fn test_restock_rules() {
        let state = seeded_state().await;
        let rae = session_for(&state, "rae", Principal::Pharmacist { pharmacist_id: 3 }).await;
        let ledger = InventoryLedger::new(state.clone());

        ledger.restock(&rae, "Ibuprofen", 50, 10).await.unwrap();

        let err = ledger.restock(&rae, "Ibuprofen", 5, 10).await.unwrap_err();
        assert!(matches!(
            err,
            ClinicError::Inventory(InventoryError::OrderedExceedsStock { stock: 5, ordered: 10 })
        ));

        let err = ledger.restock(&rae, "Ibuprofen", 10, 10).await.unwrap_err();
        assert!(matches!(err, ClinicError::Inventory(InventoryError::OrderedExceedsStock { .. })));

        let err = ledger.restock(&rae, "Ibuprofen", 0, 0).await.unwrap_err();
        assert!(matches!(err, ClinicError::Inventory(InventoryError::NonPositiveQuantity { .. })));

        let err = ledger.restock(&rae, "Unobtainium", 50, 10).await.unwrap_err();
        assert!(matches!(err, ClinicError::Inventory(InventoryError::MedicationNotFound(_))));

        // Rejected updates left the 50/10 figures alone
        let ibuprofen = state.db.medications().get_by_name("Ibuprofen").await.unwrap().unwrap();
        assert_eq!((ibuprofen.quantity_in_stock, ibuprofen.quantity_ordered), (50, 10));
    }

    #[tokio::test]
    async fn test_only_managers_and_admins_restock() {
        let state = seeded_state().await;
        let ledger = InventoryLedger::new(state.clone());

        let lee = session_for(&state, "lee", Principal::Pharmacist { pharmacist_id: 2 }).await;
        let err = ledger.restock(&lee, "Ibuprofen", 50, 10).await.unwrap_err();
        assert!(matches!(err, ClinicError::Authz(AuthzError::NotInventoryManager)));

        let doctor = session_for(&state, "osei", Principal::Doctor { doctor_id: 1 }).await;
        assert!(matches!(
            ledger.restock(&doctor, "Ibuprofen", 50, 10).await,
            Err(ClinicError::Authz(AuthzError::RoleNotPermitted { .. }))
        ));
        // Doctors may still look
        assert_eq!(ledger.list(&doctor).await.unwrap().len(), 6);

        let admin = session_for(&state, "root", Principal::Admin).await;
        assert!(ledger.restock(&admin, "Ibuprofen", 50, 10).await.is_ok());
    }

    #[tokio::test]
    async fn test_patients_cannot_see_inventory() {
        let state = seeded_state().await;
        let ana = session_for(
            &state,
            "ana",
            Principal::Patient(clinic_core::PatientKey::new("111-22-3333", "Ana Li")),
        )
        .await;

        assert!(matches!(
            InventoryLedger::new(state).list(&ana).await,
            Err(ClinicError::Authz(_))
        ));
    }
}
