//! # Dispensing Engine
//!
//! Fulfills a prescription: records who dispensed it and takes one unit of
//! each linked medication, all or nothing.
//!
//! ## Workflow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  dispense(session, id)                                                  │
//! │                                                                         │
//! │  Pre-checks (pool)                                                      │
//! │    prescription exists ────────────────────── PrescriptionNotFound      │
//! │    no dispense record yet ─────────────────── AlreadyDispensed          │
//! │    caller is a dispenser (fresh lookup) ───── NotDispenser              │
//! │    composition not empty ──────────────────── NoMedicationsLinked       │
//! │                                                                         │
//! │  BEGIN ─────────────────────────────────────────────────────────────┐   │
//! │    INSERT dispense record ──── unique violation ─ AlreadyDispensed  │   │
//! │    re-read composition (name ascending)                             │   │
//! │    for each name: stock > 0 ? stock - 1 ── else ─ InsufficientStock │   │
//! │  COMMIT ◄───────────────── any error: ROLLBACK, nothing persists ───┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The dispense record's primary key on the prescription id is what stops a
//! concurrent second dispense; the pre-checks only give early, friendly
//! errors.

use std::sync::Arc;

use chrono::Utc;
use sqlx::SqliteConnection;
use tracing::{debug, error, info};

use clinic_core::{
    AccessRequest, AuthzError, DispenseError, DispenseRecord, DispenseResult,
    DispensedMedication, PharmacistId, PrescriptionId, Session,
};
use clinic_db::{Database, DispenseRepository, MedicationRepository, PrescriptionRepository};

use crate::error::{ClinicError, ClinicResult};
use crate::services::Guard;
use crate::AppState;

#[derive(Clone)]
pub struct DispensingEngine {
    state: Arc<AppState>,
    guard: Guard,
}

impl DispensingEngine {
    pub fn new(state: Arc<AppState>) -> Self {
        let guard = Guard::new(state.clone());
        DispensingEngine { state, guard }
    }

    /// Dispenses prescription `id` on behalf of the session's pharmacist.
    ///
    /// ## Returns
    /// * `Ok(DispenseResult)` - committed; stock figures are post-decrement
    /// * `Err(ClinicError::Dispense | Authz)` - nothing was written
    pub async fn dispense(
        &self,
        session: &Session,
        id: PrescriptionId,
    ) -> ClinicResult<DispenseResult> {
        let db = &self.state.db;

        if db.prescriptions().get_by_id(id).await?.is_none() {
            return Err(DispenseError::PrescriptionNotFound(id).into());
        }

        if db.dispenses().is_dispensed(id).await? {
            return Err(DispenseError::AlreadyDispensed(id).into());
        }

        let pharmacist_id = session
            .principal
            .pharmacist_id()
            .ok_or(AuthzError::NotDispenser)?;
        self.guard.check(session, &AccessRequest::dispense()).await?;

        if db.prescriptions().composition(id).await?.is_empty() {
            return Err(DispenseError::NoMedicationsLinked(id).into());
        }

        let record = DispenseRecord {
            prescription_id: id,
            pharmacist_id,
            dispensed_at: Utc::now(),
        };

        let mut tx = db.begin().await?;

        match apply(&mut *tx, &record).await {
            Ok(medications) => {
                Database::commit(tx).await?;

                info!(
                    session_id = %session.session_id,
                    prescription_id = id,
                    pharmacist_id,
                    medications = medications.len(),
                    "Prescription dispensed"
                );

                Ok(DispenseResult {
                    prescription_id: id,
                    pharmacist_id,
                    medications,
                    dispensed_at: record.dispensed_at,
                })
            }
            Err(e) => {
                if let Err(rollback) = tx.rollback().await {
                    error!(prescription_id = id, error = %rollback, "Rollback failed");
                }
                debug!(prescription_id = id, error = %e, "Dispense rolled back");
                Err(e)
            }
        }
    }

    /// Pharmacist that dispensed `id`, if any.
    pub async fn dispensed_by(&self, id: PrescriptionId) -> ClinicResult<Option<PharmacistId>> {
        Ok(self
            .state
            .db
            .dispenses()
            .get(id)
            .await?
            .map(|record| record.pharmacist_id))
    }
}

/// The transactional part of a dispense.
async fn apply(
    conn: &mut SqliteConnection,
    record: &DispenseRecord,
) -> ClinicResult<Vec<DispensedMedication>> {
    let id = record.prescription_id;

    DispenseRepository::insert(&mut *conn, record)
        .await
        .map_err(|e| {
            if e.is_unique_violation_on("Medication_dispensed") {
                ClinicError::from(DispenseError::AlreadyDispensed(id))
            } else {
                ClinicError::from(e)
            }
        })?;

    let names = PrescriptionRepository::composition_in(&mut *conn, id).await?;
    if names.is_empty() {
        return Err(DispenseError::NoMedicationsLinked(id).into());
    }

    let mut dispensed = Vec::with_capacity(names.len());
    for name in names {
        match MedicationRepository::take_one(&mut *conn, &name).await? {
            Some(remaining_stock) => dispensed.push(DispensedMedication {
                name,
                remaining_stock,
            }),
            None => return Err(DispenseError::InsufficientStock(name).into()),
        }
    }

    Ok(dispensed)
}
