//! # Record Accessors
//!
//! Role-scoped reads and writes behind the menus: patients, appointments,
//! prescriptions and their composition, insurance, pharmacist capabilities.
//!
//! ## Scoping
//! ```text
//! ┌──────────────────┬──────────────┬──────────────┬──────────────┬───────┐
//! │                  │ Patient      │ Doctor       │ Pharmacist   │ Admin │
//! ├──────────────────┼──────────────┼──────────────┼──────────────┼───────┤
//! │ patients         │ -            │ all          │ -            │ all   │
//! │ appointments     │ own          │ own          │ -            │ all   │
//! │ prescriptions    │ own          │ written      │ dispenser    │ all   │
//! │ composition edit │ -            │ -            │ -            │ yes   │
//! │ insurance        │ own          │ -            │ -            │ all   │
//! └──────────────────┴──────────────┴──────────────┴──────────────┴───────┘
//! ```
//! Every call asks the [`Guard`] first; a denial is an error, never an
//! empty list.

use std::sync::Arc;

use chrono::Utc;
use sqlx::SqliteConnection;
use tracing::info;

use clinic_core::validation::{
    parse_appointment_time, validate_dosage, validate_medication_name, validate_patient_key,
};
use clinic_core::{
    AccessRequest, Account, Appointment, AppointmentView, DispenseError, DoctorId,
    InsurancePolicy, NewAppointment, NewPrescription, Patient, PatientKey, Pharmacist,
    PharmacistCapabilities, PharmacistId, Prescription, PrescriptionDetail, PrescriptionId,
    PrescriptionSummary, Principal, Resource, Session, Target,
};

use clinic_db::{Database, DispenseRepository, PrescriptionRepository};

use crate::error::{ClinicError, ClinicResult};
use crate::services::Guard;
use crate::AppState;

#[derive(Clone)]
pub struct Records {
    state: Arc<AppState>,
    guard: Guard,
}

impl Records {
    pub fn new(state: Arc<AppState>) -> Self {
        let guard = Guard::new(state.clone());
        Records { state, guard }
    }

    // =========================================================================
    // Patients & Appointments
    // =========================================================================

    /// Every patient, name ascending.
    pub async fn list_patients(&self, session: &Session) -> ClinicResult<Vec<Patient>> {
        self.guard
            .check(session, &AccessRequest::read(Resource::Patients, Target::Any))
            .await?;

        Ok(self.state.db.directory().list_patients().await?)
    }

    /// Appointments visible to the session, in scheduled order.
    pub async fn list_appointments(&self, session: &Session) -> ClinicResult<Vec<AppointmentView>> {
        let appointments = self.state.db.appointments();

        let target = match &session.principal {
            Principal::Patient(key) => Target::Patient(key.clone()),
            Principal::Doctor { doctor_id } => Target::Doctor(*doctor_id),
            Principal::Pharmacist { .. } | Principal::Admin => Target::Any,
        };
        self.guard
            .check(session, &AccessRequest::read(Resource::Appointments, target))
            .await?;

        let rows = match &session.principal {
            Principal::Patient(key) => appointments.list_for_patient(key).await?,
            Principal::Doctor { doctor_id } => appointments.list_for_doctor(*doctor_id).await?,
            Principal::Pharmacist { .. } | Principal::Admin => appointments.list_all().await?,
        };

        Ok(rows)
    }

    /// Books an appointment.
    ///
    /// ## Arguments
    /// * `scheduled_at` - `YYYY-MM-DD HH:MM:SS`
    ///
    /// ## Errors
    /// * `Validation` - malformed key or time
    /// * `IntegrityViolation` - unknown patient or doctor
    pub async fn create_appointment(
        &self,
        session: &Session,
        patient: PatientKey,
        doctor_id: DoctorId,
        scheduled_at: &str,
    ) -> ClinicResult<Appointment> {
        validate_patient_key(&patient.ssn, &patient.name)?;
        let scheduled_at = parse_appointment_time(scheduled_at)?;

        let target = Target::Record {
            patient: patient.clone(),
            doctor_id,
        };
        self.guard
            .check(session, &AccessRequest::create(Resource::Appointments, target))
            .await?;

        let appointment = self
            .state
            .db
            .appointments()
            .insert(&NewAppointment {
                patient,
                doctor_id,
                scheduled_at,
            })
            .await?;

        info!(
            session_id = %session.session_id,
            appointment_id = appointment.id,
            doctor_id,
            "Appointment booked"
        );
        Ok(appointment)
    }

    // =========================================================================
    // Prescriptions
    // =========================================================================

    /// A patient's prescriptions, newest first.
    ///
    /// Doctors only see the prescriptions they wrote.
    pub async fn prescriptions_for_patient(
        &self,
        session: &Session,
        patient: &PatientKey,
    ) -> ClinicResult<Vec<PrescriptionSummary>> {
        let (target, written_by) = match session.principal.doctor_id() {
            Some(me) => (
                Target::Record {
                    patient: patient.clone(),
                    doctor_id: me,
                },
                Some(me),
            ),
            None => (Target::Patient(patient.clone()), None),
        };

        self.guard
            .check(session, &AccessRequest::read(Resource::Prescriptions, target))
            .await?;

        Ok(self
            .state
            .db
            .prescriptions()
            .list_for_patient(patient, written_by)
            .await?)
    }

    /// Every prescription written by `doctor_id`, newest first.
    pub async fn prescriptions_by_doctor(
        &self,
        session: &Session,
        doctor_id: DoctorId,
    ) -> ClinicResult<Vec<PrescriptionSummary>> {
        self.guard
            .check(
                session,
                &AccessRequest::read(Resource::Prescriptions, Target::Doctor(doctor_id)),
            )
            .await?;

        Ok(self.state.db.prescriptions().list_for_doctor(doctor_id).await?)
    }

    /// One prescription with its composition and dispense record.
    pub async fn prescription_detail(
        &self,
        session: &Session,
        id: PrescriptionId,
    ) -> ClinicResult<PrescriptionDetail> {
        let detail = self
            .state
            .db
            .prescriptions()
            .detail(id)
            .await?
            .ok_or(DispenseError::PrescriptionNotFound(id))?;

        let target = Target::Record {
            patient: detail.prescription.patient.clone(),
            doctor_id: detail.prescription.doctor_id,
        };
        self.guard
            .check(session, &AccessRequest::read(Resource::Prescriptions, target))
            .await?;

        Ok(detail)
    }

    /// Writes a prescription dated today, with its initial composition.
    ///
    /// The prescription and every composition line land together or not at
    /// all.
    pub async fn create_prescription(
        &self,
        session: &Session,
        new: &NewPrescription,
    ) -> ClinicResult<Prescription> {
        validate_patient_key(&new.patient.ssn, &new.patient.name)?;
        validate_dosage(&new.dosage)?;
        for name in &new.medications {
            validate_medication_name(name)?;
        }

        let target = Target::Record {
            patient: new.patient.clone(),
            doctor_id: new.doctor_id,
        };
        self.guard
            .check(session, &AccessRequest::create(Resource::Prescriptions, target))
            .await?;

        let prescription = self
            .state
            .db
            .prescriptions()
            .create(new, Utc::now().date_naive())
            .await?;

        info!(
            session_id = %session.session_id,
            prescription_id = prescription.id,
            doctor_id = prescription.doctor_id,
            medications = new.medications.len(),
            "Prescription written"
        );
        Ok(prescription)
    }

    /// Adds a medication line to a pending prescription.
    ///
    /// ## Errors
    /// * `AlreadyDispensed` - the prescription is closed
    /// * `IntegrityViolation` - duplicate line or unknown medication
    pub async fn add_medication(
        &self,
        session: &Session,
        id: PrescriptionId,
        medication: &str,
    ) -> ClinicResult<()> {
        let medication = medication.trim();
        validate_medication_name(medication)?;
        self.editable_composition(session, id).await?;

        let mut tx = self.state.db.begin().await?;
        PrescriptionRepository::add_medication_in(&mut *tx, id, medication).await?;
        still_pending(&mut *tx, id).await?;
        Database::commit(tx).await?;

        info!(session_id = %session.session_id, prescription_id = id, medication = %medication, "Medication added");
        Ok(())
    }

    /// Removes a medication line from a pending prescription.
    pub async fn remove_medication(
        &self,
        session: &Session,
        id: PrescriptionId,
        medication: &str,
    ) -> ClinicResult<()> {
        let medication = medication.trim();
        self.editable_composition(session, id).await?;

        let mut tx = self.state.db.begin().await?;
        let removed = PrescriptionRepository::remove_medication_in(&mut *tx, id, medication).await?;
        still_pending(&mut *tx, id).await?;
        if !removed {
            return Err(ClinicError::not_found(
                "Composition line",
                format!("#{} {}", id, medication),
            ));
        }
        Database::commit(tx).await?;

        info!(session_id = %session.session_id, prescription_id = id, medication = %medication, "Medication removed");
        Ok(())
    }

    /// Early checks before a composition edit. The edit itself re-checks
    /// inside its transaction.
    async fn editable_composition(&self, session: &Session, id: PrescriptionId) -> ClinicResult<()> {
        self.guard
            .check(session, &AccessRequest::update(Resource::Composition, Target::Any))
            .await?;

        let db = &self.state.db;
        if db.prescriptions().get_by_id(id).await?.is_none() {
            return Err(DispenseError::PrescriptionNotFound(id).into());
        }
        if db.dispenses().is_dispensed(id).await? {
            return Err(DispenseError::AlreadyDispensed(id).into());
        }

        Ok(())
    }

    // =========================================================================
    // Insurance, Pharmacists, Accounts
    // =========================================================================

    pub async fn insurance_for(
        &self,
        session: &Session,
        patient: &PatientKey,
    ) -> ClinicResult<Vec<InsurancePolicy>> {
        self.guard
            .check(
                session,
                &AccessRequest::read(Resource::Insurance, Target::Patient(patient.clone())),
            )
            .await?;

        Ok(self.state.db.directory().insurance_for(patient).await?)
    }

    /// A pharmacist and the capability markers they currently hold.
    pub async fn pharmacist_capabilities(
        &self,
        session: &Session,
        id: PharmacistId,
    ) -> ClinicResult<(Pharmacist, PharmacistCapabilities)> {
        self.guard
            .check(
                session,
                &AccessRequest::read(Resource::Pharmacists, Target::Pharmacist(id)),
            )
            .await?;

        let directory = self.state.db.directory();
        let pharmacist = directory
            .get_pharmacist(id)
            .await?
            .ok_or_else(|| ClinicError::not_found("Pharmacist", id))?;
        let capabilities = directory.capabilities(id).await?;

        Ok((pharmacist, capabilities))
    }

    /// The account behind the session.
    pub async fn account(&self, session: &Session) -> ClinicResult<Account> {
        self.state
            .db
            .accounts()
            .get_by_id(session.account_id)
            .await?
            .ok_or_else(|| ClinicError::not_found("Account", session.account_id))
    }
}

/// Fails with `AlreadyDispensed` if a dispense record exists as seen by
/// `conn`. Called after the composition write, so the check runs under the
/// write lock a dispense also needs and the open transaction rolls back.
async fn still_pending(conn: &mut SqliteConnection, id: PrescriptionId) -> ClinicResult<()> {
    if DispenseRepository::is_dispensed_in(conn, id).await? {
        return Err(DispenseError::AlreadyDispensed(id).into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::DispensingEngine;
    use crate::testing::{file_state, seeded_state, session_for};
    use crate::ErrorCode;
    use clinic_core::{AuthzError, DispenseResult, FulfillmentStatus};

    fn ana() -> PatientKey {
        PatientKey::new("111-22-3333", "Ana Li")
    }

    fn bo() -> PatientKey {
        PatientKey::new("444-55-6666", "Bo Chen")
    }

    #[tokio::test]
    async fn test_patient_sees_only_own_prescriptions() {
        let state = seeded_state().await;
        let records = Records::new(state.clone());
        let session = session_for(&state, "ana", Principal::Patient(ana())).await;

        let own = records.prescriptions_for_patient(&session, &ana()).await.unwrap();
        assert_eq!(own.len(), 2);
        // Newest first
        assert_eq!(own[0].id, 3);
        assert!(own.iter().all(|p| p.status == FulfillmentStatus::Pending));

        let err = records.prescriptions_for_patient(&session, &bo()).await.unwrap_err();
        assert!(matches!(err, ClinicError::Authz(AuthzError::NotOwner { .. })));
    }

    #[tokio::test]
    async fn test_doctor_sees_only_prescriptions_they_wrote() {
        let state = seeded_state().await;
        let records = Records::new(state.clone());
        let reyes = session_for(&state, "reyes", Principal::Doctor { doctor_id: 2 }).await;

        // Ana has prescriptions from doctors 1 and 2
        let rows = records.prescriptions_for_patient(&reyes, &ana()).await.unwrap();
        assert_eq!(rows.iter().map(|p| p.id).collect::<Vec<_>>(), vec![3]);

        assert_eq!(records.prescriptions_by_doctor(&reyes, 2).await.unwrap().len(), 2);
        assert!(records.prescriptions_by_doctor(&reyes, 1).await.is_err());

        let err = records.prescription_detail(&reyes, 1).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::Forbidden);
    }

    #[tokio::test]
    async fn test_prescription_detail() {
        let state = seeded_state().await;
        let records = Records::new(state.clone());
        let admin = session_for(&state, "root", Principal::Admin).await;

        let detail = records.prescription_detail(&admin, 4).await.unwrap();
        assert_eq!(detail.medications, vec!["Metformin".to_string()]);
        assert_eq!(detail.status(), FulfillmentStatus::Dispensed);
        assert_eq!(detail.dispense.unwrap().pharmacist_id, 2);

        let err = records.prescription_detail(&admin, 99).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::NotFound);
    }

    #[tokio::test]
    async fn test_doctor_writes_prescription_for_self_only() {
        let state = seeded_state().await;
        let records = Records::new(state.clone());
        let osei = session_for(&state, "osei", Principal::Doctor { doctor_id: 1 }).await;

        let mut new = NewPrescription {
            doctor_id: 1,
            patient: bo(),
            dosage: "One tablet nightly".to_string(),
            medications: vec!["Atorvastatin".to_string(), "Ibuprofen".to_string()],
        };

        let prescription = records.create_prescription(&osei, &new).await.unwrap();
        assert_eq!(prescription.date, Utc::now().date_naive());
        assert_eq!(
            state.db.prescriptions().composition(prescription.id).await.unwrap(),
            vec!["Atorvastatin".to_string(), "Ibuprofen".to_string()]
        );

        new.doctor_id = 2;
        let err = records.create_prescription(&osei, &new).await.unwrap_err();
        assert!(matches!(err, ClinicError::Authz(AuthzError::NotOwner { .. })));
    }

    #[tokio::test]
    async fn test_unknown_medication_rolls_back_new_prescription() {
        let state = seeded_state().await;
        let records = Records::new(state.clone());
        let osei = session_for(&state, "osei", Principal::Doctor { doctor_id: 1 }).await;
        let before = state.db.prescriptions().list_for_doctor(1).await.unwrap().len();

        let err = records
            .create_prescription(
                &osei,
                &NewPrescription {
                    doctor_id: 1,
                    patient: ana(),
                    dosage: "As directed".to_string(),
                    medications: vec!["Ibuprofen".to_string(), "Snake Oil".to_string()],
                },
            )
            .await
            .unwrap_err();

        assert!(matches!(err, ClinicError::IntegrityViolation(_)));
        assert_eq!(
            state.db.prescriptions().list_for_doctor(1).await.unwrap().len(),
            before
        );
    }

    #[tokio::test]
    async fn test_admin_edits_composition() {
        let state = seeded_state().await;
        let records = Records::new(state.clone());
        let admin = session_for(&state, "root", Principal::Admin).await;

        records.add_medication(&admin, 5, "Ibuprofen").await.unwrap();
        assert_eq!(
            state.db.prescriptions().composition(5).await.unwrap(),
            vec!["Ibuprofen".to_string()]
        );

        let err = records.add_medication(&admin, 5, "Ibuprofen").await.unwrap_err();
        assert!(matches!(err, ClinicError::IntegrityViolation(_)));

        let err = records.add_medication(&admin, 5, "Snake Oil").await.unwrap_err();
        assert!(matches!(err, ClinicError::IntegrityViolation(_)));

        records.remove_medication(&admin, 5, "Ibuprofen").await.unwrap();
        let err = records.remove_medication(&admin, 5, "Ibuprofen").await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::NotFound);

        // Dispensed prescriptions are closed
        let err = records.add_medication(&admin, 4, "Ibuprofen").await.unwrap_err();
        assert!(matches!(err, ClinicError::Dispense(DispenseError::AlreadyDispensed(4))));
    }

    #[tokio::test]
    async fn test_composition_edit_racing_a_dispense() {
        let state = seeded_state().await;
        let records = Records::new(state.clone());
        let engine = DispensingEngine::new(state.clone());
        let admin = session_for(&state, "root", Principal::Admin).await;
        let sam = session_for(&state, "sam", Principal::Pharmacist { pharmacist_id: 1 }).await;

        let (dispensed, edited) = tokio::join!(
            engine.dispense(&sam, 1),
            records.add_medication(&admin, 1, "Metformin")
        );

        assert_dispensed_matches_composition(&state, dispensed.unwrap(), edited).await;
    }

    #[tokio::test]
    async fn test_composition_edit_racing_a_dispense_on_shared_file() {
        let (state, path) = file_state().await;
        let admin = session_for(&state, "root", Principal::Admin).await;
        let sam = session_for(&state, "sam", Principal::Pharmacist { pharmacist_id: 1 }).await;

        let dispense = tokio::spawn({
            let engine = DispensingEngine::new(state.clone());
            async move { engine.dispense(&sam, 1).await }
        });
        let edit = tokio::spawn({
            let records = Records::new(state.clone());
            async move { records.add_medication(&admin, 1, "Metformin").await }
        });

        let dispensed = dispense.await.unwrap().unwrap();
        let edited = edit.await.unwrap();
        assert_dispensed_matches_composition(&state, dispensed, edited).await;

        state.db.close().await;
        let _ = std::fs::remove_file(&path);
    }

    /// A dispensed prescription's composition is exactly what was dispensed.
    async fn assert_dispensed_matches_composition(
        state: &AppState,
        dispensed: DispenseResult,
        edited: ClinicResult<()>,
    ) {
        let names: Vec<String> = dispensed.medications.into_iter().map(|m| m.name).collect();
        assert_eq!(state.db.prescriptions().composition(1).await.unwrap(), names);

        match edited {
            Ok(()) => assert!(names.iter().any(|name| name == "Metformin")),
            Err(err) => {
                assert!(matches!(err, ClinicError::Dispense(DispenseError::AlreadyDispensed(1))));
                assert_eq!(names, ["Amoxicillin", "Ibuprofen"]);
            }
        }
    }

    #[tokio::test]
    async fn test_only_admin_edits_composition() {
        let state = seeded_state().await;
        let records = Records::new(state.clone());
        let osei = session_for(&state, "osei", Principal::Doctor { doctor_id: 1 }).await;

        let err = records.add_medication(&osei, 1, "Metformin").await.unwrap_err();
        assert!(matches!(err, ClinicError::Authz(AuthzError::RoleNotPermitted { .. })));
    }

    #[tokio::test]
    async fn test_appointments_are_scoped() {
        let state = seeded_state().await;
        let records = Records::new(state.clone());

        let admin = session_for(&state, "root", Principal::Admin).await;
        assert_eq!(records.list_appointments(&admin).await.unwrap().len(), 3);

        let park = session_for(&state, "park", Principal::Doctor { doctor_id: 3 }).await;
        let rows = records.list_appointments(&park).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].patient_name, "Carla Diaz");

        let lee = session_for(&state, "lee", Principal::Pharmacist { pharmacist_id: 2 }).await;
        assert!(records.list_appointments(&lee).await.is_err());
    }

    #[tokio::test]
    async fn test_patient_books_own_appointment() {
        let state = seeded_state().await;
        let records = Records::new(state.clone());
        let session = session_for(&state, "ana", Principal::Patient(ana())).await;

        let booked = records
            .create_appointment(&session, ana(), 2, "2024-06-01 10:00:00")
            .await
            .unwrap();
        assert_eq!(booked.doctor_id, 2);
        assert_eq!(records.list_appointments(&session).await.unwrap().len(), 2);

        let err = records
            .create_appointment(&session, bo(), 2, "2024-06-01 10:00:00")
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::Forbidden);

        let err = records
            .create_appointment(&session, ana(), 2, "next tuesday")
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::ValidationError);

        let err = records
            .create_appointment(&session, ana(), 42, "2024-06-01 10:00:00")
            .await
            .unwrap_err();
        assert!(matches!(err, ClinicError::IntegrityViolation(_)));
    }

    #[tokio::test]
    async fn test_insurance_and_patients() {
        let state = seeded_state().await;
        let records = Records::new(state.clone());
        let session = session_for(&state, "ana", Principal::Patient(ana())).await;

        let policies = records.insurance_for(&session, &ana()).await.unwrap();
        assert_eq!(policies[0].policy_number, "POL-1001");
        assert!(records.insurance_for(&session, &bo()).await.is_err());
        assert!(records.list_patients(&session).await.is_err());

        let osei = session_for(&state, "osei", Principal::Doctor { doctor_id: 1 }).await;
        let names: Vec<_> = records
            .list_patients(&osei)
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(names, ["Ana Li", "Bo Chen", "Carla Diaz"]);
    }

    #[tokio::test]
    async fn test_pharmacist_capabilities() {
        let state = seeded_state().await;
        let records = Records::new(state.clone());
        let rae = session_for(&state, "rae", Principal::Pharmacist { pharmacist_id: 3 }).await;

        let (me, caps) = records.pharmacist_capabilities(&rae, 3).await.unwrap();
        assert_eq!(me.name, "Rae Kim");
        assert!(caps.inventory_manager && !caps.dispenser);

        assert!(records.pharmacist_capabilities(&rae, 1).await.is_err());

        let account = records.account(&rae).await.unwrap();
        assert_eq!(account.username, "rae");
    }
}
