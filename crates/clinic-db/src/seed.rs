//! # Seed Loading
//!
//! Loads a [`SeedData`] JSON document into a freshly migrated database.
//! A sample document is embedded at compile time; the `seed` binary and the
//! test suites both use it.
//!
//! ## Load Order
//! ```text
//! doctors → patients → pharmacists (+ capability markers) → medications
//!         → prescriptions (+ composition, + dispense record if any)
//!         → appointments → insurance
//! ```
//! Foreign keys are enforced, so the order matters.

use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use tracing::info;

use crate::error::{DbError, DbResult};
use crate::pool::Database;
use crate::repository::dispense::DispenseRepository;
use clinic_core::validation::parse_appointment_time;
use clinic_core::{
    DispenseRecord, Doctor, InsurancePolicy, Medication, NewAppointment, NewPrescription, Patient,
    PatientKey, Pharmacist, PharmacistCapabilities,
};

/// Embedded sample document.
pub const SAMPLE_DATA: &str = include_str!("../seed/sample_data.json");

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SeedData {
    pub doctors: Vec<Doctor>,
    pub patients: Vec<Patient>,
    pub pharmacists: Vec<SeedPharmacist>,
    pub medications: Vec<Medication>,
    pub prescriptions: Vec<SeedPrescription>,
    pub appointments: Vec<SeedAppointment>,
    pub insurance: Vec<InsurancePolicy>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeedPharmacist {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub dispenser: bool,
    #[serde(default)]
    pub inventory_manager: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeedPrescription {
    pub doctor_id: i64,
    pub patient: PatientKey,
    pub dosage: String,
    pub date: NaiveDate,
    #[serde(default)]
    pub medications: Vec<String>,
    /// Pharmacist who already dispensed it, for historical rows.
    #[serde(default)]
    pub dispensed_by: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeedAppointment {
    pub patient: PatientKey,
    pub doctor_id: i64,
    /// `YYYY-MM-DD HH:MM:SS`
    pub scheduled_at: String,
}

/// Row counts written by [`apply`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedSummary {
    pub doctors: usize,
    pub patients: usize,
    pub pharmacists: usize,
    pub medications: usize,
    pub prescriptions: usize,
    pub appointments: usize,
    pub insurance: usize,
}

impl SeedData {
    /// Parses a seed document.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// The embedded sample document.
    pub fn sample() -> Result<Self, serde_json::Error> {
        Self::from_json(SAMPLE_DATA)
    }
}

/// True when no directory or inventory rows exist yet.
pub async fn is_empty(db: &Database) -> DbResult<bool> {
    let rows: i64 = sqlx::query_scalar(
        "SELECT (SELECT COUNT(*) FROM Doctor) + (SELECT COUNT(*) FROM Medication)",
    )
    .fetch_one(db.pool())
    .await?;

    Ok(rows == 0)
}

/// Writes every row of `data`.
///
/// Stops at the first failing row; rows already written stay.
pub async fn apply(db: &Database, data: &SeedData) -> DbResult<SeedSummary> {
    let directory = db.directory();

    for doctor in &data.doctors {
        directory.insert_doctor(doctor).await?;
    }

    for patient in &data.patients {
        directory.insert_patient(patient).await?;
    }

    for pharmacist in &data.pharmacists {
        directory
            .insert_pharmacist(
                &Pharmacist {
                    id: pharmacist.id,
                    name: pharmacist.name.clone(),
                },
                PharmacistCapabilities {
                    dispenser: pharmacist.dispenser,
                    inventory_manager: pharmacist.inventory_manager,
                },
            )
            .await?;
    }

    for medication in &data.medications {
        db.medications().insert(medication).await?;
    }

    for seed in &data.prescriptions {
        let prescription = db
            .prescriptions()
            .create(
                &NewPrescription {
                    doctor_id: seed.doctor_id,
                    patient: seed.patient.clone(),
                    dosage: seed.dosage.clone(),
                    medications: seed.medications.clone(),
                },
                seed.date,
            )
            .await?;

        if let Some(pharmacist_id) = seed.dispensed_by {
            let dispensed_at = seed
                .date
                .and_hms_opt(12, 0, 0)
                .map(|dt| dt.and_utc())
                .unwrap_or_else(Utc::now);

            let mut tx = db.begin().await?;
            DispenseRepository::insert(
                &mut *tx,
                &DispenseRecord {
                    prescription_id: prescription.id,
                    pharmacist_id,
                    dispensed_at,
                },
            )
            .await?;
            tx.commit().await?;
        }
    }

    for seed in &data.appointments {
        let scheduled_at = parse_appointment_time(&seed.scheduled_at)
            .map_err(|e| DbError::InvalidRecord(e.to_string()))?;

        db.appointments()
            .insert(&NewAppointment {
                patient: seed.patient.clone(),
                doctor_id: seed.doctor_id,
                scheduled_at,
            })
            .await?;
    }

    for policy in &data.insurance {
        directory.insert_insurance(policy).await?;
    }

    let summary = SeedSummary {
        doctors: data.doctors.len(),
        patients: data.patients.len(),
        pharmacists: data.pharmacists.len(),
        medications: data.medications.len(),
        prescriptions: data.prescriptions.len(),
        appointments: data.appointments.len(),
        insurance: data.insurance.len(),
    };

    info!(?summary, "Seed data applied");
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DbConfig;

    #[tokio::test]
    async fn test_sample_loads_into_empty_database() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        assert!(is_empty(&db).await.unwrap());

        let data = SeedData::sample().unwrap();
        let summary = apply(&db, &data).await.unwrap();

        assert_eq!(summary.medications, data.medications.len());
        assert!(!is_empty(&db).await.unwrap());
        assert_eq!(db.medications().list().await.unwrap().len(), data.medications.len());
    }

    #[tokio::test]
    async fn test_historical_dispense_is_recorded() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let data = SeedData::sample().unwrap();
        apply(&db, &data).await.unwrap();

        let dispensed = data
            .prescriptions
            .iter()
            .position(|p| p.dispensed_by.is_some())
            .unwrap() as i64
            + 1;

        assert!(db.dispenses().is_dispensed(dispensed).await.unwrap());
    }

    #[test]
    fn test_partial_document_defaults() {
        let data = SeedData::from_json(r#"{ "doctors": [{ "id": 9, "name": "Dr. Solo", "specialty": null }] }"#)
            .unwrap();

        assert_eq!(data.doctors.len(), 1);
        assert!(data.medications.is_empty());
    }
}
