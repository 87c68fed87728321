//! # Prescription Repository
//!
//! Prescriptions and their composition (the `Contains` table).
//!
//! ## Prescription Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  1. CREATE                                                             │
//! │     └── create() → Prescription + Contains rows, one transaction       │
//! │                                                                         │
//! │  2. (OPTIONAL) EDIT COMPOSITION                                        │
//! │     └── add_medication() / remove_medication()                         │
//! │                                                                         │
//! │  3. DISPENSE (see DispenseRepository)                                  │
//! │     └── composition_in(&mut *tx) read inside the dispense transaction  │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::NaiveDate;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use crate::repository::dispense::DispenseRepository;
use clinic_core::{
    FulfillmentStatus, NewPrescription, PatientKey, Prescription, PrescriptionDetail,
    PrescriptionSummary,
};

#[derive(Debug, sqlx::FromRow)]
struct PrescriptionRow {
    prescription_id: i64,
    doctor_id: i64,
    patient_ssn: String,
    patient_name: String,
    dosage: String,
    date: NaiveDate,
}

impl From<PrescriptionRow> for Prescription {
    fn from(row: PrescriptionRow) -> Self {
        Prescription {
            id: row.prescription_id,
            doctor_id: row.doctor_id,
            patient: PatientKey {
                ssn: row.patient_ssn,
                name: row.patient_name,
            },
            dosage: row.dosage,
            date: row.date,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SummaryRow {
    prescription_id: i64,
    date: NaiveDate,
    doctor_name: String,
    patient_ssn: String,
    patient_name: String,
    dispensed: bool,
}

impl From<SummaryRow> for PrescriptionSummary {
    fn from(row: SummaryRow) -> Self {
        PrescriptionSummary {
            id: row.prescription_id,
            date: row.date,
            doctor_name: row.doctor_name,
            patient: PatientKey {
                ssn: row.patient_ssn,
                name: row.patient_name,
            },
            status: if row.dispensed {
                FulfillmentStatus::Dispensed
            } else {
                FulfillmentStatus::Pending
            },
        }
    }
}

const SELECT_SUMMARY: &str = r#"
    SELECT p.prescription_id,
           p.date,
           d.name AS doctor_name,
           p.patient_ssn,
           p.patient_name,
           md.prescription_id IS NOT NULL AS dispensed
    FROM Prescription p
    JOIN Doctor d ON d.id = p.doctor_id
    LEFT JOIN Medication_dispensed md ON md.prescription_id = p.prescription_id
"#;

/// Repository for prescription database operations.
#[derive(Debug, Clone)]
pub struct PrescriptionRepository {
    pool: SqlitePool,
}

impl PrescriptionRepository {
    /// Creates a new PrescriptionRepository.
    pub fn new(pool: SqlitePool) -> Self {
        PrescriptionRepository { pool }
    }

    /// Gets a prescription by ID.
    pub async fn get_by_id(&self, id: i64) -> DbResult<Option<Prescription>> {
        let row = sqlx::query_as::<_, PrescriptionRow>(
            r#"
            SELECT prescription_id, doctor_id, patient_ssn, patient_name, dosage, date
            FROM Prescription
            WHERE prescription_id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Prescription::from))
    }

    /// Gets a prescription with prescriber name, composition and dispense record.
    pub async fn detail(&self, id: i64) -> DbResult<Option<PrescriptionDetail>> {
        let Some(prescription) = self.get_by_id(id).await? else {
            return Ok(None);
        };

        let doctor_name: String = sqlx::query_scalar("SELECT name FROM Doctor WHERE id = ?1")
            .bind(prescription.doctor_id)
            .fetch_one(&self.pool)
            .await?;

        let medications = self.composition(id).await?;
        let dispense = DispenseRepository::new(self.pool.clone()).get(id).await?;

        Ok(Some(PrescriptionDetail {
            prescription,
            doctor_name,
            medications,
            dispense,
        }))
    }

    /// Lists a patient's prescriptions, newest first.
    ///
    /// ## Arguments
    /// * `key` - the patient
    /// * `doctor_id` - when set, only prescriptions written by this doctor
    pub async fn list_for_patient(
        &self,
        key: &PatientKey,
        doctor_id: Option<i64>,
    ) -> DbResult<Vec<PrescriptionSummary>> {
        let sql = format!(
            r#"{}
            WHERE p.patient_ssn = ?1 AND p.patient_name = ?2
              AND (?3 IS NULL OR p.doctor_id = ?3)
            ORDER BY p.date DESC, p.prescription_id DESC
            "#,
            SELECT_SUMMARY
        );

        let rows = sqlx::query_as::<_, SummaryRow>(&sql)
            .bind(&key.ssn)
            .bind(&key.name)
            .bind(doctor_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(PrescriptionSummary::from).collect())
    }

    /// Lists every prescription written by one doctor, newest first.
    pub async fn list_for_doctor(&self, doctor_id: i64) -> DbResult<Vec<PrescriptionSummary>> {
        let sql = format!(
            r#"{}
            WHERE p.doctor_id = ?1
            ORDER BY p.date DESC, p.prescription_id DESC
            "#,
            SELECT_SUMMARY
        );

        let rows = sqlx::query_as::<_, SummaryRow>(&sql)
            .bind(doctor_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(PrescriptionSummary::from).collect())
    }

    // =========================================================================
    // Composition
    // =========================================================================

    /// Medication names on a prescription, ascending.
    pub async fn composition(&self, id: i64) -> DbResult<Vec<String>> {
        let mut conn = self.pool.acquire().await?;
        Self::composition_in(&mut conn, id).await
    }

    /// Medication names on a prescription, ascending, read on `conn`.
    ///
    /// The ascending order is the order the dispense transaction touches
    /// medication rows in.
    pub async fn composition_in(conn: &mut SqliteConnection, id: i64) -> DbResult<Vec<String>> {
        let names: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT medication_name
            FROM Contains
            WHERE prescription_id = ?1
            ORDER BY medication_name ASC
            "#,
        )
        .bind(id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(names)
    }

    /// Adds one medication to a prescription, on `conn`.
    ///
    /// ## Errors
    /// * `UniqueViolation` - already on the prescription
    /// * `ForeignKeyViolation` - unknown medication or prescription
    pub async fn add_medication_in(
        conn: &mut SqliteConnection,
        id: i64,
        medication: &str,
    ) -> DbResult<()> {
        debug!(prescription_id = id, medication = %medication, "Adding medication to prescription");

        sqlx::query("INSERT INTO Contains (prescription_id, medication_name) VALUES (?1, ?2)")
            .bind(id)
            .bind(medication)
            .execute(&mut *conn)
            .await?;

        Ok(())
    }

    /// Removes one medication from a prescription, on `conn`.
    ///
    /// ## Returns
    /// `false` when the pair was not present.
    pub async fn remove_medication_in(
        conn: &mut SqliteConnection,
        id: i64,
        medication: &str,
    ) -> DbResult<bool> {
        debug!(prescription_id = id, medication = %medication, "Removing medication from prescription");

        let result =
            sqlx::query("DELETE FROM Contains WHERE prescription_id = ?1 AND medication_name = ?2")
                .bind(id)
                .bind(medication)
                .execute(&mut *conn)
                .await?;

        Ok(result.rows_affected() > 0)
    }

    // =========================================================================
    // Creation
    // =========================================================================

    /// Creates a prescription and its initial composition in one transaction.
    ///
    /// ## Arguments
    /// * `new` - prescriber, patient, dosage and medication names
    /// * `date` - date written on the prescription
    ///
    /// ## Errors
    /// Any constraint failure rolls back the whole prescription.
    pub async fn create(&self, new: &NewPrescription, date: NaiveDate) -> DbResult<Prescription> {
        debug!(
            doctor_id = new.doctor_id,
            medications = new.medications.len(),
            "Creating prescription"
        );

        let mut tx = self.pool.begin().await?;

        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO Prescription (doctor_id, patient_ssn, patient_name, dosage, date)
            VALUES (?1, ?2, ?3, ?4, ?5)
            RETURNING prescription_id
            "#,
        )
        .bind(new.doctor_id)
        .bind(&new.patient.ssn)
        .bind(&new.patient.name)
        .bind(&new.dosage)
        .bind(date)
        .fetch_one(&mut *tx)
        .await?;

        for medication in &new.medications {
            sqlx::query("INSERT INTO Contains (prescription_id, medication_name) VALUES (?1, ?2)")
                .bind(id)
                .bind(medication)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        Ok(Prescription {
            id,
            doctor_id: new.doctor_id,
            patient: new.patient.clone(),
            dosage: new.dosage.clone(),
            date,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seed::{self, SeedData};
    use crate::{Database, DbConfig, DbError};

    async fn seeded() -> Database {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        seed::apply(&db, &SeedData::sample().unwrap()).await.unwrap();
        db
    }

    fn ana() -> PatientKey {
        PatientKey::new("111-22-3333", "Ana Li")
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[tokio::test]
    async fn test_create_with_composition() {
        let db = seeded().await;
        let repo = db.prescriptions();

        let created = repo
            .create(
                &NewPrescription {
                    doctor_id: 1,
                    patient: ana(),
                    dosage: "Twice daily with food".into(),
                    medications: vec!["Metformin".into(), "Amoxicillin".into()],
                },
                date("2030-01-15"),
            )
            .await
            .unwrap();

        assert_eq!(
            repo.composition(created.id).await.unwrap(),
            vec!["Amoxicillin", "Metformin"]
        );

        let detail = repo.detail(created.id).await.unwrap().unwrap();
        assert_eq!(detail.status(), FulfillmentStatus::Pending);
        assert_eq!(detail.prescription.patient, ana());
    }

    #[tokio::test]
    async fn test_create_rolls_back_on_unknown_medication() {
        let db = seeded().await;
        let repo = db.prescriptions();
        let before = repo.list_for_patient(&ana(), None).await.unwrap().len();

        let err = repo
            .create(
                &NewPrescription {
                    doctor_id: 1,
                    patient: ana(),
                    dosage: "Once".into(),
                    medications: vec!["Amoxicillin".into(), "Snake Oil".into()],
                },
                date("2030-01-15"),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, DbError::ForeignKeyViolation { .. }));
        assert_eq!(repo.list_for_patient(&ana(), None).await.unwrap().len(), before);
    }

    #[tokio::test]
    async fn test_list_for_patient_newest_first_and_doctor_filter() {
        let db = seeded().await;
        let repo = db.prescriptions();

        let all = repo.list_for_patient(&ana(), None).await.unwrap();
        assert!(!all.is_empty());
        assert!(all.windows(2).all(|w| w[0].date >= w[1].date));
        assert!(all.iter().all(|s| s.patient == ana()));

        let by_two = repo.list_for_patient(&ana(), Some(2)).await.unwrap();
        assert!(by_two.len() <= all.len());
        for summary in &by_two {
            let p = repo.get_by_id(summary.id).await.unwrap().unwrap();
            assert_eq!(p.doctor_id, 2);
        }
    }

    #[tokio::test]
    async fn test_duplicate_composition_pair() {
        let db = seeded().await;
        let repo = db.prescriptions();
        let existing = repo.composition(1).await.unwrap();
        let first = existing.first().cloned().unwrap();

        let mut tx = db.begin().await.unwrap();
        let err = PrescriptionRepository::add_medication_in(&mut *tx, 1, &first)
            .await
            .unwrap_err();
        assert!(err.is_unique_violation_on("Contains"));

        assert!(PrescriptionRepository::remove_medication_in(&mut *tx, 1, &first).await.unwrap());
        assert!(!PrescriptionRepository::remove_medication_in(&mut *tx, 1, &first).await.unwrap());
        Database::commit(tx).await.unwrap();

        assert!(!repo.composition(1).await.unwrap().contains(&first));
    }
}
