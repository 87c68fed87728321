//! # Directory Repository
//!
//! Patients, doctors, pharmacists, pharmacist capability markers and
//! insurance policies. These tables are read far more than written; the
//! insert methods exist for seeding.

use sqlx::SqlitePool;
use tracing::debug;

use crate::error::DbResult;
use clinic_core::{
    Doctor, InsurancePolicy, Patient, PatientKey, Pharmacist, PharmacistCapabilities,
};

#[derive(Debug, sqlx::FromRow)]
struct PatientRow {
    ssn: String,
    name: String,
    age: Option<i64>,
    phone: Option<String>,
    primary_doctor_id: Option<i64>,
}

impl From<PatientRow> for Patient {
    fn from(row: PatientRow) -> Self {
        Patient {
            ssn: row.ssn,
            name: row.name,
            age: row.age,
            phone: row.phone,
            primary_doctor_id: row.primary_doctor_id,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct DoctorRow {
    id: i64,
    name: String,
    specialty: Option<String>,
}

#[derive(Debug, sqlx::FromRow)]
struct PharmacistRow {
    id: i64,
    name: String,
}

#[derive(Debug, sqlx::FromRow)]
struct CapabilityRow {
    dispenser: bool,
    inventory_manager: bool,
}

#[derive(Debug, sqlx::FromRow)]
struct InsuranceRow {
    policy_number: String,
    patient_ssn: String,
    patient_name: String,
    provider: String,
    coverage: Option<String>,
}

impl From<InsuranceRow> for InsurancePolicy {
    fn from(row: InsuranceRow) -> Self {
        InsurancePolicy {
            policy_number: row.policy_number,
            patient: PatientKey {
                ssn: row.patient_ssn,
                name: row.patient_name,
            },
            provider: row.provider,
            coverage: row.coverage,
        }
    }
}

/// Repository for directory tables.
#[derive(Debug, Clone)]
pub struct DirectoryRepository {
    pool: SqlitePool,
}

impl DirectoryRepository {
    /// Creates a new DirectoryRepository.
    pub fn new(pool: SqlitePool) -> Self {
        DirectoryRepository { pool }
    }

    // =========================================================================
    // Patients
    // =========================================================================

    /// Lists every patient, ordered by name.
    pub async fn list_patients(&self) -> DbResult<Vec<Patient>> {
        let rows = sqlx::query_as::<_, PatientRow>(
            r#"
            SELECT ssn, name, age, phone, primary_doctor_id
            FROM Patient
            ORDER BY name, ssn
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Patient::from).collect())
    }

    /// Gets a patient by the exact (ssn, name) pair.
    pub async fn get_patient(&self, key: &PatientKey) -> DbResult<Option<Patient>> {
        let row = sqlx::query_as::<_, PatientRow>(
            r#"
            SELECT ssn, name, age, phone, primary_doctor_id
            FROM Patient
            WHERE ssn = ?1 AND name = ?2
            "#,
        )
        .bind(&key.ssn)
        .bind(&key.name)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Patient::from))
    }

    pub async fn patient_exists(&self, key: &PatientKey) -> DbResult<bool> {
        Ok(self.get_patient(key).await?.is_some())
    }

    pub async fn insert_patient(&self, patient: &Patient) -> DbResult<()> {
        debug!(ssn = %patient.ssn, name = %patient.name, "Inserting patient");

        sqlx::query(
            r#"
            INSERT INTO Patient (ssn, name, age, phone, primary_doctor_id)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(&patient.ssn)
        .bind(&patient.name)
        .bind(patient.age)
        .bind(&patient.phone)
        .bind(patient.primary_doctor_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    // =========================================================================
    // Doctors
    // =========================================================================

    pub async fn get_doctor(&self, id: i64) -> DbResult<Option<Doctor>> {
        let row = sqlx::query_as::<_, DoctorRow>(
            "SELECT id, name, specialty FROM Doctor WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| Doctor {
            id: r.id,
            name: r.name,
            specialty: r.specialty,
        }))
    }

    pub async fn list_doctors(&self) -> DbResult<Vec<Doctor>> {
        let rows = sqlx::query_as::<_, DoctorRow>(
            "SELECT id, name, specialty FROM Doctor ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| Doctor {
                id: r.id,
                name: r.name,
                specialty: r.specialty,
            })
            .collect())
    }

    pub async fn insert_doctor(&self, doctor: &Doctor) -> DbResult<()> {
        debug!(doctor_id = doctor.id, "Inserting doctor");

        sqlx::query("INSERT INTO Doctor (id, name, specialty) VALUES (?1, ?2, ?3)")
            .bind(doctor.id)
            .bind(&doctor.name)
            .bind(&doctor.specialty)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    // =========================================================================
    // Pharmacists
    // =========================================================================

    pub async fn get_pharmacist(&self, id: i64) -> DbResult<Option<Pharmacist>> {
        let row = sqlx::query_as::<_, PharmacistRow>(
            "SELECT id, name FROM Pharmacist WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| Pharmacist {
            id: r.id,
            name: r.name,
        }))
    }

    /// Inserts a pharmacist together with its capability markers.
    pub async fn insert_pharmacist(
        &self,
        pharmacist: &Pharmacist,
        capabilities: PharmacistCapabilities,
    ) -> DbResult<()> {
        debug!(
            pharmacist_id = pharmacist.id,
            dispenser = capabilities.dispenser,
            inventory_manager = capabilities.inventory_manager,
            "Inserting pharmacist"
        );

        let mut tx = self.pool.begin().await?;

        sqlx::query("INSERT INTO Pharmacist (id, name) VALUES (?1, ?2)")
            .bind(pharmacist.id)
            .bind(&pharmacist.name)
            .execute(&mut *tx)
            .await?;

        if capabilities.dispenser {
            sqlx::query("INSERT INTO Dispenser (pharmacist_id) VALUES (?1)")
                .bind(pharmacist.id)
                .execute(&mut *tx)
                .await?;
        }

        if capabilities.inventory_manager {
            sqlx::query("INSERT INTO Inventory_manager (pharmacist_id) VALUES (?1)")
                .bind(pharmacist.id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Reads the capability markers held by a pharmacist.
    ///
    /// An unknown pharmacist holds none.
    pub async fn capabilities(&self, pharmacist_id: i64) -> DbResult<PharmacistCapabilities> {
        let row = sqlx::query_as::<_, CapabilityRow>(
            r#"
            SELECT
                EXISTS (SELECT 1 FROM Dispenser WHERE pharmacist_id = ?1) AS dispenser,
                EXISTS (SELECT 1 FROM Inventory_manager WHERE pharmacist_id = ?1) AS inventory_manager
            "#,
        )
        .bind(pharmacist_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(PharmacistCapabilities {
            dispenser: row.dispenser,
            inventory_manager: row.inventory_manager,
        })
    }

    // =========================================================================
    // Insurance
    // =========================================================================

    /// Lists the insurance policies held by one patient.
    pub async fn insurance_for(&self, key: &PatientKey) -> DbResult<Vec<InsurancePolicy>> {
        let rows = sqlx::query_as::<_, InsuranceRow>(
            r#"
            SELECT policy_number, patient_ssn, patient_name, provider, coverage
            FROM Insurance
            WHERE patient_ssn = ?1 AND patient_name = ?2
            ORDER BY policy_number
            "#,
        )
        .bind(&key.ssn)
        .bind(&key.name)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(InsurancePolicy::from).collect())
    }

    pub async fn insert_insurance(&self, policy: &InsurancePolicy) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO Insurance (policy_number, patient_ssn, patient_name, provider, coverage)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(&policy.policy_number)
        .bind(&policy.patient.ssn)
        .bind(&policy.patient.name)
        .bind(&policy.provider)
        .bind(&policy.coverage)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig, DbError};

    #[tokio::test]
    async fn test_capabilities_reflect_markers() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let dir = db.directory();

        let both = PharmacistCapabilities {
            dispenser: true,
            inventory_manager: true,
        };
        dir.insert_pharmacist(&Pharmacist { id: 1, name: "Pat Both".into() }, both)
            .await
            .unwrap();
        dir.insert_pharmacist(
            &Pharmacist { id: 2, name: "Pat None".into() },
            PharmacistCapabilities::none(),
        )
        .await
        .unwrap();

        assert_eq!(dir.capabilities(1).await.unwrap(), both);
        assert_eq!(dir.capabilities(2).await.unwrap(), PharmacistCapabilities::none());
        assert_eq!(dir.capabilities(99).await.unwrap(), PharmacistCapabilities::none());
    }

    #[tokio::test]
    async fn test_patient_lookup_needs_both_key_halves() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let dir = db.directory();

        dir.insert_patient(&Patient {
            ssn: "111-22-3333".into(),
            name: "Ana Li".into(),
            age: Some(34),
            phone: None,
            primary_doctor_id: None,
        })
        .await
        .unwrap();

        assert!(dir
            .patient_exists(&PatientKey::new("111-22-3333", "Ana Li"))
            .await
            .unwrap());
        assert!(!dir
            .patient_exists(&PatientKey::new("111-22-3333", "Ana Lee"))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_insurance_requires_known_patient() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        let err = db
            .directory()
            .insert_insurance(&InsurancePolicy {
                policy_number: "P-1".into(),
                patient: PatientKey::new("000", "Nobody"),
                provider: "Acme Health".into(),
                coverage: None,
            })
            .await
            .unwrap_err();

        assert!(matches!(err, DbError::ForeignKeyViolation { .. }));
    }
}
