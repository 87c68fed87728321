//! # Dispense Record Repository
//!
//! `Medication_dispensed` is the only record of fulfillment. Its primary key
//! on `prescription_id` makes a second record for the same prescription a
//! `UniqueViolation`, whoever inserts it and whenever.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use clinic_core::DispenseRecord;

#[derive(Debug, sqlx::FromRow)]
struct DispenseRow {
    prescription_id: i64,
    pharmacist_id: i64,
    dispensed_at: DateTime<Utc>,
}

impl From<DispenseRow> for DispenseRecord {
    fn from(row: DispenseRow) -> Self {
        DispenseRecord {
            prescription_id: row.prescription_id,
            pharmacist_id: row.pharmacist_id,
            dispensed_at: row.dispensed_at,
        }
    }
}

/// Repository for dispense records.
#[derive(Debug, Clone)]
pub struct DispenseRepository {
    pool: SqlitePool,
}

impl DispenseRepository {
    /// Creates a new DispenseRepository.
    pub fn new(pool: SqlitePool) -> Self {
        DispenseRepository { pool }
    }

    /// Gets the dispense record of a prescription, if it was dispensed.
    pub async fn get(&self, prescription_id: i64) -> DbResult<Option<DispenseRecord>> {
        let mut conn = self.pool.acquire().await?;
        Self::get_in(&mut conn, prescription_id).await
    }

    /// Gets the dispense record on `conn`, seeing the open transaction's view.
    pub async fn get_in(
        conn: &mut SqliteConnection,
        prescription_id: i64,
    ) -> DbResult<Option<DispenseRecord>> {
        let row = sqlx::query_as::<_, DispenseRow>(
            r#"
            SELECT prescription_id, pharmacist_id, dispensed_at
            FROM Medication_dispensed
            WHERE prescription_id = ?1
            "#,
        )
        .bind(prescription_id)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(row.map(DispenseRecord::from))
    }

    pub async fn is_dispensed(&self, prescription_id: i64) -> DbResult<bool> {
        Ok(self.get(prescription_id).await?.is_some())
    }

    pub async fn is_dispensed_in(conn: &mut SqliteConnection, prescription_id: i64) -> DbResult<bool> {
        Ok(Self::get_in(conn, prescription_id).await?.is_some())
    }

    /// Number of records for a prescription. Never more than one.
    pub async fn count_for(&self, prescription_id: i64) -> DbResult<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM Medication_dispensed WHERE prescription_id = ?1")
                .bind(prescription_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }

    /// Inserts the dispense record inside an open transaction.
    ///
    /// ## Errors
    /// * `UniqueViolation` on `Medication_dispensed` - already dispensed
    /// * `ForeignKeyViolation` - pharmacist is not a registered dispenser
    pub async fn insert(conn: &mut SqliteConnection, record: &DispenseRecord) -> DbResult<()> {
        debug!(
            prescription_id = record.prescription_id,
            pharmacist_id = record.pharmacist_id,
            "Inserting dispense record"
        );

        sqlx::query(
            r#"
            INSERT INTO Medication_dispensed (prescription_id, pharmacist_id, dispensed_at)
            VALUES (?1, ?2, ?3)
            "#,
        )
        .bind(record.prescription_id)
        .bind(record.pharmacist_id)
        .bind(record.dispensed_at)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }
}
