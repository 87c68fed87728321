//! # Medication Repository
//!
//! The inventory ledger: on-hand and on-order quantities per medication.
//!
//! ## Two Writers, One Row
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  Dispense transaction                 Restock                           │
//! │  ─────────────────────                ────────                          │
//! │  take_one(&mut *tx, name)             restock(name, stock, ordered)    │
//! │    UPDATE ... SET stock = stock - 1     UPDATE ... SET stock = ?,       │
//! │    WHERE name = ? AND stock > 0                      ordered = ?        │
//! │    RETURNING stock                      WHERE name = ?                  │
//! │                                                                         │
//! │  Both are single statements, so the availability check and the write   │
//! │  can never be split by another writer.                                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use clinic_core::Medication;

#[derive(Debug, sqlx::FromRow)]
struct MedicationRow {
    name: String,
    quantity_in_stock: i64,
    quantity_ordered: i64,
    location: Option<String>,
}

impl From<MedicationRow> for Medication {
    fn from(row: MedicationRow) -> Self {
        Medication {
            name: row.name,
            quantity_in_stock: row.quantity_in_stock,
            quantity_ordered: row.quantity_ordered,
            location: row.location,
        }
    }
}

/// Repository for medication database operations.
#[derive(Debug, Clone)]
pub struct MedicationRepository {
    pool: SqlitePool,
}

impl MedicationRepository {
    /// Creates a new MedicationRepository.
    pub fn new(pool: SqlitePool) -> Self {
        MedicationRepository { pool }
    }

    /// Lists every medication, ordered by name.
    pub async fn list(&self) -> DbResult<Vec<Medication>> {
        let rows = sqlx::query_as::<_, MedicationRow>(
            r#"
            SELECT name, quantity_in_stock, quantity_ordered, location
            FROM Medication
            ORDER BY name
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Medication::from).collect())
    }

    /// Gets a medication by its exact name.
    pub async fn get_by_name(&self, name: &str) -> DbResult<Option<Medication>> {
        let row = sqlx::query_as::<_, MedicationRow>(
            r#"
            SELECT name, quantity_in_stock, quantity_ordered, location
            FROM Medication
            WHERE name = ?1
            "#,
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Medication::from))
    }

    pub async fn insert(&self, medication: &Medication) -> DbResult<()> {
        debug!(medication = %medication.name, "Inserting medication");

        sqlx::query(
            r#"
            INSERT INTO Medication (name, quantity_in_stock, quantity_ordered, location)
            VALUES (?1, ?2, ?3, ?4)
            "#,
        )
        .bind(&medication.name)
        .bind(medication.quantity_in_stock)
        .bind(medication.quantity_ordered)
        .bind(&medication.location)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Overwrites both quantities of one medication in a single statement.
    ///
    /// Figures must already be validated.
    ///
    /// ## Returns
    /// * `true` - row updated
    /// * `false` - no medication with that name
    pub async fn restock(&self, name: &str, new_stock: i64, new_ordered: i64) -> DbResult<bool> {
        debug!(medication = %name, new_stock, new_ordered, "Restocking medication");

        let result = sqlx::query(
            r#"
            UPDATE Medication
            SET quantity_in_stock = ?2, quantity_ordered = ?3
            WHERE name = ?1
            "#,
        )
        .bind(name)
        .bind(new_stock)
        .bind(new_ordered)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Takes one unit of stock inside an open transaction.
    ///
    /// The decrement only applies to a row that still has stock, so the
    /// availability check and the write are the same statement.
    ///
    /// ## Returns
    /// * `Some(remaining)` - one unit taken, `remaining` left on hand
    /// * `None` - medication out of stock (or unknown); nothing written
    pub async fn take_one(conn: &mut SqliteConnection, name: &str) -> DbResult<Option<i64>> {
        let remaining: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE Medication
            SET quantity_in_stock = quantity_in_stock - 1
            WHERE name = ?1 AND quantity_in_stock > 0
            RETURNING quantity_in_stock
            "#,
        )
        .bind(name)
        .fetch_optional(&mut *conn)
        .await?;

        debug!(medication = %name, ?remaining, "Stock decrement attempted");
        Ok(remaining)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig, DbError};

    fn med(name: &str, stock: i64, ordered: i64) -> Medication {
        Medication {
            name: name.to_string(),
            quantity_in_stock: stock,
            quantity_ordered: ordered,
            location: Some("Shelf A".to_string()),
        }
    }

    #[tokio::test]
    async fn test_take_one_stops_at_zero() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.medications().insert(&med("Ibuprofen", 1, 0)).await.unwrap();

        let mut tx = db.begin().await.unwrap();
        assert_eq!(
            MedicationRepository::take_one(&mut *tx, "Ibuprofen").await.unwrap(),
            Some(0)
        );
        assert_eq!(
            MedicationRepository::take_one(&mut *tx, "Ibuprofen").await.unwrap(),
            None
        );
        tx.commit().await.unwrap();

        let stored = db.medications().get_by_name("Ibuprofen").await.unwrap().unwrap();
        assert_eq!(stored.quantity_in_stock, 0);
    }

    #[tokio::test]
    async fn test_restock_unknown_name_touches_nothing() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        assert!(!db.medications().restock("Unobtainium", 5, 1).await.unwrap());
    }

    #[tokio::test]
    async fn test_negative_stock_rejected_by_schema() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        let err = db.medications().insert(&med("Bad", -1, 0)).await.unwrap_err();
        assert!(matches!(err, DbError::CheckViolation { .. }));
    }

    #[tokio::test]
    async fn test_list_is_name_ordered() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.medications();
        repo.insert(&med("Zinc", 3, 1)).await.unwrap();
        repo.insert(&med("Amoxicillin", 9, 2)).await.unwrap();

        let names: Vec<String> = repo.list().await.unwrap().into_iter().map(|m| m.name).collect();
        assert_eq!(names, vec!["Amoxicillin", "Zinc"]);
    }
}
