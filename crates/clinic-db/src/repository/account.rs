//! # Account Repository
//!
//! Login accounts and their role links.
//!
//! ## Row Shape
//! ```text
//! Account row (flat)                      Account (typed)
//! ─────────────────────                   ─────────────────────────────
//! role          = 'patient'        ──►    principal = Patient(PatientKey)
//! patient_ssn   = '111-22-3333'
//! patient_name  = 'Ana Li'
//! doctor_id     = NULL
//! pharmacist_id = NULL
//! ```
//! The flat columns are folded into a [`Principal`] once, here. A row whose
//! links disagree with its role is reported as [`DbError::InvalidRecord`].

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};
use clinic_core::{Account, PatientKey, Principal, Role};

/// Input for [`AccountRepository::insert`]. The hash is already computed.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub username: String,
    pub password_hash: String,
    pub principal: Principal,
}

#[derive(Debug, sqlx::FromRow)]
struct AccountRow {
    id: i64,
    username: String,
    password_hash: String,
    role: Role,
    patient_ssn: Option<String>,
    patient_name: Option<String>,
    doctor_id: Option<i64>,
    pharmacist_id: Option<i64>,
    created_at: DateTime<Utc>,
}

impl TryFrom<AccountRow> for Account {
    type Error = DbError;

    fn try_from(row: AccountRow) -> Result<Self, Self::Error> {
        let patient = match (row.patient_ssn, row.patient_name) {
            (Some(ssn), Some(name)) => Some(PatientKey { ssn, name }),
            (None, None) => None,
            _ => {
                return Err(DbError::InvalidRecord(format!(
                    "account {} has a partial patient link",
                    row.id
                )))
            }
        };

        let principal = Principal::from_links(row.role, patient, row.doctor_id, row.pharmacist_id)
            .map_err(|e| DbError::InvalidRecord(format!("account {}: {}", row.id, e)))?;

        Ok(Account {
            id: row.id,
            username: row.username,
            password_hash: row.password_hash,
            principal,
            created_at: row.created_at,
        })
    }
}

const SELECT_ACCOUNT: &str = r#"
    SELECT id, username, password_hash, role,
           patient_ssn, patient_name, doctor_id, pharmacist_id,
           created_at
    FROM Account
"#;

/// Repository for account database operations.
#[derive(Debug, Clone)]
pub struct AccountRepository {
    pool: SqlitePool,
}

impl AccountRepository {
    /// Creates a new AccountRepository.
    pub fn new(pool: SqlitePool) -> Self {
        AccountRepository { pool }
    }

    /// Gets an account by username (case-sensitive exact match).
    pub async fn get_by_username(&self, username: &str) -> DbResult<Option<Account>> {
        let sql = format!("{} WHERE username = ?1", SELECT_ACCOUNT);

        let row = sqlx::query_as::<_, AccountRow>(&sql)
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Account::try_from).transpose()
    }

    /// Gets an account by ID.
    pub async fn get_by_id(&self, id: i64) -> DbResult<Option<Account>> {
        let sql = format!("{} WHERE id = ?1", SELECT_ACCOUNT);

        let row = sqlx::query_as::<_, AccountRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Account::try_from).transpose()
    }

    /// True if the username is taken.
    pub async fn username_exists(&self, username: &str) -> DbResult<bool> {
        let found: Option<i64> = sqlx::query_scalar("SELECT id FROM Account WHERE username = ?1")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;

        Ok(found.is_some())
    }

    /// Inserts an account, populating exactly the link its principal carries.
    ///
    /// ## Returns
    /// The stored account with its generated ID.
    ///
    /// ## Errors
    /// * `UniqueViolation` on `Account.username` if the name was taken meanwhile
    /// * `ForeignKeyViolation` if the link target vanished
    pub async fn insert(&self, new: &NewAccount) -> DbResult<Account> {
        debug!(username = %new.username, role = %new.principal.role(), "Inserting account");

        let now = Utc::now();
        let patient = new.principal.patient_key();

        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO Account (
                username, password_hash, role,
                patient_ssn, patient_name, doctor_id, pharmacist_id,
                created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            RETURNING id
            "#,
        )
        .bind(&new.username)
        .bind(&new.password_hash)
        .bind(new.principal.role())
        .bind(patient.map(|k| k.ssn.as_str()))
        .bind(patient.map(|k| k.name.as_str()))
        .bind(new.principal.doctor_id())
        .bind(new.principal.pharmacist_id())
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(Account {
            id,
            username: new.username.clone(),
            password_hash: new.password_hash.clone(),
            principal: new.principal.clone(),
            created_at: now,
        })
    }

    /// Total number of accounts.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM Account")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
