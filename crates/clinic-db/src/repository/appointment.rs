//! # Appointment Repository
//!
//! Appointments joined with patient and doctor names for display.
//! Times are stored as `YYYY-MM-DD HH:MM:SS` text.

use chrono::NaiveDateTime;
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::DbResult;
use clinic_core::{Appointment, AppointmentView, NewAppointment, PatientKey};

#[derive(Debug, sqlx::FromRow)]
struct AppointmentViewRow {
    appointment_id: i64,
    scheduled_datetime: NaiveDateTime,
    patient_name: String,
    doctor_name: String,
}

impl From<AppointmentViewRow> for AppointmentView {
    fn from(row: AppointmentViewRow) -> Self {
        AppointmentView {
            id: row.appointment_id,
            scheduled_at: row.scheduled_datetime,
            patient_name: row.patient_name,
            doctor_name: row.doctor_name,
        }
    }
}

const SELECT_VIEW: &str = r#"
    SELECT a.appointment_id,
           a.scheduled_datetime,
           a.patient_name,
           d.name AS doctor_name
    FROM Appointment a
    JOIN Doctor d ON d.id = a.doctor_id
"#;

/// Repository for appointment database operations.
#[derive(Debug, Clone)]
pub struct AppointmentRepository {
    pool: SqlitePool,
}

impl AppointmentRepository {
    /// Creates a new AppointmentRepository.
    pub fn new(pool: SqlitePool) -> Self {
        AppointmentRepository { pool }
    }

    async fn fetch_views(&self, sql: String, binds: ViewFilter<'_>) -> DbResult<Vec<AppointmentView>> {
        let query = sqlx::query_as::<_, AppointmentViewRow>(&sql);
        let query = match binds {
            ViewFilter::All => query,
            ViewFilter::Doctor(id) => query.bind(id),
            ViewFilter::Patient(key) => query.bind(&key.ssn).bind(&key.name),
        };

        let rows = query.fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(AppointmentView::from).collect())
    }

    /// Lists every appointment by scheduled time.
    pub async fn list_all(&self) -> DbResult<Vec<AppointmentView>> {
        let sql = format!("{} ORDER BY a.scheduled_datetime, a.appointment_id", SELECT_VIEW);
        self.fetch_views(sql, ViewFilter::All).await
    }

    /// Lists one doctor's appointments by scheduled time.
    pub async fn list_for_doctor(&self, doctor_id: i64) -> DbResult<Vec<AppointmentView>> {
        let sql = format!(
            "{} WHERE a.doctor_id = ?1 ORDER BY a.scheduled_datetime, a.appointment_id",
            SELECT_VIEW
        );
        self.fetch_views(sql, ViewFilter::Doctor(doctor_id)).await
    }

    /// Lists one patient's appointments by scheduled time.
    pub async fn list_for_patient(&self, key: &PatientKey) -> DbResult<Vec<AppointmentView>> {
        let sql = format!(
            "{} WHERE a.patient_ssn = ?1 AND a.patient_name = ?2 \
             ORDER BY a.scheduled_datetime, a.appointment_id",
            SELECT_VIEW
        );
        self.fetch_views(sql, ViewFilter::Patient(key)).await
    }

    /// Inserts an appointment.
    ///
    /// ## Errors
    /// * `ForeignKeyViolation` - unknown patient or doctor
    pub async fn insert(&self, new: &NewAppointment) -> DbResult<Appointment> {
        debug!(doctor_id = new.doctor_id, scheduled_at = %new.scheduled_at, "Inserting appointment");

        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO Appointment (patient_ssn, patient_name, doctor_id, scheduled_datetime)
            VALUES (?1, ?2, ?3, ?4)
            RETURNING appointment_id
            "#,
        )
        .bind(&new.patient.ssn)
        .bind(&new.patient.name)
        .bind(new.doctor_id)
        .bind(new.scheduled_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(Appointment {
            id,
            patient: new.patient.clone(),
            doctor_id: new.doctor_id,
            scheduled_at: new.scheduled_at,
        })
    }
}

enum ViewFilter<'a> {
    All,
    Doctor(i64),
    Patient(&'a PatientKey),
}
