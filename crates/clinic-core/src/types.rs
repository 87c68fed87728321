//! # Domain Types
//!
//! Typed records used throughout the clinic workspace.
//!
//! ## Type Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  Identity                    Clinical                 Inventory         │
//! │  ────────                    ────────                 ─────────         │
//! │  Account ── Principal        Prescription ─┐          Medication        │
//! │  Session ── Principal        (composition) ├─► names  DispenseRecord    │
//! │  PatientKey (ssn, name)      Appointment   │          DispenseResult    │
//! │  PharmacistCapabilities      InsurancePolicy                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Composite Patient Identity
//! Patients are keyed by the `(ssn, name)` pair, never by a surrogate id.
//! Every patient reference in this module is a [`PatientKey`].

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{RegistrationError, ValidationError};

pub type AccountId = i64;
pub type DoctorId = i64;
pub type PharmacistId = i64;
pub type PrescriptionId = i64;
pub type AppointmentId = i64;

// =============================================================================
// Patient Key
// =============================================================================

/// Composite natural key of a patient.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PatientKey {
    pub ssn: String,
    pub name: String,
}

impl PatientKey {
    pub fn new(ssn: impl Into<String>, name: impl Into<String>) -> Self {
        PatientKey {
            ssn: ssn.into(),
            name: name.into(),
        }
    }
}

// =============================================================================
// Role
// =============================================================================

/// The role tag stored on an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Patient,
    Doctor,
    Pharmacist,
    Admin,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Patient, Role::Doctor, Role::Pharmacist, Role::Admin];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Patient => "patient",
            Role::Doctor => "doctor",
            Role::Pharmacist => "pharmacist",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = RegistrationError;

    /// Exact, case-insensitive match on the four role names.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Role::ALL
            .into_iter()
            .find(|role| role.as_str() == wanted)
            .ok_or_else(|| RegistrationError::InvalidRole(s.trim().to_string()))
    }
}

// =============================================================================
// Principal
// =============================================================================

/// The domain identity an account is bound to.
///
/// Each variant carries exactly the link its role needs, so an account can
/// never hold two links at once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum Principal {
    Patient(PatientKey),
    Doctor { doctor_id: DoctorId },
    Pharmacist { pharmacist_id: PharmacistId },
    Admin,
}

impl Principal {
    pub fn role(&self) -> Role {
        match self {
            Principal::Patient(_) => Role::Patient,
            Principal::Doctor { .. } => Role::Doctor,
            Principal::Pharmacist { .. } => Role::Pharmacist,
            Principal::Admin => Role::Admin,
        }
    }

    /// Rebuilds a principal from the flat columns of an account row.
    ///
    /// Fails when the populated links disagree with the role tag: a link for
    /// another role, a missing link, or more than one link.
    pub fn from_links(
        role: Role,
        patient: Option<PatientKey>,
        doctor_id: Option<DoctorId>,
        pharmacist_id: Option<PharmacistId>,
    ) -> Result<Self, ValidationError> {
        let inconsistent = || ValidationError::InconsistentRoleLink {
            role: role.to_string(),
        };

        match (role, patient, doctor_id, pharmacist_id) {
            (Role::Patient, Some(key), None, None) => Ok(Principal::Patient(key)),
            (Role::Doctor, None, Some(doctor_id), None) => Ok(Principal::Doctor { doctor_id }),
            (Role::Pharmacist, None, None, Some(pharmacist_id)) => {
                Ok(Principal::Pharmacist { pharmacist_id })
            }
            (Role::Admin, None, None, None) => Ok(Principal::Admin),
            _ => Err(inconsistent()),
        }
    }

    pub fn patient_key(&self) -> Option<&PatientKey> {
        match self {
            Principal::Patient(key) => Some(key),
            _ => None,
        }
    }

    pub fn doctor_id(&self) -> Option<DoctorId> {
        match self {
            Principal::Doctor { doctor_id } => Some(*doctor_id),
            _ => None,
        }
    }

    pub fn pharmacist_id(&self) -> Option<PharmacistId> {
        match self {
            Principal::Pharmacist { pharmacist_id } => Some(*pharmacist_id),
            _ => None,
        }
    }
}

// =============================================================================
// Account & Session
// =============================================================================

/// A stored login identity.
#[derive(Clone, PartialEq, Eq)]
pub struct Account {
    pub id: AccountId,
    pub username: String,
    /// PHC-format digest. Never logged.
    pub password_hash: String,
    pub principal: Principal,
    pub created_at: DateTime<Utc>,
}

impl Account {
    pub fn role(&self) -> Role {
        self.principal.role()
    }
}

impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Account")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("password_hash", &"<redacted>")
            .field("principal", &self.principal)
            .field("created_at", &self.created_at)
            .finish()
    }
}

/// An authenticated interactive run.
///
/// Lives only in memory, from login until logout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// Correlates log lines of one run.
    pub session_id: Uuid,
    pub account_id: AccountId,
    pub username: String,
    pub principal: Principal,
    pub started_at: DateTime<Utc>,
}

impl Session {
    pub fn for_account(account: &Account) -> Self {
        Session {
            session_id: Uuid::new_v4(),
            account_id: account.id,
            username: account.username.clone(),
            principal: account.principal.clone(),
            started_at: Utc::now(),
        }
    }

    pub fn role(&self) -> Role {
        self.principal.role()
    }
}

/// Capability markers held by a pharmacist.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PharmacistCapabilities {
    pub dispenser: bool,
    pub inventory_manager: bool,
}

impl PharmacistCapabilities {
    /// No capabilities (every non-pharmacist principal).
    pub const fn none() -> Self {
        PharmacistCapabilities {
            dispenser: false,
            inventory_manager: false,
        }
    }
}

// =============================================================================
// Directory Entities
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Patient {
    pub ssn: String,
    pub name: String,
    pub age: Option<i64>,
    pub phone: Option<String>,
    /// Designated ongoing physician.
    pub primary_doctor_id: Option<DoctorId>,
}

impl Patient {
    pub fn key(&self) -> PatientKey {
        PatientKey::new(self.ssn.clone(), self.name.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Doctor {
    pub id: DoctorId,
    pub name: String,
    pub specialty: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pharmacist {
    pub id: PharmacistId,
    pub name: String,
}

// =============================================================================
// Prescriptions
// =============================================================================

/// A prescription as written by a doctor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prescription {
    pub id: PrescriptionId,
    pub doctor_id: DoctorId,
    pub patient: PatientKey,
    /// Free-text dosage instructions.
    pub dosage: String,
    pub date: NaiveDate,
}

/// Input for writing a prescription together with its composition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPrescription {
    pub doctor_id: DoctorId,
    pub patient: PatientKey,
    pub dosage: String,
    pub medications: Vec<String>,
}

/// Fulfillment state of a prescription.
///
/// ```text
///   Pending ──(dispense record inserted)──► Dispensed
/// ```
/// One-way: there is no transition back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FulfillmentStatus {
    Pending,
    Dispensed,
}

impl fmt::Display for FulfillmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FulfillmentStatus::Pending => f.write_str("pending"),
            FulfillmentStatus::Dispensed => f.write_str("dispensed"),
        }
    }
}

/// Listing row: one prescription with its prescriber's name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrescriptionSummary {
    pub id: PrescriptionId,
    pub date: NaiveDate,
    pub doctor_name: String,
    pub patient: PatientKey,
    pub status: FulfillmentStatus,
}

/// A prescription with its composition and dispense record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrescriptionDetail {
    pub prescription: Prescription,
    pub doctor_name: String,
    /// Medication names, ascending.
    pub medications: Vec<String>,
    pub dispense: Option<DispenseRecord>,
}

impl PrescriptionDetail {
    pub fn status(&self) -> FulfillmentStatus {
        match self.dispense {
            Some(_) => FulfillmentStatus::Dispensed,
            None => FulfillmentStatus::Pending,
        }
    }
}

// =============================================================================
// Inventory
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Medication {
    pub name: String,
    pub quantity_in_stock: i64,
    pub quantity_ordered: i64,
    pub location: Option<String>,
}

impl Medication {
    pub fn is_available(&self) -> bool {
        self.quantity_in_stock > 0
    }
}

/// The single record proving a prescription was dispensed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispenseRecord {
    pub prescription_id: PrescriptionId,
    pub pharmacist_id: PharmacistId,
    pub dispensed_at: DateTime<Utc>,
}

/// One medication consumed by a dispense.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispensedMedication {
    pub name: String,
    pub remaining_stock: i64,
}

/// Outcome of a committed dispense.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispenseResult {
    pub prescription_id: PrescriptionId,
    pub pharmacist_id: PharmacistId,
    /// In the order they were decremented (name ascending).
    pub medications: Vec<DispensedMedication>,
    pub dispensed_at: DateTime<Utc>,
}

// =============================================================================
// Appointments & Insurance
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: AppointmentId,
    pub patient: PatientKey,
    pub doctor_id: DoctorId,
    pub scheduled_at: NaiveDateTime,
}

/// Listing row with display names joined in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppointmentView {
    pub id: AppointmentId,
    pub scheduled_at: NaiveDateTime,
    pub patient_name: String,
    pub doctor_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAppointment {
    pub patient: PatientKey,
    pub doctor_id: DoctorId,
    pub scheduled_at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsurancePolicy {
    pub policy_number: String,
    pub patient: PatientKey,
    pub provider: String,
    pub coverage: Option<String>,
}

// =============================================================================
// Unit Tests
// =============================================================================
