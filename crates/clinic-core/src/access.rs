//! # Access Table
//!
//! Role-scoped authorization for every read and write in the console.
//!
//! ## Decision Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      authorize(session, request, caps)                  │
//! │                                                                         │
//! │  Admin principal? ────────────────────────────────────────► Permit      │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Look up (role, resource, operation) in POLICY                          │
//! │       │                                                                 │
//! │       ├── no row ─────────────────────────────► RoleNotPermitted        │
//! │       │                                                                 │
//! │       ├── Rule::Permit ───────────────────────► Permit                  │
//! │       ├── Rule::Owner ── target is caller's? ─► Permit / NotOwner       │
//! │       ├── Rule::Dispenser ── caps.dispenser? ─► Permit / NotDispenser   │
//! │       └── Rule::InventoryManager ─────────────► Permit / NotInvMgr      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The table is the only place access rules live. Call sites build an
//! [`AccessRequest`] and never compare roles themselves.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::AuthzError;
use crate::types::{
    DoctorId, PatientKey, PharmacistCapabilities, PharmacistId, Principal, Role, Session,
};

// =============================================================================
// Request Vocabulary
// =============================================================================

/// Entity families a session can touch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Resource {
    Patients,
    Appointments,
    Prescriptions,
    /// Medication lines of a prescription.
    Composition,
    Insurance,
    Inventory,
    /// Pharmacist directory entries and capability markers.
    Pharmacists,
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Resource::Patients => "patients",
            Resource::Appointments => "appointments",
            Resource::Prescriptions => "prescriptions",
            Resource::Composition => "prescription composition",
            Resource::Insurance => "insurance records",
            Resource::Inventory => "inventory",
            Resource::Pharmacists => "pharmacist records",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Read,
    Create,
    Update,
    Dispense,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::Read => "read",
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::Dispense => "dispense",
        };
        f.write_str(name)
    }
}

/// Whose rows the request touches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// Every row of the resource.
    Any,
    /// Rows scoped to one patient.
    Patient(PatientKey),
    /// Rows scoped to one doctor.
    Doctor(DoctorId),
    /// Rows scoped to one pharmacist.
    Pharmacist(PharmacistId),
    /// One concrete row that names both a patient and a doctor
    /// (an appointment or a prescription).
    Record {
        patient: PatientKey,
        doctor_id: DoctorId,
    },
}

/// A single question put to the access table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessRequest {
    pub resource: Resource,
    pub operation: Operation,
    pub target: Target,
}

impl AccessRequest {
    pub fn new(resource: Resource, operation: Operation, target: Target) -> Self {
        AccessRequest {
            resource,
            operation,
            target,
        }
    }

    pub fn read(resource: Resource, target: Target) -> Self {
        Self::new(resource, Operation::Read, target)
    }

    pub fn create(resource: Resource, target: Target) -> Self {
        Self::new(resource, Operation::Create, target)
    }

    pub fn update(resource: Resource, target: Target) -> Self {
        Self::new(resource, Operation::Update, target)
    }

    pub fn dispense() -> Self {
        Self::new(Resource::Prescriptions, Operation::Dispense, Target::Any)
    }
}

// =============================================================================
// Policy Table
// =============================================================================

/// What must hold for a table row to permit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rule {
    Permit,
    /// The target must be the caller's own identity.
    Owner,
    Dispenser,
    InventoryManager,
}

/// Admin is permitted everything and has no rows here.
const POLICY: &[(Role, Resource, Operation, Rule)] = &[
    // Doctors
    (Role::Doctor, Resource::Patients, Operation::Read, Rule::Permit),
    (Role::Doctor, Resource::Appointments, Operation::Read, Rule::Owner),
    (Role::Doctor, Resource::Appointments, Operation::Create, Rule::Owner),
    (Role::Doctor, Resource::Prescriptions, Operation::Read, Rule::Owner),
    (Role::Doctor, Resource::Prescriptions, Operation::Create, Rule::Owner),
    (Role::Doctor, Resource::Inventory, Operation::Read, Rule::Permit),
    // Patients
    (Role::Patient, Resource::Appointments, Operation::Read, Rule::Owner),
    (Role::Patient, Resource::Appointments, Operation::Create, Rule::Owner),
    (Role::Patient, Resource::Prescriptions, Operation::Read, Rule::Owner),
    (Role::Patient, Resource::Insurance, Operation::Read, Rule::Owner),
    // Pharmacists
    (Role::Pharmacist, Resource::Inventory, Operation::Read, Rule::Permit),
    (Role::Pharmacist, Resource::Inventory, Operation::Update, Rule::InventoryManager),
    (Role::Pharmacist, Resource::Prescriptions, Operation::Read, Rule::Dispenser),
    (Role::Pharmacist, Resource::Prescriptions, Operation::Dispense, Rule::Dispenser),
    (Role::Pharmacist, Resource::Pharmacists, Operation::Read, Rule::Owner),
];

fn lookup(role: Role, resource: Resource, operation: Operation) -> Option<Rule> {
    POLICY
        .iter()
        .find(|(r, res, op, _)| *r == role && *res == resource && *op == operation)
        .map(|(_, _, _, rule)| *rule)
}

/// True when `target` names the principal's own identity.
fn owns(principal: &Principal, target: &Target) -> bool {
    match (principal, target) {
        (Principal::Patient(me), Target::Patient(key)) => me == key,
        (Principal::Patient(me), Target::Record { patient, .. }) => me == patient,
        (Principal::Doctor { doctor_id: me }, Target::Doctor(id)) => me == id,
        (Principal::Doctor { doctor_id: me }, Target::Record { doctor_id, .. }) => me == doctor_id,
        (Principal::Pharmacist { pharmacist_id: me }, Target::Pharmacist(id)) => me == id,
        (Principal::Patient(_), _)
        | (Principal::Doctor { .. }, _)
        | (Principal::Pharmacist { .. }, _)
        | (Principal::Admin, _) => false,
    }
}

// =============================================================================
// Guard
// =============================================================================

/// Decides whether `session` may perform `request`.
///
/// `capabilities` are the caller's pharmacist markers, looked up fresh by the
/// caller; pass [`PharmacistCapabilities::none`] for other roles.
///
/// ## Returns
/// * `Ok(())` - permitted
/// * `Err(AuthzError)` - denied, with the reason
pub fn authorize(
    session: &Session,
    request: &AccessRequest,
    capabilities: PharmacistCapabilities,
) -> Result<(), AuthzError> {
    let principal = &session.principal;
    let role = match principal {
        Principal::Admin => return Ok(()),
        Principal::Patient(_) | Principal::Doctor { .. } | Principal::Pharmacist { .. } => {
            principal.role()
        }
    };

    let rule = lookup(role, request.resource, request.operation).ok_or(
        AuthzError::RoleNotPermitted {
            role,
            operation: request.operation,
            resource: request.resource,
        },
    )?;

    match rule {
        Rule::Permit => Ok(()),
        Rule::Owner if owns(principal, &request.target) => Ok(()),
        Rule::Owner => Err(AuthzError::NotOwner {
            resource: request.resource,
        }),
        Rule::Dispenser if capabilities.dispenser => Ok(()),
        Rule::Dispenser => Err(AuthzError::NotDispenser),
        Rule::InventoryManager if capabilities.inventory_manager => Ok(()),
        Rule::InventoryManager => Err(AuthzError::NotInventoryManager),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Account;
    use chrono::Utc;

    fn session(principal: Principal) -> Session {
        Session::for_account(&Account {
            id: 1,
            username: "user".to_string(),
            password_hash: String::new(),
            principal,
            created_at: Utc::now(),
        })
    }

    fn ana() -> PatientKey {
        PatientKey::new("111-22-3333", "Ana Li")
    }

    fn bo() -> PatientKey {
        PatientKey::new("444-55-6666", "Bo Chen")
    }

    const DISPENSER: PharmacistCapabilities = PharmacistCapabilities {
        dispenser: true,
        inventory_manager: false,
    };

    const MANAGER: PharmacistCapabilities = PharmacistCapabilities {
        dispenser: false,
        inventory_manager: true,
    };

    #[test]
    fn test_admin_is_permitted_everything() {
        let admin = session(Principal::Admin);
        for resource in [Resource::Patients, Resource::Inventory, Resource::Composition] {
            for op in [Operation::Read, Operation::Update, Operation::Dispense] {
                let request = AccessRequest::new(resource, op, Target::Any);
                assert!(authorize(&admin, &request, PharmacistCapabilities::none()).is_ok());
            }
        }
    }

    #[test]
    fn test_patient_reads_only_own_records() {
        let patient = session(Principal::Patient(ana()));
        let none = PharmacistCapabilities::none();

        let own = AccessRequest::read(Resource::Prescriptions, Target::Patient(ana()));
        assert!(authorize(&patient, &own, none).is_ok());

        let other = AccessRequest::read(Resource::Prescriptions, Target::Patient(bo()));
        assert_eq!(
            authorize(&patient, &other, none),
            Err(AuthzError::NotOwner {
                resource: Resource::Prescriptions
            })
        );

        let everything = AccessRequest::read(Resource::Insurance, Target::Any);
        assert!(authorize(&patient, &everything, none).is_err());
    }

    #[test]
    fn test_patient_key_is_matched_on_both_fields() {
        let patient = session(Principal::Patient(ana()));
        // Same SSN, different name
        let spoofed = PatientKey::new("111-22-3333", "Someone Else");
        let request = AccessRequest::read(Resource::Appointments, Target::Patient(spoofed));
        assert!(authorize(&patient, &request, PharmacistCapabilities::none()).is_err());
    }

    #[test]
    fn test_doctor_owns_records_they_wrote() {
        let doctor = session(Principal::Doctor { doctor_id: 7 });
        let none = PharmacistCapabilities::none();

        let own = AccessRequest::read(
            Resource::Prescriptions,
            Target::Record {
                patient: ana(),
                doctor_id: 7,
            },
        );
        assert!(authorize(&doctor, &own, none).is_ok());

        let foreign = AccessRequest::create(Resource::Prescriptions, Target::Doctor(8));
        assert!(matches!(
            authorize(&doctor, &foreign, none),
            Err(AuthzError::NotOwner { .. })
        ));
    }

    #[test]
    fn test_doctor_cannot_touch_inventory_or_dispense() {
        let doctor = session(Principal::Doctor { doctor_id: 7 });
        let none = PharmacistCapabilities::none();

        let read = AccessRequest::read(Resource::Inventory, Target::Any);
        assert!(authorize(&doctor, &read, none).is_ok());

        let restock = AccessRequest::update(Resource::Inventory, Target::Any);
        assert_eq!(
            authorize(&doctor, &restock, none),
            Err(AuthzError::RoleNotPermitted {
                role: Role::Doctor,
                operation: Operation::Update,
                resource: Resource::Inventory,
            })
        );

        assert!(authorize(&doctor, &AccessRequest::dispense(), none).is_err());
    }

    #[test]
    fn test_pharmacist_capabilities_gate_dispense_and_restock() {
        let pharmacist = session(Principal::Pharmacist { pharmacist_id: 2 });
        let restock = AccessRequest::update(Resource::Inventory, Target::Any);

        assert!(authorize(&pharmacist, &AccessRequest::dispense(), DISPENSER).is_ok());
        assert_eq!(
            authorize(&pharmacist, &AccessRequest::dispense(), MANAGER),
            Err(AuthzError::NotDispenser)
        );

        assert!(authorize(&pharmacist, &restock, MANAGER).is_ok());
        assert_eq!(
            authorize(&pharmacist, &restock, DISPENSER),
            Err(AuthzError::NotInventoryManager)
        );

        // Inventory reads need no capability
        let read = AccessRequest::read(Resource::Inventory, Target::Any);
        assert!(authorize(&pharmacist, &read, PharmacistCapabilities::none()).is_ok());
    }

    #[test]
    fn test_pharmacist_has_no_appointment_access() {
        let pharmacist = session(Principal::Pharmacist { pharmacist_id: 2 });
        let request = AccessRequest::read(Resource::Appointments, Target::Doctor(2));
        assert!(matches!(
            authorize(&pharmacist, &request, DISPENSER),
            Err(AuthzError::RoleNotPermitted { .. })
        ));
    }

    #[test]
    fn test_pharmacist_reads_only_own_record() {
        let pharmacist = session(Principal::Pharmacist { pharmacist_id: 2 });
        let none = PharmacistCapabilities::none();

        let own = AccessRequest::read(Resource::Pharmacists, Target::Pharmacist(2));
        assert!(authorize(&pharmacist, &own, none).is_ok());

        let other = AccessRequest::read(Resource::Pharmacists, Target::Pharmacist(3));
        assert_eq!(
            authorize(&pharmacist, &other, none),
            Err(AuthzError::NotOwner {
                resource: Resource::Pharmacists
            })
        );
    }
}
