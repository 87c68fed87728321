//! # Role Menus
//!
//! Line-oriented console over any async reader/writer pair.
//!
//! ## Screen Flow
//! ```text
//! ┌──────────────┐  1  ┌───────────┐ session ┌──────────────────────────┐
//! │  Main menu   │────►│ LoginFlow │────────►│ Role menu (per Principal)│
//! │ 1 Log in     │     └───────────┘         │  patient / doctor /      │
//! │ 2 Register   │  2  ┌───────────┐         │  pharmacist / admin      │
//! │ 0 Exit       │────►│ Register  │         │  0 Log out ──► main menu │
//! └──────────────┘     └───────────┘         └──────────────────────────┘
//! ```
//! Service failures print as `[CODE] message` and the menu carries on. Only
//! I/O failures end the run; closed input ends it quietly.

use std::io;
use std::sync::Arc;

use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::info;

use clinic_core::{
    AuthError, DispenseResult, NewPrescription, PatientKey, Principal, PrescriptionSummary, Role,
    Session, ValidationError,
};

use crate::error::ClinicError;
use crate::services::{
    Authenticator, DispensingEngine, InventoryLedger, Records, Registration, RegistrationRequest,
    RoleLinkInput,
};
use crate::AppState;

#[derive(Debug, Error)]
enum MenuError {
    #[error(transparent)]
    Io(#[from] io::Error),

    #[error(transparent)]
    Clinic(#[from] ClinicError),
}

type MenuResult<T> = Result<T, MenuError>;

// =============================================================================
// Menu Entries
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    ListPatients,
    ListAppointments,
    BookAppointment,
    MyPrescriptions,
    PatientPrescriptions,
    DoctorPrescriptions,
    ViewPrescription,
    WritePrescription,
    AddMedication,
    RemoveMedication,
    Inventory,
    Restock,
    Dispense,
    Insurance,
    PharmacistCapabilities,
    Account,
}

impl Action {
    fn label(self) -> &'static str {
        match self {
            Action::ListPatients => "List patients",
            Action::ListAppointments => "List appointments",
            Action::BookAppointment => "Book appointment",
            Action::MyPrescriptions => "My prescriptions",
            Action::PatientPrescriptions => "Prescriptions for a patient",
            Action::DoctorPrescriptions => "Prescriptions by doctor",
            Action::ViewPrescription => "View prescription",
            Action::WritePrescription => "Write prescription",
            Action::AddMedication => "Add medication to prescription",
            Action::RemoveMedication => "Remove medication from prescription",
            Action::Inventory => "View medication inventory",
            Action::Restock => "Restock medication",
            Action::Dispense => "Dispense prescription",
            Action::Insurance => "View insurance",
            Action::PharmacistCapabilities => "Pharmacist capabilities",
            Action::Account => "My account",
        }
    }
}

fn menu_for(role: Role) -> &'static [Action] {
    use Action::*;

    match role {
        Role::Patient => &[
            ListAppointments,
            BookAppointment,
            MyPrescriptions,
            ViewPrescription,
            Insurance,
            Account,
        ],
        Role::Doctor => &[
            ListPatients,
            ListAppointments,
            BookAppointment,
            PatientPrescriptions,
            DoctorPrescriptions,
            ViewPrescription,
            WritePrescription,
            Inventory,
            Account,
        ],
        Role::Pharmacist => &[
            Inventory,
            PatientPrescriptions,
            ViewPrescription,
            Dispense,
            Restock,
            PharmacistCapabilities,
            Account,
        ],
        Role::Admin => &[
            ListPatients,
            ListAppointments,
            BookAppointment,
            PatientPrescriptions,
            DoctorPrescriptions,
            ViewPrescription,
            WritePrescription,
            AddMedication,
            RemoveMedication,
            Inventory,
            Restock,
            Insurance,
            PharmacistCapabilities,
            Account,
        ],
    }
}

fn invalid_number(field: &str) -> ClinicError {
    ValidationError::InvalidFormat {
        field: field.to_string(),
        reason: "expected a whole number".to_string(),
    }
    .into()
}

// =============================================================================
// Console
// =============================================================================

/// Interactive console bound to one input and one output stream.
pub struct Console<R, W> {
    input: R,
    output: W,
    authenticator: Authenticator,
    registration: Registration,
    engine: DispensingEngine,
    ledger: InventoryLedger,
    records: Records,
}

impl<R, W> Console<R, W>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(state: Arc<AppState>, input: R, output: W) -> Self {
        Console {
            input,
            output,
            authenticator: Authenticator::new(state.clone()),
            registration: Registration::new(state.clone()),
            engine: DispensingEngine::new(state.clone()),
            ledger: InventoryLedger::new(state.clone()),
            records: Records::new(state),
        }
    }

    pub fn into_output(self) -> W {
        self.output
    }

    /// Runs the main menu until the user exits or input closes.
    pub async fn run(&mut self) -> io::Result<()> {
        match self.main_menu().await {
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(()),
            other => other,
        }
    }

    async fn main_menu(&mut self) -> io::Result<()> {
        loop {
            self.say("\n============================\n Clinic Records\n============================")
                .await?;
            self.say("1) Log in\n2) Register\n0) Exit").await?;

            match self.prompt("Select an option").await?.as_str() {
                "1" => {
                    if let Some(session) = self.login().await? {
                        self.session_menu(session).await?;
                    }
                }
                "2" => {
                    let result = self.register().await;
                    self.settle(result).await?;
                }
                "0" => {
                    self.say("Goodbye.").await?;
                    return Ok(());
                }
                _ => self.say("Invalid choice. Try again.").await?,
            }
        }
    }

    // =========================================================================
    // Login & Registration
    // =========================================================================

    async fn login(&mut self) -> io::Result<Option<Session>> {
        let mut flow = self.authenticator.begin_login();

        loop {
            let username = self.prompt("Username").await?;
            let password = self.prompt("Password").await?;

            match flow.attempt(&username, &password).await {
                Ok(session) => {
                    self.say(&format!(
                        "Welcome, {} (logged in as {}).",
                        session.username,
                        session.role()
                    ))
                    .await?;
                    return Ok(Some(session));
                }
                Err(e @ ClinicError::Auth(AuthError::InvalidCredentials)) => {
                    self.report(&e).await?;
                    self.say(&format!("{} attempt(s) left.", flow.remaining())).await?;
                }
                Err(e) => {
                    self.report(&e).await?;
                    return Ok(None);
                }
            }
        }
    }

    async fn register(&mut self) -> MenuResult<()> {
        let username = self.prompt("Username").await?;
        let password = self.prompt("Password").await?;
        let confirm_password = self.prompt("Confirm password").await?;
        let role = self.prompt("Role (patient, doctor, pharmacist, admin)").await?;

        // An unknown role still goes to the service, which reports it
        let link = match role.parse::<Role>() {
            Ok(Role::Patient) => RoleLinkInput::Patient(self.prompt_patient_key().await?),
            Ok(Role::Doctor) => RoleLinkInput::Doctor(self.prompt_number("Doctor ID").await?),
            Ok(Role::Pharmacist) => {
                RoleLinkInput::Pharmacist(self.prompt_number("Pharmacist ID").await?)
            }
            Ok(Role::Admin) | Err(_) => RoleLinkInput::None,
        };

        let account = self
            .registration
            .register(&RegistrationRequest {
                username,
                password,
                confirm_password,
                role,
                link,
            })
            .await?;

        self.say(&format!(
            "Registered '{}' as {}. You can log in now.",
            account.username,
            account.role()
        ))
        .await?;
        Ok(())
    }

    // =========================================================================
    // Role Menu
    // =========================================================================

    async fn session_menu(&mut self, session: Session) -> io::Result<()> {
        let actions = menu_for(session.role());

        loop {
            self.say(&format!("\n--- {} menu ({}) ---", session.role(), session.username))
                .await?;
            for (i, action) in actions.iter().enumerate() {
                self.say(&format!("{}) {}", i + 1, action.label())).await?;
            }
            self.say("0) Log out").await?;

            let choice = self.prompt("Select an option").await?;
            if choice == "0" {
                info!(session_id = %session.session_id, username = %session.username, "Logged out");
                self.say("Logged out.").await?;
                return Ok(());
            }

            let action = choice
                .parse::<usize>()
                .ok()
                .and_then(|n| n.checked_sub(1))
                .and_then(|i| actions.get(i))
                .copied();

            match action {
                Some(action) => {
                    let result = self.dispatch(&session, action).await;
                    self.settle(result).await?;
                }
                None => self.say("Invalid choice. Try again.").await?,
            }
        }
    }

    async fn dispatch(&mut self, session: &Session, action: Action) -> MenuResult<()> {
        match action {
            Action::ListPatients => {
                let patients = self.records.list_patients(session).await?;
                self.say(&format!("{:<12} | {:<20} | {:>3} | {}", "SSN", "Name", "Age", "Phone"))
                    .await?;
                for p in patients {
                    let age = p.age.map(|a| a.to_string()).unwrap_or_default();
                    let phone = p.phone.unwrap_or_default();
                    self.say(&format!("{:<12} | {:<20} | {:>3} | {}", p.ssn, p.name, age, phone))
                        .await?;
                }
            }

            Action::ListAppointments => {
                let rows = self.records.list_appointments(session).await?;
                if rows.is_empty() {
                    self.say("No appointments.").await?;
                }
                for a in rows {
                    self.say(&format!(
                        "#{:<4} {}  {:<20} with {}",
                        a.id, a.scheduled_at, a.patient_name, a.doctor_name
                    ))
                    .await?;
                }
            }

            Action::BookAppointment => {
                let patient = self.own_or_prompted_patient(session).await?;
                let doctor_id = match session.principal.doctor_id() {
                    Some(me) => me,
                    None => self.prompt_number("Doctor ID").await?,
                };
                let when = self.prompt("Date and time (YYYY-MM-DD HH:MM:SS)").await?;

                let booked = self
                    .records
                    .create_appointment(session, patient, doctor_id, &when)
                    .await?;
                self.say(&format!("Booked appointment #{} at {}.", booked.id, booked.scheduled_at))
                    .await?;
            }

            Action::MyPrescriptions | Action::PatientPrescriptions => {
                let patient = self.own_or_prompted_patient(session).await?;
                let rows = self.records.prescriptions_for_patient(session, &patient).await?;
                self.show_prescriptions(&rows).await?;
            }

            Action::DoctorPrescriptions => {
                let doctor_id = match session.principal.doctor_id() {
                    Some(me) => me,
                    None => self.prompt_number("Doctor ID").await?,
                };
                let rows = self.records.prescriptions_by_doctor(session, doctor_id).await?;
                self.show_prescriptions(&rows).await?;
            }

            Action::ViewPrescription => {
                let id = self.prompt_number("Prescription ID").await?;
                let detail = self.records.prescription_detail(session, id).await?;
                let p = &detail.prescription;

                self.say(&format!(
                    "Prescription #{} ({})\n  Date:     {}\n  Doctor:   {}\n  Patient:  {}\n  Dosage:   {}\n  Contains: {}",
                    p.id,
                    detail.status(),
                    p.date,
                    detail.doctor_name,
                    p.patient.name,
                    p.dosage,
                    if detail.medications.is_empty() {
                        "(none)".to_string()
                    } else {
                        detail.medications.join(", ")
                    }
                ))
                .await?;

                if let Some(record) = &detail.dispense {
                    self.say(&format!(
                        "  Dispensed by pharmacist #{} at {}",
                        record.pharmacist_id,
                        record.dispensed_at.format("%Y-%m-%d %H:%M")
                    ))
                    .await?;
                }
            }

            Action::WritePrescription => {
                let doctor_id = match session.principal.doctor_id() {
                    Some(me) => me,
                    None => self.prompt_number("Prescribing doctor ID").await?,
                };
                let patient = self.prompt_patient_key().await?;
                let dosage = self.prompt("Dosage instructions").await?;
                let medications = self
                    .prompt("Medications (comma separated)")
                    .await?
                    .split(',')
                    .map(str::trim)
                    .filter(|name| !name.is_empty())
                    .map(String::from)
                    .collect();

                let prescription = self
                    .records
                    .create_prescription(
                        session,
                        &NewPrescription {
                            doctor_id,
                            patient,
                            dosage,
                            medications,
                        },
                    )
                    .await?;
                self.say(&format!("Wrote prescription #{}.", prescription.id)).await?;
            }

            Action::AddMedication => {
                let id = self.prompt_number("Prescription ID").await?;
                let name = self.prompt("Medication name").await?;
                self.records.add_medication(session, id, &name).await?;
                self.say(&format!("Added {} to prescription #{}.", name, id)).await?;
            }

            Action::RemoveMedication => {
                let id = self.prompt_number("Prescription ID").await?;
                let name = self.prompt("Medication name").await?;
                self.records.remove_medication(session, id, &name).await?;
                self.say(&format!("Removed {} from prescription #{}.", name, id)).await?;
            }

            Action::Inventory => {
                let medications = self.ledger.list(session).await?;
                self.say(&format!(
                    "{:<20} | {:>8} | {:>7} | {}",
                    "Medication", "In stock", "Ordered", "Location"
                ))
                .await?;
                for m in medications {
                    self.say(&format!(
                        "{:<20} | {:>8} | {:>7} | {}",
                        m.name,
                        m.quantity_in_stock,
                        m.quantity_ordered,
                        m.location.unwrap_or_default()
                    ))
                    .await?;
                }
            }

            Action::Restock => {
                let name = self.prompt("Medication name").await?;
                let stock = self.prompt_number("New quantity in stock").await?;
                let ordered = self.prompt_number("New quantity ordered").await?;

                let updated = self.ledger.restock(session, &name, stock, ordered).await?;
                self.say(&format!(
                    "{}: {} in stock, {} ordered.",
                    updated.name, updated.quantity_in_stock, updated.quantity_ordered
                ))
                .await?;
            }

            Action::Dispense => {
                let id = self.prompt_number("Prescription ID").await?;
                let result = self.engine.dispense(session, id).await?;
                self.show_dispense(&result).await?;
            }

            Action::Insurance => {
                let patient = self.own_or_prompted_patient(session).await?;
                let policies = self.records.insurance_for(session, &patient).await?;
                if policies.is_empty() {
                    self.say("No insurance on file.").await?;
                }
                for policy in policies {
                    self.say(&format!(
                        "{}  {}  {}",
                        policy.policy_number,
                        policy.provider,
                        policy.coverage.unwrap_or_default()
                    ))
                    .await?;
                }
            }

            Action::PharmacistCapabilities => {
                let id = match session.principal.pharmacist_id() {
                    Some(me) => me,
                    None => self.prompt_number("Pharmacist ID").await?,
                };
                let (pharmacist, caps) = self.records.pharmacist_capabilities(session, id).await?;
                self.say(&format!(
                    "{} (#{}): dispenser: {}, inventory manager: {}",
                    pharmacist.name,
                    pharmacist.id,
                    yes_no(caps.dispenser),
                    yes_no(caps.inventory_manager)
                ))
                .await?;
            }

            Action::Account => {
                let account = self.records.account(session).await?;
                self.say(&format!(
                    "{} ({}), registered {}",
                    account.username,
                    account.role(),
                    account.created_at.format("%Y-%m-%d")
                ))
                .await?;
            }
        }

        Ok(())
    }

    async fn show_prescriptions(&mut self, rows: &[PrescriptionSummary]) -> io::Result<()> {
        if rows.is_empty() {
            return self.say("No prescriptions.").await;
        }

        for p in rows {
            self.say(&format!(
                "#{:<4} {}  {:<20} {:<20} {}",
                p.id, p.date, p.patient.name, p.doctor_name, p.status
            ))
            .await?;
        }
        Ok(())
    }

    async fn show_dispense(&mut self, result: &DispenseResult) -> io::Result<()> {
        self.say(&format!("Dispensed prescription #{}:", result.prescription_id))
            .await?;
        for m in &result.medications {
            self.say(&format!("  {:<20} {} left", m.name, m.remaining_stock))
                .await?;
        }
        Ok(())
    }

    // =========================================================================
    // I/O Helpers
    // =========================================================================

    async fn own_or_prompted_patient(&mut self, session: &Session) -> MenuResult<PatientKey> {
        match &session.principal {
            Principal::Patient(key) => Ok(key.clone()),
            _ => self.prompt_patient_key().await,
        }
    }

    async fn prompt_patient_key(&mut self) -> MenuResult<PatientKey> {
        let ssn = self.prompt("Patient SSN").await?;
        let name = self.prompt("Patient name").await?;
        Ok(PatientKey::new(ssn, name))
    }

    async fn prompt_number(&mut self, label: &str) -> MenuResult<i64> {
        let raw = self.prompt(label).await?;
        raw.parse::<i64>().map_err(|_| invalid_number(label).into())
    }

    /// Reads one trimmed line. Closed input is `UnexpectedEof`.
    async fn prompt(&mut self, label: &str) -> io::Result<String> {
        self.output.write_all(format!("{}: ", label).as_bytes()).await?;
        self.output.flush().await?;

        let mut line = String::new();
        if self.input.read_line(&mut line).await? == 0 {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "input closed"));
        }
        Ok(line.trim().to_string())
    }

    async fn say(&mut self, text: &str) -> io::Result<()> {
        self.output.write_all(text.as_bytes()).await?;
        self.output.write_all(b"\n").await?;
        self.output.flush().await
    }

    async fn report(&mut self, err: &ClinicError) -> io::Result<()> {
        self.say(&format!("[{}] {}", err.code(), err)).await
    }

    async fn settle(&mut self, result: MenuResult<()>) -> io::Result<()> {
        match result {
            Ok(()) => Ok(()),
            Err(MenuError::Clinic(e)) => self.report(&e).await,
            Err(MenuError::Io(e)) => Err(e),
        }
    }
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "yes"
    } else {
        "no"
    }
}
