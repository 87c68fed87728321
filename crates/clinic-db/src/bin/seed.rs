//! # Seed Data Loader
//!
//! Populates a clinic database with directory, inventory and prescription
//! rows for development.
//!
//! ## Usage
//! ```bash
//! # Load the built-in sample into ./clinic_dev.db
//! cargo run -p clinic-db --bin seed
//!
//! # Specify database path and a custom document
//! cargo run -p clinic-db --bin seed -- --db ./data/clinic.db --file ./my_clinic.json
//! ```
//!
//! Accounts are not seeded; register them from the console.

use std::env;
use std::fs;

use clinic_db::seed::{self, SeedData};
use clinic_db::{Database, DbConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    let mut db_path = String::from("./clinic_dev.db");
    let mut file: Option<String> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--file" | "-f" => {
                if i + 1 < args.len() {
                    file = Some(args[i + 1].clone());
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Clinic Records Seed Loader");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>      Database file path (default: ./clinic_dev.db)");
                println!("  -f, --file <PATH>    Seed document (default: built-in sample)");
                println!("  -h, --help           Show this help message");
                return Ok(());
            }
            other => {
                eprintln!("Ignoring unknown argument: {}", other);
            }
        }
        i += 1;
    }

    let data = match &file {
        Some(path) => SeedData::from_json(&fs::read_to_string(path)?)?,
        None => SeedData::sample()?,
    };

    println!("Clinic Records Seed Loader");
    println!("==========================");
    println!("Database: {}", db_path);
    println!("Source:   {}", file.as_deref().unwrap_or("built-in sample"));
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;

    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    if !seed::is_empty(&db).await? {
        println!("⚠ Database already has directory or inventory rows");
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to reload.");
        return Ok(());
    }

    let start = std::time::Instant::now();
    let summary = seed::apply(&db, &data).await?;

    println!();
    println!("✓ Loaded in {:?}", start.elapsed());
    println!("  Doctors:       {}", summary.doctors);
    println!("  Patients:      {}", summary.patients);
    println!("  Pharmacists:   {}", summary.pharmacists);
    println!("  Medications:   {}", summary.medications);
    println!("  Prescriptions: {}", summary.prescriptions);
    println!("  Appointments:  {}", summary.appointments);
    println!("  Insurance:     {}", summary.insurance);

    db.close().await;
    Ok(())
}
