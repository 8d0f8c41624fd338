//! # Seed Data Generator
//!
//! Populates a database with a demo owner for development.
//!
//! ## Usage
//! ```bash
//! # Seed ./billwise_dev.db for owner "demo-owner" with 10 clients
//! cargo run -p billwise-db --bin seed
//!
//! # Custom owner, count and path
//! cargo run -p billwise-db --bin seed -- --owner me --count 25 --db ./data/billwise.db
//! ```
//!
//! Each client gets one invoice and one estimate, numbered in the shared
//! `INV-NNN` sequence, so the numbering and most-recent behaviour can be
//! tried by hand.

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use std::env;

use billwise_core::calculator::DiscountType;
use billwise_core::{
    BusinessSettings, Client, Document, DocumentKind, DocumentStatus, LineItem, PaymentFlags,
};
use billwise_db::{generate_id, Database, DbConfig};

const COMPANIES: &[&str] = &[
    "Acme Corp",
    "Beta Ltd",
    "Gamma Consulting",
    "Delta Services LLC",
    "Epsilon Group",
    "Zeta Holdings",
    "Eta Solutions",
    "Theta Partners",
    "Iota Enterprises",
    "Kappa Inc",
];

/// (description, unit price in cents)
const SERVICES: &[(&str, i64)] = &[
    ("Consulting hour", 12_500),
    ("Website design", 180_000),
    ("Logo package", 45_000),
    ("Monthly retainer", 300_000),
    ("Site visit", 8_000),
];

const TAX_RATES: &[i64] = &[0, 500, 825, 1000];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    let mut count: usize = 10;
    let mut db_path = String::from("./billwise_dev.db");
    let mut owner = String::from("demo-owner");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--count" | "-c" => {
                if i + 1 < args.len() {
                    count = args[i + 1].parse().unwrap_or(10);
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--owner" | "-o" => {
                if i + 1 < args.len() {
                    owner = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Billwise Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --count <N>     Number of clients to generate (default: 10)");
                println!("  -d, --db <PATH>     Database file path (default: ./billwise_dev.db)");
                println!("  -o, --owner <ID>    Owner id (default: demo-owner)");
                println!("  -h, --help          Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("Billwise Seed Data Generator");
    println!("============================");
    println!("Database: {}", db_path);
    println!("Owner:    {}", owner);
    println!("Clients:  {}", count);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;
    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    let existing = db.clients().count(&owner).await?;
    if existing > 0 {
        println!("⚠ Owner already has {} clients", existing);
        println!("  Skipping seed to avoid duplicates.");
        return Ok(());
    }

    let mut settings = BusinessSettings::defaults_for(&owner, Utc::now());
    settings.business_name = Some("Demo Studio".to_string());
    settings.default_tax_rate = Decimal::new(825, 2);
    settings.auto_apply_tax = true;
    db.settings().upsert(&settings).await?;

    let mut number = db.references().max_suffix(&owner).await?;
    let start = std::time::Instant::now();

    for seed in 0..count {
        let base = COMPANIES[seed % COMPANIES.len()];
        let name = if seed < COMPANIES.len() {
            base.to_string()
        } else {
            format!("{} {}", base, seed / COMPANIES.len() + 1)
        };

        let now = Utc::now();
        let client = Client {
            id: generate_id(),
            owner_id: owner.clone(),
            name,
            email: None,
            phone: None,
            address: None,
            tax_id: None,
            notes: None,
            created_at: now,
            updated_at: now,
        };
        db.clients().insert(&client).await?;

        for kind in [DocumentKind::Invoice, DocumentKind::Estimate] {
            number += 1;
            let doc = generate_document(&owner, &client, kind, number, seed);
            let repo = db.documents(kind);
            repo.insert(&doc).await?;
            if let Err(e) = repo.insert_items(&owner, &doc.line_items).await {
                eprintln!("Failed to insert items for {}: {}", doc.reference_number, e);
                repo.delete(&owner, &doc.id).await?;
            }
        }
    }

    println!();
    println!("✓ Generated {} clients in {:?}", count, start.elapsed());
    println!("  Invoices:  {}", db.invoices().count(&owner).await?);
    println!("  Estimates: {}", db.estimates().count(&owner).await?);
    println!();
    println!("✓ Seed complete!");

    Ok(())
}

/// Builds one document with one or two lines and consistent totals.
fn generate_document(
    owner: &str,
    client: &Client,
    kind: DocumentKind,
    number: u64,
    seed: usize,
) -> Document {
    let now = Utc::now();
    let id = generate_id();

    let line_count = 1 + seed % 2;
    let line_items: Vec<LineItem> = (0..line_count)
        .map(|pos| {
            let (name, cents) = SERVICES[(seed + pos) % SERVICES.len()];
            LineItem {
                id: generate_id(),
                document_id: id.clone(),
                name: name.to_string(),
                description: None,
                quantity: Decimal::from(1 + (seed + pos) % 4),
                unit_price: Decimal::new(cents, 2),
                position: pos as i64,
            }
        })
        .collect();

    let mut doc = Document {
        id,
        owner_id: owner.to_string(),
        kind,
        reference_number: format!("INV-{:03}", number),
        client_id: client.id.clone(),
        client_name: client.name.clone(),
        status: if seed % 3 == 0 {
            DocumentStatus::Sent
        } else {
            DocumentStatus::Draft
        },
        issue_date: now.date_naive(),
        due_date: Some(now.date_naive() + Duration::days(30)),
        subtotal: Decimal::ZERO,
        discount_type: (seed % 4 == 0).then_some(DiscountType::Percentage),
        discount_value: if seed % 4 == 0 {
            Decimal::from(10)
        } else {
            Decimal::ZERO
        },
        tax_percentage: Decimal::new(TAX_RATES[seed % TAX_RATES.len()], 2),
        tax_amount: Decimal::ZERO,
        total: Decimal::ZERO,
        notes: None,
        design_id: None,
        accent_color: None,
        payment_flags: PaymentFlags::default(),
        is_accepted: false,
        accepted_at: None,
        converted_to_invoice_id: None,
        converted_at: None,
        source_estimate_id: None,
        created_at: now,
        updated_at: now,
        line_items,
    };
    doc.recalculate();
    doc
}
