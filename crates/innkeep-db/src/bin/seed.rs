//! # Seed Data Generator
//!
//! Populates a database with a small hotel for development.
//!
//! ## Usage
//! ```bash
//! # Default: ./innkeep_dev.db, 3 floors
//! cargo run -p innkeep-db --bin seed
//!
//! cargo run -p innkeep-db --bin seed -- --floors 5 --db ./data/innkeep.db
//! ```
//!
//! ## Generated Data
//! - Room types: Standard, Deluxe, Family, Suite
//! - Rooms `{floor}{01..08}`, types assigned round-robin
//! - A service catalog (minibar, laundry, food, transport)

use chrono::Utc;
use innkeep_db::{Database, DbConfig};
use std::env;

/// (name, capacity, nightly base price in đồng)
const ROOM_TYPES: &[(&str, i64, i64)] = &[
    ("Standard", 2, 400_000),
    ("Deluxe", 2, 650_000),
    ("Family", 4, 900_000),
    ("Suite", 3, 1_500_000),
];

const ROOMS_PER_FLOOR: usize = 8;

/// (category, name, unit price in đồng)
const SERVICES: &[(&str, &str, i64)] = &[
    ("minibar", "Mineral water", 15_000),
    ("minibar", "Soft drink", 25_000),
    ("minibar", "Beer", 35_000),
    ("minibar", "Snack", 30_000),
    ("laundry", "Laundry per kg", 50_000),
    ("laundry", "Ironing per item", 20_000),
    ("food", "Breakfast buffet", 120_000),
    ("food", "Room service dinner", 250_000),
    ("transport", "Airport pickup", 300_000),
    ("transport", "Motorbike rental per day", 150_000),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    let mut floors: usize = 3;
    let mut db_path = String::from("./innkeep_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--floors" | "-f" => {
                if i + 1 < args.len() {
                    floors = args[i + 1].parse().unwrap_or(3);
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Innkeep Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -f, --floors <N>   Number of floors to generate (default: 3)");
                println!("  -d, --db <PATH>    Database file path (default: ./innkeep_dev.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("🌱 Innkeep Seed Data Generator");
    println!("==============================");
    println!("Database: {}", db_path);
    println!("Floors:   {}", floors);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;
    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    let existing = db.rooms().list_rooms().await?;
    if !existing.is_empty() {
        println!("⚠ Database already has {} rooms", existing.len());
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    let now = Utc::now();
    let rooms = db.rooms();

    let mut type_ids = Vec::with_capacity(ROOM_TYPES.len());
    for (name, capacity, price) in ROOM_TYPES {
        let room_type = rooms.create_room_type(name, *capacity, *price).await?;
        type_ids.push(room_type.id);
    }
    println!("✓ Created {} room types", type_ids.len());

    let mut created = 0;
    for floor in 1..=floors {
        for n in 1..=ROOMS_PER_FLOOR {
            let name = format!("{}{:02}", floor, n);
            let type_id = &type_ids[(floor + n) % type_ids.len()];
            if let Err(e) = rooms.create_room(&name, type_id, now).await {
                eprintln!("Failed to insert room {}: {}", name, e);
                continue;
            }
            created += 1;
        }
    }
    println!("✓ Created {} rooms", created);

    let services = db.services();
    for (category, name, price) in SERVICES {
        services.create_item(name, category, *price).await?;
    }
    println!("✓ Created {} service items", SERVICES.len());

    println!();
    println!("✓ Seed complete!");

    Ok(())
}
