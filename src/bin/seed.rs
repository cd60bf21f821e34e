use anyhow::Context;
use chrono::{DateTime, Duration, Utc};
use clap::Parser;
use dotenvy::dotenv;
use sqlx::SqlitePool;
use uuid::Uuid;

use opsboard::authz::Role;
use opsboard::utils::hash_password;

#[derive(Parser, Debug)]
#[command(author, version, about = "opsboard demo data seeder", long_about = None)]
struct Cli {
    /// Wipe existing rows before seeding
    #[arg(long)]
    fresh: bool,
    /// Password assigned to every seeded user
    #[arg(long, default_value = "password123")]
    password: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Try to load env from CWD; when running in Docker the binary CWD may
    // differ, so fall back to the crate-local `.env`.
    if dotenv().is_err() {
        let crate_env = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
        let _ = dotenvy::from_path(crate_env);
    }

    let cli = Cli::parse();
    let pool = opsboard::db::init().await.context("failed to init database")?;

    if cli.fresh {
        wipe(&pool).await?;
        println!("Existing data removed");
    }

    let now = Utc::now();

    seed_locations(&pool, now).await?;
    seed_departments(&pool, now).await?;
    let users = seed_users(&pool, &cli.password, now).await?;
    seed_inventory(&pool, now).await?;
    seed_finance(&pool, now).await?;

    println!("Seeded {} users (password: {})", users, cli.password);
    println!("Locations: loc_kampala, loc_entebbe");
    Ok(())
}

async fn wipe(pool: &SqlitePool) -> anyhow::Result<()> {
    for table in [
        "event_store",
        "activity_log",
        "stock_movements",
        "location_stock",
        "inventory_items",
        "expenses",
        "payments",
        "vendor_invoices",
        "financial_entries",
        "users",
        "departments",
        "locations",
    ] {
        sqlx::query(&format!("DELETE FROM {table}")).execute(pool).await?;
    }
    Ok(())
}

async fn seed_locations(pool: &SqlitePool, now: DateTime<Utc>) -> anyhow::Result<()> {
    for (id, name) in [("loc_kampala", "Kampala Branch"), ("loc_entebbe", "Entebbe Branch")] {
        sqlx::query("INSERT OR IGNORE INTO locations (id, name, status, created_at) VALUES (?, ?, 'ACTIVE', ?)")
            .bind(id)
            .bind(name)
            .bind(now)
            .execute(pool)
            .await?;
    }
    Ok(())
}

async fn seed_departments(pool: &SqlitePool, now: DateTime<Utc>) -> anyhow::Result<()> {
    for (id, location, name) in [
        ("dep_kitchen", "loc_kampala", "Kitchen"),
        ("dep_bar", "loc_kampala", "Bar"),
        ("dep_housekeeping", "loc_entebbe", "Housekeeping"),
    ] {
        sqlx::query("INSERT OR IGNORE INTO departments (id, location_id, name, created_at) VALUES (?, ?, ?, ?)")
            .bind(id)
            .bind(location)
            .bind(name)
            .bind(now)
            .execute(pool)
            .await?;
    }
    Ok(())
}

async fn seed_users(pool: &SqlitePool, password: &str, now: DateTime<Utc>) -> anyhow::Result<usize> {
    let password_hash = hash_password(password).map_err(|e| anyhow::anyhow!(e.to_string()))?;

    let users: [(&str, Role, bool, Option<&str>, Option<&str>); 8] = [
        ("ceo@example.com", Role::Ceo, true, None, None),
        ("auditor@example.com", Role::SystemAuditor, true, None, None),
        ("gm.kampala@example.com", Role::GeneralManager, false, Some("loc_kampala"), None),
        ("finance.kampala@example.com", Role::FinanceManager, false, Some("loc_kampala"), None),
        ("procurement.kampala@example.com", Role::ProcurementOfficer, false, Some("loc_kampala"), None),
        ("store.kampala@example.com", Role::StoreManager, false, Some("loc_kampala"), None),
        ("controller.kampala@example.com", Role::StoreController, false, Some("loc_kampala"), None),
        ("kitchen.head@example.com", Role::DepartmentHead, false, Some("loc_kampala"), Some("dep_kitchen")),
    ];

    let user_count = users.len();
    for (email, role, all_locations, location, department) in users {
        let name = email.split('@').next().unwrap_or(email).replace('.', " ");
        sqlx::query(
            "INSERT OR IGNORE INTO users (id, name, email, password_hash, role, all_locations, location_id, department_id, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(name)
        .bind(email)
        .bind(&password_hash)
        .bind(role.as_str())
        .bind(all_locations)
        .bind(location)
        .bind(department)
        .bind(now)
        .bind(now)
        .execute(pool)
        .await?;
    }

    Ok(user_count)
}

async fn seed_inventory(pool: &SqlitePool, now: DateTime<Utc>) -> anyhow::Result<()> {
    let items = [
        ("itm_rice_25kg", "RICE-25", "Rice 25kg", "bag"),
        ("itm_cooking_oil", "OIL-20L", "Cooking Oil 20L", "jerrycan"),
        ("itm_flour_50kg", "FLOUR-50", "Wheat Flour 50kg", "bag"),
        ("itm_sugar_50kg", "SUGAR-50", "Sugar 50kg", "bag"),
    ];
    for (id, sku, name, uom) in items {
        sqlx::query("INSERT OR IGNORE INTO inventory_items (id, sku, name, uom, created_at) VALUES (?, ?, ?, ?, ?)")
            .bind(id)
            .bind(sku)
            .bind(name)
            .bind(uom)
            .bind(now)
            .execute(pool)
            .await?;
    }

    for (location, item, reserved, reorder) in [
        ("loc_kampala", "itm_rice_25kg", 2.0, 10.0),
        ("loc_kampala", "itm_cooking_oil", 0.0, 8.0),
        ("loc_kampala", "itm_flour_50kg", 0.0, 6.0),
        ("loc_kampala", "itm_sugar_50kg", 1.0, 5.0),
        ("loc_entebbe", "itm_rice_25kg", 0.0, 10.0),
    ] {
        sqlx::query(
            "INSERT OR IGNORE INTO location_stock (id, location_id, item_id, reserved, reorder_level) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(format!("lst_{location}_{item}"))
        .bind(location)
        .bind(item)
        .bind(reserved)
        .bind(reorder)
        .execute(pool)
        .await?;
    }

    // opening balances plus this month's consumption, so the KPIs and the
    // depletion forecast have something to chew on
    let movements: [(&str, Option<&str>, &str, &str, f64, f64, i64); 9] = [
        ("loc_kampala", None, "itm_rice_25kg", "OPENING_BALANCE", 40.0, 95_000.0, 40),
        ("loc_kampala", None, "itm_cooking_oil", "OPENING_BALANCE", 30.0, 120_000.0, 40),
        ("loc_kampala", None, "itm_flour_50kg", "OPENING_BALANCE", 25.0, 150_000.0, 40),
        ("loc_kampala", None, "itm_sugar_50kg", "OPENING_BALANCE", 8.0, 180_000.0, 40),
        ("loc_kampala", None, "itm_rice_25kg", "PURCHASE_RECEIPT", 20.0, 98_000.0, 12),
        ("loc_kampala", Some("dep_kitchen"), "itm_rice_25kg", "DEPARTMENT_ISSUE", 18.0, 98_000.0, 6),
        ("loc_kampala", Some("dep_kitchen"), "itm_cooking_oil", "DEPARTMENT_ISSUE", 12.0, 120_000.0, 5),
        ("loc_kampala", Some("dep_bar"), "itm_sugar_50kg", "DEPARTMENT_ISSUE", 6.0, 180_000.0, 3),
        ("loc_entebbe", None, "itm_rice_25kg", "OPENING_BALANCE", 15.0, 95_000.0, 40),
    ];

    for (location, department, item, movement_type, quantity, unit_cost, days_ago) in movements {
        sqlx::query(
            "INSERT INTO stock_movements (id, location_id, department_id, item_id, movement_type, quantity, unit_cost, reference, created_by, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, 'seed', NULL, ?)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(location)
        .bind(department)
        .bind(item)
        .bind(movement_type)
        .bind(quantity)
        .bind(unit_cost)
        .bind(now - Duration::days(days_ago))
        .execute(pool)
        .await?;
    }

    Ok(())
}

async fn seed_finance(pool: &SqlitePool, now: DateTime<Utc>) -> anyhow::Result<()> {
    // two weeks of daily ledger entries per location
    for days_ago in 0..14i64 {
        let day = now - Duration::days(days_ago);
        for (location, revenue, cogs, opex) in [
            ("loc_kampala", 2_400_000.0, 900_000.0, 350_000.0),
            ("loc_entebbe", 1_100_000.0, 420_000.0, 180_000.0),
        ] {
            for (account, debit, credit) in [
                ("REVENUE", 0.0, revenue),
                ("COGS", cogs, 0.0),
                ("OPEX:UTILITIES", opex, 0.0),
            ] {
                sqlx::query(
                    "INSERT INTO financial_entries (id, location_id, account_code, debit, credit, entry_date, created_at) \
                     VALUES (?, ?, ?, ?, ?, ?, ?)",
                )
                .bind(Uuid::new_v4().to_string())
                .bind(location)
                .bind(account)
                .bind(debit)
                .bind(credit)
                .bind(day)
                .bind(day)
                .execute(pool)
                .await?;
            }
        }
    }

    let invoices: [(&str, &str, f64, i64, &str); 4] = [
        ("loc_kampala", "Fresh Farms Ltd", 1_800_000.0, -10, "UNPAID"),
        ("loc_kampala", "Lake Fisheries", 650_000.0, 12, "UNPAID"),
        ("loc_kampala", "City Linen Co", 300_000.0, -30, "PAID"),
        ("loc_entebbe", "Fresh Farms Ltd", 900_000.0, -4, "UNPAID"),
    ];
    for (location, vendor, amount, due_in_days, status) in invoices {
        let invoice_id = Uuid::new_v4().to_string();
        sqlx::query(
            "INSERT INTO vendor_invoices (id, location_id, vendor_name, amount, due_date, status, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&invoice_id)
        .bind(location)
        .bind(vendor)
        .bind(amount)
        .bind(now + Duration::days(due_in_days))
        .bind(status)
        .bind(now - Duration::days(30))
        .execute(pool)
        .await?;

        if status == "PAID" {
            sqlx::query(
                "INSERT INTO payments (id, invoice_id, location_id, amount, paid_at) VALUES (?, ?, ?, ?, ?)",
            )
            .bind(Uuid::new_v4().to_string())
            .bind(&invoice_id)
            .bind(location)
            .bind(amount)
            .bind(now - Duration::days(20))
            .execute(pool)
            .await?;
        }
    }

    let expenses: [(&str, Option<&str>, &str, f64, i64); 5] = [
        ("loc_kampala", None, "UTILITIES", 450_000.0, 2),
        ("loc_kampala", Some("dep_kitchen"), "SUPPLIES", 220_000.0, 3),
        ("loc_kampala", Some("dep_bar"), "SUPPLIES", 140_000.0, 5),
        ("loc_kampala", None, "MAINTENANCE", 310_000.0, 8),
        ("loc_entebbe", None, "UTILITIES", 190_000.0, 4),
    ];
    for (location, department, category, amount, days_ago) in expenses {
        sqlx::query(
            "INSERT INTO expenses (id, location_id, department_id, category, amount, incurred_on, created_by, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, NULL, ?)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(location)
        .bind(department)
        .bind(category)
        .bind(amount)
        .bind(now - Duration::days(days_ago))
        .bind(now)
        .execute(pool)
        .await?;
    }

    Ok(())
}
