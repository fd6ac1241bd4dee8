//! # Seed Data Generator
//!
//! Populates every store database with a staff account, a small catalog,
//! two deliveries per product, one sale and one partial return.
//!
//! ## Usage
//! ```bash
//! # Seed ./store1.db and ./store2.db (default)
//! cargo run -p outlet-db --bin seed
//!
//! # Pick the stores and files
//! cargo run -p outlet-db --bin seed -- --db store1=./data/store1.db --db store2=./data/store2.db
//!
//! # Staff password (default: admin123)
//! cargo run -p outlet-db --bin seed -- --password s3cret
//! ```
//!
//! A store that already has products is left untouched.

use std::env;

use anyhow::{bail, Context};
use chrono::{Days, NaiveDate, Utc};
use tracing::info;
use tracing_subscriber::EnvFilter;

use outlet_core::returns::ReturnLine;
use outlet_core::{Money, PaymentMethod, TaxRate, Unit};
use outlet_db::{
    CartLine, CheckoutRequest, Database, DbConfig, NewBatch, NewProduct, ReturnRequest, StoreInfo,
    StoreRegistry,
};

/// Category name and its products: (barcode suffix, name, unit, selling price in cents).
const CATALOG: &[(&str, &[(u32, &str, Unit, i64)])] = &[
    (
        "Ichimliklar",
        &[
            (1, "Coca-Cola 1.5L", Unit::Piece, 1_200_000),
            (2, "Mineral suv 0.5L", Unit::Piece, 300_000),
            (3, "Olma sharbati 1L", Unit::Liter, 1_500_000),
        ],
    ),
    (
        "Non mahsulotlari",
        &[
            (11, "Non", Unit::Piece, 400_000),
            (12, "Lavash", Unit::Piece, 500_000),
        ],
    ),
    (
        "Sut mahsulotlari",
        &[
            (21, "Sut 1L", Unit::Liter, 1_100_000),
            (22, "Qatiq", Unit::Piece, 900_000),
            (23, "Pishloq", Unit::Kg, 9_500_000),
        ],
    ),
    (
        "Bozor",
        &[
            (31, "Kartoshka", Unit::Kg, 600_000),
            (32, "Arqon", Unit::Meter, 200_000),
        ],
    ),
];

const DEFAULT_STORES: &[(&str, &str)] = &[("store1", "./store1.db"), ("store2", "./store2.db")];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn")),
        )
        .with_target(false)
        .init();

    // Parse command line arguments
    let args: Vec<String> = env::args().collect();

    let mut stores: Vec<(String, String)> = Vec::new();
    let mut password = String::from("admin123");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                let value = args.get(i + 1).context("--db needs alias=path")?;
                let (alias, path) = value
                    .split_once('=')
                    .with_context(|| format!("expected alias=path, got {value}"))?;
                stores.push((alias.to_string(), path.to_string()));
                i += 1;
            }
            "--password" | "-p" => {
                password = args.get(i + 1).context("--password needs a value")?.clone();
                i += 1;
            }
            "--help" | "-h" => {
                println!("Outlet POS Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <ALIAS=PATH>   Store database, repeatable (default: store1, store2)");
                println!("  -p, --password <PASS>   Password of the seeded admin user (default: admin123)");
                println!("  -h, --help              Show this help message");
                return Ok(());
            }
            other => bail!("unknown argument: {other}"),
        }
        i += 1;
    }

    if stores.is_empty() {
        stores = DEFAULT_STORES
            .iter()
            .map(|(alias, path)| (alias.to_string(), path.to_string()))
            .collect();
    }

    let registry = StoreRegistry::open(
        stores
            .iter()
            .map(|(alias, path)| (StoreInfo::new(alias.as_str(), alias.as_str()), DbConfig::new(path))),
    )
    .await?;

    for store in registry.stores() {
        let db = registry.using(&store.alias)?;

        let existing = db.products().count().await?;
        if existing > 0 {
            info!(store = %store.alias, products = existing, "Store already seeded, skipping");
            continue;
        }

        seed_store(db, &password)
            .await
            .with_context(|| format!("seeding {}", store.alias))?;
        info!(store = %store.alias, "Seed complete");
    }

    registry.close().await;
    Ok(())
}

async fn seed_store(db: &Database, password: &str) -> anyhow::Result<()> {
    let admin = match db.users().get_by_username("admin").await? {
        Some(user) => user,
        None => db.users().create("admin", password, true).await?,
    };

    let today = Utc::now().date_naive();
    let older = days_before(today, 30)?;
    let newer = days_before(today, 7)?;
    let expiry = today
        .checked_add_days(Days::new(180))
        .context("expiry date out of range")?;

    let mut first_products = Vec::new();

    for (category_name, products) in CATALOG {
        let category = db.categories().create(category_name).await?;

        for (suffix, name, unit, price) in products.iter() {
            let product = db
                .products()
                .create(&NewProduct {
                    barcode: format!("47800000{:05}", suffix),
                    name: name.to_string(),
                    category_id: category.id,
                    image: None,
                    unit: *unit,
                    created_by: admin.id,
                })
                .await?;

            // An older, cheaper delivery and a newer one; FIFO sells the older first
            for (n, (arrival, selling, quantity)) in [(older, *price * 9 / 10, 20), (newer, *price, 40)]
                .into_iter()
                .enumerate()
            {
                db.batches()
                    .receive(&NewBatch {
                        product_id: product.id,
                        batch_number: format!("P{:05}-{}", suffix, n + 1),
                        purchase_price: Money::from_cents(selling * 7 / 10),
                        selling_price: Money::from_cents(selling),
                        quantity,
                        arrival_date: arrival,
                        expiry_date: expiry,
                        created_by: admin.id,
                    })
                    .await?;
            }

            if first_products.len() < 2 {
                first_products.push(product.id);
            }
        }
    }

    let receipt = db
        .sales()
        .checkout(&CheckoutRequest {
            cashier_id: admin.id,
            lines: first_products
                .iter()
                .map(|&product_id| CartLine {
                    product_id,
                    quantity: 2,
                })
                .collect(),
            tax_rate: TaxRate::zero(),
            payment_method: PaymentMethod::Cash,
            payment: Money::from_cents(10_000_000),
        })
        .await?;

    let first_item = receipt.items.first().context("sample sale has no items")?;
    db.returns()
        .process_return(&ReturnRequest {
            sale_id: receipt.sale.id,
            cashier_id: admin.id,
            reason: "Qadoq shikastlangan".to_string(),
            lines: vec![ReturnLine {
                sale_item_id: first_item.id,
                quantity: 1,
            }],
        })
        .await?;

    Ok(())
}

fn days_before(day: NaiveDate, days: u64) -> anyhow::Result<NaiveDate> {
    day.checked_sub_days(Days::new(days))
        .context("date out of range")
}
