//! Seed the catalog with demo products.
//!
//! Intended for local development and staging. Each product gets a
//! generated name, a price between $4.00 and $150.00, and a stock level
//! between 0 and 50 so that out-of-stock paths are exercised too.

use tracing::info;

use heron_fulfillment::db;

const ADJECTIVES: &[&str] = &[
    "Coastal", "Granite", "Juniper", "Lakeside", "Meridian", "Northwind", "Prairie", "Saffron",
    "Timber", "Willow",
];

const NOUNS: &[&str] = &[
    "Mug", "Notebook", "Lantern", "Blanket", "Satchel", "Kettle", "Compass", "Journal", "Candle",
    "Thermos",
];

/// Insert `count` demo products.
///
/// # Errors
///
/// Returns an error if the database URL is missing or an insert fails.
pub async fn products(count: u32) -> Result<(), Box<dyn std::error::Error>> {
    let database_url = super::database_url()?;
    let pool = db::create_pool(&database_url).await?;

    info!(count, "Seeding demo products");

    for i in 0..count {
        let adjective = ADJECTIVES[i as usize % ADJECTIVES.len()];
        let noun = NOUNS[(i as usize / ADJECTIVES.len()) % NOUNS.len()];
        let name = format!("{adjective} {noun}");

        // Deterministic spread of prices and stock levels, including a
        // few zero-stock products.
        let price = 400 + i64::from(i) * 731 % 14_600;
        let stock = i32::try_from(i * 7 % 51).unwrap_or(0);

        sqlx::query(
            r"
            INSERT INTO store.product (name, price, stock, reserved, is_active)
            VALUES ($1, $2, $3, 0, TRUE)
            ",
        )
        .bind(&name)
        .bind(price)
        .bind(stock)
        .execute(&pool)
        .await?;

        info!(name = %name, price, stock, "Created product");
    }

    info!("Seeding complete!");
    Ok(())
}
