//! Repository layer for database operations

pub mod cities;
pub mod companions;
pub mod dealers;
pub mod models;

use std::path::Path;

use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;

/// Open (and create if missing) the catalog database.
pub async fn connect(path: &Path) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true);

    SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
        .with_context(|| format!("Failed to open database at {}", path.display()))
}

/// Bootstrap the catalog schema.
///
/// Idempotent; runs at every startup. The dependent-family tables here form a
/// closed set that must stay in lockstep with
/// [`crate::sync::registry::DependentFamily`].
pub async fn init_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::raw_sql(
        "CREATE TABLE IF NOT EXISTS cities (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            sort_order INTEGER NOT NULL DEFAULT 0
        );
        CREATE TABLE IF NOT EXISTS dealers (
            id INTEGER PRIMARY KEY,
            gssn TEXT NOT NULL,
            name TEXT NOT NULL,
            city_id INTEGER,
            address TEXT NOT NULL DEFAULT '',
            cofico TEXT NOT NULL DEFAULT '0',
            fax TEXT NOT NULL DEFAULT '',
            latitude REAL NOT NULL DEFAULT 0,
            longitude REAL NOT NULL DEFAULT 0,
            phone TEXT NOT NULL DEFAULT '',
            url TEXT NOT NULL DEFAULT '',
            is_archive INTEGER NOT NULL DEFAULT 0
        );
        CREATE TABLE IF NOT EXISTS conn_projects (
            dealer_id INTEGER PRIMARY KEY,
            complete_wheels INTEGER NOT NULL DEFAULT 0,
            service_contract INTEGER NOT NULL DEFAULT 0,
            service_online INTEGER NOT NULL DEFAULT 0,
            service_price INTEGER NOT NULL DEFAULT 0
        );
        CREATE TABLE IF NOT EXISTS campaign_registrations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            dealer_id INTEGER NOT NULL,
            campaign_id INTEGER NOT NULL,
            status INTEGER NOT NULL DEFAULT 0
        );
        CREATE TABLE IF NOT EXISTS dealer_profiles (
            dealer_id INTEGER PRIMARY KEY,
            logo_url TEXT,
            description TEXT
        );
        CREATE TABLE IF NOT EXISTS bonus_accounts (
            dealer_id INTEGER PRIMARY KEY,
            balance REAL NOT NULL DEFAULT 0
        );
        CREATE TABLE IF NOT EXISTS sales_plans (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            dealer_id INTEGER NOT NULL,
            year INTEGER NOT NULL,
            target_units INTEGER NOT NULL DEFAULT 0
        );
        CREATE TABLE IF NOT EXISTS marketing_budgets (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            dealer_id INTEGER NOT NULL,
            year INTEGER NOT NULL,
            amount REAL NOT NULL DEFAULT 0
        );",
    )
    .execute(pool)
    .await
    .context("Failed to initialize catalog schema")?;

    Ok(())
}
