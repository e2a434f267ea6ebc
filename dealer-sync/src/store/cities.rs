//! City repository functions

use anyhow::{Context, Result};
use sqlx::SqlitePool;

use super::models::City;

/// Get the ids of all locally known cities
pub async fn all_ids(pool: &SqlitePool) -> Result<Vec<i64>> {
    let rows: Vec<(i64,)> = sqlx::query_as("SELECT id FROM cities ORDER BY id")
        .fetch_all(pool)
        .await
        .context("Failed to list city ids")?;

    Ok(rows.into_iter().map(|(id,)| id).collect())
}

pub async fn find_by_id(pool: &SqlitePool, id: i64) -> Result<Option<City>> {
    sqlx::query_as("SELECT id, name, sort_order FROM cities WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to look up city")
}

pub async fn exists(pool: &SqlitePool, id: i64) -> Result<bool> {
    let row: Option<(i64,)> = sqlx::query_as("SELECT 1 FROM cities WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to check city existence")?;

    Ok(row.is_some())
}

pub async fn insert(pool: &SqlitePool, city: &City) -> Result<()> {
    sqlx::query("INSERT INTO cities (id, name, sort_order) VALUES (?, ?, ?)")
        .bind(city.id)
        .bind(&city.name)
        .bind(city.sort_order)
        .execute(pool)
        .await
        .context("Failed to insert city")?;

    Ok(())
}

pub async fn update_name(pool: &SqlitePool, id: i64, name: &str) -> Result<()> {
    sqlx::query("UPDATE cities SET name = ? WHERE id = ?")
        .bind(name)
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to update city name")?;

    Ok(())
}

/// Batch-delete cities by id. Callers must have cleared dealer references
/// first; foreign-key integrity is their responsibility.
pub async fn delete_ids(pool: &SqlitePool, ids: &[i64]) -> Result<()> {
    if ids.is_empty() {
        return Ok(());
    }

    let placeholders = vec!["?"; ids.len()].join(", ");
    let sql = format!("DELETE FROM cities WHERE id IN ({})", placeholders);

    let mut query = sqlx::query(&sql);
    for id in ids {
        query = query.bind(id);
    }

    query
        .execute(pool)
        .await
        .context("Failed to batch-delete cities")?;

    Ok(())
}
