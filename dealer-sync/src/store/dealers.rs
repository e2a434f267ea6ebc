//! Dealer repository functions

use anyhow::{Context, Result};
use sqlx::SqlitePool;

use super::models::Dealer;

const DEALER_COLUMNS: &str = "id, gssn, name, city_id, address, cofico, fax, \
     latitude, longitude, phone, url, is_archive";

/// Find a dealer by its stable business key. Archived dealers are included:
/// a dealer that reappears in the feed is matched, not duplicated. Active
/// dealers win when an archived row shares the gssn.
pub async fn find_by_gssn(pool: &SqlitePool, gssn: &str) -> Result<Option<Dealer>> {
    let sql = format!(
        "SELECT {} FROM dealers WHERE gssn = ? ORDER BY is_archive, id LIMIT 1",
        DEALER_COLUMNS
    );

    sqlx::query_as(&sql)
        .bind(gssn)
        .fetch_optional(pool)
        .await
        .context("Failed to look up dealer by gssn")
}

pub async fn find_by_id(pool: &SqlitePool, id: i64) -> Result<Option<Dealer>> {
    let sql = format!("SELECT {} FROM dealers WHERE id = ?", DEALER_COLUMNS);

    sqlx::query_as(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to look up dealer by id")
}

pub async fn insert(pool: &SqlitePool, dealer: &Dealer) -> Result<()> {
    sqlx::query(
        "INSERT INTO dealers (id, gssn, name, city_id, address, cofico, fax,
                              latitude, longitude, phone, url, is_archive)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(dealer.id)
    .bind(&dealer.gssn)
    .bind(&dealer.name)
    .bind(dealer.city_id)
    .bind(&dealer.address)
    .bind(&dealer.cofico)
    .bind(&dealer.fax)
    .bind(dealer.latitude)
    .bind(dealer.longitude)
    .bind(&dealer.phone)
    .bind(&dealer.url)
    .bind(dealer.is_archive)
    .execute(pool)
    .await
    .context("Failed to insert dealer")?;

    Ok(())
}

/// In-place update of all tracked business fields, keyed by id.
pub async fn update(pool: &SqlitePool, dealer: &Dealer) -> Result<()> {
    sqlx::query(
        "UPDATE dealers
         SET gssn = ?, name = ?, city_id = ?, address = ?, cofico = ?, fax = ?,
             latitude = ?, longitude = ?, phone = ?, url = ?
         WHERE id = ?",
    )
    .bind(&dealer.gssn)
    .bind(&dealer.name)
    .bind(dealer.city_id)
    .bind(&dealer.address)
    .bind(&dealer.cofico)
    .bind(&dealer.fax)
    .bind(dealer.latitude)
    .bind(dealer.longitude)
    .bind(&dealer.phone)
    .bind(&dealer.url)
    .bind(dealer.id)
    .execute(pool)
    .await
    .context("Failed to update dealer")?;

    Ok(())
}

/// Physically remove a dealer row. Only ever called for the old row of a
/// completed renumbering; absence from the feed is handled by archival.
pub async fn delete(pool: &SqlitePool, id: i64) -> Result<()> {
    sqlx::query("DELETE FROM dealers WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to delete dealer")?;

    Ok(())
}

/// Highest dealer id ever assigned locally, archived dealers included.
pub async fn max_id(pool: &SqlitePool) -> Result<Option<i64>> {
    let row: (Option<i64>,) = sqlx::query_as("SELECT MAX(id) FROM dealers")
        .fetch_one(pool)
        .await
        .context("Failed to query max dealer id")?;

    Ok(row.0)
}

pub async fn non_archived_ids(pool: &SqlitePool) -> Result<Vec<i64>> {
    let rows: Vec<(i64,)> =
        sqlx::query_as("SELECT id FROM dealers WHERE is_archive = 0 ORDER BY id")
            .fetch_all(pool)
            .await
            .context("Failed to list non-archived dealer ids")?;

    Ok(rows.into_iter().map(|(id,)| id).collect())
}

pub async fn set_archived(pool: &SqlitePool, id: i64) -> Result<()> {
    sqlx::query("UPDATE dealers SET is_archive = 1 WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to archive dealer")?;

    Ok(())
}

/// Null out `city_id` on every dealer referencing one of the given cities.
/// Runs before the city rows themselves are deleted.
pub async fn clear_city_refs(pool: &SqlitePool, city_ids: &[i64]) -> Result<()> {
    if city_ids.is_empty() {
        return Ok(());
    }

    let placeholders = vec!["?"; city_ids.len()].join(", ");
    let sql = format!(
        "UPDATE dealers SET city_id = NULL WHERE city_id IN ({})",
        placeholders
    );

    let mut query = sqlx::query(&sql);
    for id in city_ids {
        query = query.bind(id);
    }

    query
        .execute(pool)
        .await
        .context("Failed to clear dealer city references")?;

    Ok(())
}
