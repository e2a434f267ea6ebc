//! Companion (conn_project) and campaign-registration repository functions
//!
//! Both record kinds are keyed by dealer id but sit outside the generic
//! dependent-family registry: the companion is 1:1 with its own payload to
//! carry forward, and campaign registrations are a multi-row relation whose
//! membership must be preserved across a migration.

use anyhow::{Context, Result};
use sqlx::SqlitePool;

use super::models::{CampaignRegistration, ConnProject};

pub async fn find_conn_project(pool: &SqlitePool, dealer_id: i64) -> Result<Option<ConnProject>> {
    sqlx::query_as(
        "SELECT dealer_id, complete_wheels, service_contract, service_online, service_price
         FROM conn_projects WHERE dealer_id = ?",
    )
    .bind(dealer_id)
    .fetch_optional(pool)
    .await
    .context("Failed to look up conn project")
}

pub async fn insert_conn_project(pool: &SqlitePool, project: &ConnProject) -> Result<()> {
    sqlx::query(
        "INSERT INTO conn_projects (dealer_id, complete_wheels, service_contract,
                                    service_online, service_price)
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(project.dealer_id)
    .bind(project.complete_wheels)
    .bind(project.service_contract)
    .bind(project.service_online)
    .bind(project.service_price)
    .execute(pool)
    .await
    .context("Failed to insert conn project")?;

    Ok(())
}

pub async fn delete_conn_project(pool: &SqlitePool, dealer_id: i64) -> Result<()> {
    sqlx::query("DELETE FROM conn_projects WHERE dealer_id = ?")
        .bind(dealer_id)
        .execute(pool)
        .await
        .context("Failed to delete conn project")?;

    Ok(())
}

pub async fn registrations_for_dealer(
    pool: &SqlitePool,
    dealer_id: i64,
) -> Result<Vec<CampaignRegistration>> {
    sqlx::query_as(
        "SELECT dealer_id, campaign_id, status FROM campaign_registrations
         WHERE dealer_id = ? ORDER BY campaign_id",
    )
    .bind(dealer_id)
    .fetch_all(pool)
    .await
    .context("Failed to list campaign registrations")
}

pub async fn insert_registration(
    pool: &SqlitePool,
    registration: &CampaignRegistration,
) -> Result<()> {
    sqlx::query(
        "INSERT INTO campaign_registrations (dealer_id, campaign_id, status) VALUES (?, ?, ?)",
    )
    .bind(registration.dealer_id)
    .bind(registration.campaign_id)
    .bind(registration.status)
    .execute(pool)
    .await
    .context("Failed to insert campaign registration")?;

    Ok(())
}

pub async fn delete_registrations_for_dealer(pool: &SqlitePool, dealer_id: i64) -> Result<()> {
    sqlx::query("DELETE FROM campaign_registrations WHERE dealer_id = ?")
        .bind(dealer_id)
        .execute(pool)
        .await
        .context("Failed to delete campaign registrations")?;

    Ok(())
}
