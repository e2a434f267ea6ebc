//! Relation Migrator
//!
//! Moves everything hanging off one dealer id to another: the generic
//! dependent families (bulk rewrite), the 1:1 companion row (payload carried
//! forward) and the multi-row campaign registrations (membership preserved).
//!
//! The three sub-steps are NOT wrapped in one transaction. Each sub-step
//! commits on its own, and a failure partway through leaves the earlier
//! sub-steps applied. A later pass that renumbers the dealer again is the
//! only self-heal path; this is a documented operational risk, not something
//! the migrator compensates for.

use anyhow::{Context, Result};
use sqlx::SqlitePool;

use crate::store::companions;
use crate::store::models::{CampaignRegistration, ConnProject};

use super::registry::DependentRegistry;

/// Move all dependent, companion and multi-row records from `old_id` to
/// `new_id`. Sub-step failures are logged with the id pair and swallowed;
/// a migration never fails the overall sync pass.
pub async fn migrate_relations(
    pool: &SqlitePool,
    registry: &DependentRegistry,
    old_id: i64,
    new_id: i64,
) {
    if let Err(e) = bulk_rewrite(pool, registry, old_id, new_id).await {
        log::error!(
            "Relation migration {} -> {}: bulk rewrite failed: {:#}",
            old_id,
            new_id,
            e
        );
    }

    if let Err(e) = move_companion(pool, old_id, new_id).await {
        log::error!(
            "Relation migration {} -> {}: companion move failed: {:#}",
            old_id,
            new_id,
            e
        );
    }

    if let Err(e) = move_registrations(pool, old_id, new_id).await {
        log::error!(
            "Relation migration {} -> {}: campaign registration move failed: {:#}",
            old_id,
            new_id,
            e
        );
    }
}

/// Rewrite `dealer_id` across every registry family in one batched command.
/// One round trip for the whole family set.
async fn bulk_rewrite(
    pool: &SqlitePool,
    registry: &DependentRegistry,
    old_id: i64,
    new_id: i64,
) -> Result<()> {
    let command = registry.rewrite_command(old_id, new_id);

    sqlx::raw_sql(&command)
        .execute(pool)
        .await
        .context("Bulk dealer_id rewrite failed")?;

    Ok(())
}

/// Re-key the companion row. If the old id never had one, a default row is
/// inserted under the new id so the one-companion-per-dealer invariant holds.
async fn move_companion(pool: &SqlitePool, old_id: i64, new_id: i64) -> Result<()> {
    match companions::find_conn_project(pool, old_id).await? {
        Some(existing) => {
            companions::delete_conn_project(pool, old_id).await?;
            companions::insert_conn_project(
                pool,
                &ConnProject {
                    dealer_id: new_id,
                    ..existing
                },
            )
            .await?;
        }
        None => {
            companions::insert_conn_project(pool, &ConnProject::default_for(new_id)).await?;
        }
    }

    Ok(())
}

/// Delete-and-reinsert the registration set under the new id. Ordering is
/// irrelevant, the payload set is what must survive.
async fn move_registrations(pool: &SqlitePool, old_id: i64, new_id: i64) -> Result<()> {
    let registrations = companions::registrations_for_dealer(pool, old_id).await?;

    companions::delete_registrations_for_dealer(pool, old_id).await?;

    for registration in registrations {
        companions::insert_registration(
            pool,
            &CampaignRegistration {
                dealer_id: new_id,
                ..registration
            },
        )
        .await?;
    }

    Ok(())
}
