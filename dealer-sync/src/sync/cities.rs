//! City Synchronizer
//!
//! Cities are a prerequisite of dealers (dealers reference them), so this runs
//! before any showroom record is processed. Removal order is mandatory:
//! referencing dealers get their city cleared before the city rows are
//! batch-deleted.

use std::collections::HashSet;

use anyhow::Result;
use sqlx::SqlitePool;

use crate::feed::CityDto;
use crate::store::models::City;
use crate::store::{cities, dealers};

/// Reconcile the local city table with the feed snapshot. Returns the number
/// of feed cities applied; one bad city record is logged and skipped without
/// blocking the rest.
pub async fn sync_cities(pool: &SqlitePool, feed_cities: &[CityDto]) -> Result<u64> {
    let local_ids = cities::all_ids(pool).await?;
    let feed_ids: HashSet<i64> = feed_cities.iter().map(|c| c.id).collect();

    let removed: Vec<i64> = local_ids
        .into_iter()
        .filter(|id| !feed_ids.contains(id))
        .collect();

    if !removed.is_empty() {
        log::info!("Removing {} cities absent from the feed", removed.len());
        dealers::clear_city_refs(pool, &removed).await?;
        cities::delete_ids(pool, &removed).await?;
    }

    let mut applied = 0;
    for city in feed_cities {
        match upsert_city(pool, city).await {
            Ok(()) => applied += 1,
            Err(e) => log::error!("City sync failed ({}): {:#}", city.id, e),
        }
    }

    Ok(applied)
}

async fn upsert_city(pool: &SqlitePool, city: &CityDto) -> Result<()> {
    if cities::find_by_id(pool, city.id).await?.is_some() {
        cities::update_name(pool, city.id, &city.name).await?;
    } else {
        cities::insert(
            pool,
            &City {
                id: city.id,
                name: city.name.clone(),
                sort_order: 0,
            },
        )
        .await?;
    }

    Ok(())
}
