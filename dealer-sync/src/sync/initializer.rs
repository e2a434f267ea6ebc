//! Dependent-Row Initializer
//!
//! A freshly created dealer id must be represented in every dependent family:
//! one default row for each singleton family, and one row per already-observed
//! year for each per-year family. Without this, downstream record families
//! would have no slot to write into for the new dealer.

use anyhow::Result;
use sqlx::SqlitePool;

use crate::store::companions;
use crate::store::models::ConnProject;

use super::registry::{DependentRegistry, KeyPolicy};

/// Create the required dependent rows for a brand-new dealer id, plus the 1:1
/// companion row (every active dealer has exactly one).
///
/// The year set of a per-year family is derived from the distinct years
/// already present anywhere in that family's table, so a dealer created
/// mid-season gets the same planning rows its peers already have.
pub async fn create_dependent_rows(
    pool: &SqlitePool,
    registry: &DependentRegistry,
    dealer_id: i64,
) -> Result<()> {
    companions::insert_conn_project(pool, &ConnProject::default_for(dealer_id)).await?;

    for entry in registry.families() {
        match entry.key_policy {
            KeyPolicy::SingletonDefault => {
                entry.family.create_default_row(pool, dealer_id).await?;
            }
            KeyPolicy::PerYear => {
                for year in entry.family.distinct_years(pool).await? {
                    entry
                        .family
                        .create_row_for_year(pool, dealer_id, year)
                        .await?;
                }
            }
        }
    }

    Ok(())
}
