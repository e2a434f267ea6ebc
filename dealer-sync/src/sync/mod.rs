//! Dealer/city catalog synchronization engine
//!
//! One run is a single-threaded, run-to-completion batch pass: cities first
//! (dealers reference them), then every showroom record in feed delivery
//! order through the identity resolver, then one archival sweep. Each logical
//! step commits on its own; a crashed run is recovered by simply re-running
//! the pass, which absorbs already-applied records as no-ops. Exactly one
//! pass may be active against the store at a time.

pub mod archive;
pub mod cities;
pub mod initializer;
pub mod migrator;
pub mod registry;
pub mod resolver;

use std::collections::HashSet;

use anyhow::{Context, Result};
use sqlx::SqlitePool;

use crate::feed::DealerFeed;

use self::registry::DependentRegistry;
use self::resolver::{IdAllocator, Resolution};

/// Invariant violations detected while resolving a single record. Scoped to
/// that record: the per-record handler logs it and the pass continues.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// A feed dealer references a city with no local row (or no city at all).
    MissingCity {
        dealer_id: i64,
        city_id: Option<i64>,
    },
}

impl std::fmt::Display for SyncError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncError::MissingCity { dealer_id, city_id } => match city_id {
                Some(city_id) => write!(
                    f,
                    "dealer {} references city {} which does not exist locally",
                    dealer_id, city_id
                ),
                None => write!(f, "dealer {} has no city reference", dealer_id),
            },
        }
    }
}

impl std::error::Error for SyncError {}

/// Outcome counters for one completed pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub cities_synced: u64,
    pub dealers_created: u64,
    pub dealers_renumbered: u64,
    pub dealers_updated: u64,
    pub dealers_archived: u64,
    pub record_failures: u64,
}

impl SyncReport {
    /// True when the pass wrote nothing: every dealer reached the no-op state
    /// and nothing was archived.
    pub fn is_noop(&self) -> bool {
        self.dealers_created == 0
            && self.dealers_renumbered == 0
            && self.dealers_updated == 0
            && self.dealers_archived == 0
    }
}

/// The sync pass, bound to a store pool, the process-scoped dependent-family
/// registry and a feed implementation.
pub struct SyncEngine<F> {
    pool: SqlitePool,
    registry: DependentRegistry,
    feed: F,
}

impl<F: DealerFeed> SyncEngine<F> {
    pub fn new(pool: SqlitePool, registry: DependentRegistry, feed: F) -> Self {
        Self {
            pool,
            registry,
            feed,
        }
    }

    /// Run one full pass. Fails as a whole only when a feed fetch fails;
    /// everything after that point degrades per record.
    pub async fn run(&self) -> Result<SyncReport> {
        let mut report = SyncReport::default();

        let feed_cities = self
            .feed
            .fetch_cities()
            .await
            .context("City feed fetch failed")?;
        report.cities_synced = cities::sync_cities(&self.pool, &feed_cities).await?;

        let showrooms = self
            .feed
            .fetch_showrooms()
            .await
            .context("Showroom feed fetch failed")?;
        log::info!(
            "Processing {} showroom records from the feed",
            showrooms.len()
        );

        let mut allocator = IdAllocator::new();
        for showroom in &showrooms {
            match resolver::resolve_showroom(&self.pool, &self.registry, &mut allocator, showroom)
                .await
            {
                Ok(Resolution::Created) => report.dealers_created += 1,
                Ok(Resolution::Renumbered) => report.dealers_renumbered += 1,
                Ok(Resolution::Updated) => report.dealers_updated += 1,
                Ok(Resolution::Unchanged) => {}
                Err(e) => {
                    report.record_failures += 1;
                    log::error!(
                        "Dealer sync failed (gssn {}, id {}): {:#}",
                        showroom.gssn,
                        showroom.id,
                        e
                    );
                }
            }
        }

        let feed_ids: HashSet<i64> = showrooms.iter().map(|s| s.id).collect();
        match archive::archive_missing(&self.pool, &feed_ids).await {
            Ok(archived) => report.dealers_archived = archived,
            Err(e) => log::error!("Archival sweep failed: {:#}", e),
        }

        if report.is_noop() {
            log::info!("Pass complete: catalog already up to date");
        } else {
            log::info!(
                "Pass complete: {} created, {} renumbered, {} updated, {} archived, {} failures",
                report.dealers_created,
                report.dealers_renumbered,
                report.dealers_updated,
                report.dealers_archived,
                report.record_failures
            );
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::{CityDto, DealerFeed, ShowroomDto};
    use crate::store;
    use async_trait::async_trait;

    /// In-memory feed snapshot standing in for the HTTP endpoints.
    struct StaticFeed {
        cities: Vec<CityDto>,
        showrooms: Vec<ShowroomDto>,
        fail: bool,
    }

    impl StaticFeed {
        fn new(cities: Vec<CityDto>, showrooms: Vec<ShowroomDto>) -> Self {
            Self {
                cities,
                showrooms,
                fail: false,
            }
        }

        fn unreachable() -> Self {
            Self {
                cities: Vec::new(),
                showrooms: Vec::new(),
                fail: true,
            }
        }
    }

    #[async_trait]
    impl DealerFeed for StaticFeed {
        async fn fetch_cities(&self) -> Result<Vec<CityDto>> {
            if self.fail {
                anyhow::bail!("connection refused");
            }
            Ok(self.cities.clone())
        }

        async fn fetch_showrooms(&self) -> Result<Vec<ShowroomDto>> {
            if self.fail {
                anyhow::bail!("connection refused");
            }
            Ok(self.showrooms.clone())
        }
    }

    async fn test_pool() -> SqlitePool {
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        store::init_schema(&pool).await.unwrap();
        pool
    }

    fn engine(pool: &SqlitePool, feed: StaticFeed) -> SyncEngine<StaticFeed> {
        SyncEngine::new(pool.clone(), DependentRegistry::new(), feed)
    }

    fn city(id: i64, name: &str) -> CityDto {
        CityDto {
            id,
            name: name.to_string(),
        }
    }

    fn showroom(id: i64, gssn: &str, city_id: i64) -> ShowroomDto {
        ShowroomDto {
            id,
            gssn: gssn.to_string(),
            name: format!("Dealer {}", gssn),
            city_id: Some(city_id),
            address: "Main St 1".to_string(),
            cofico: Some("C1".to_string()),
            fax: "000".to_string(),
            latitude: 55.75,
            longitude: 37.61,
            phone: "111".to_string(),
            site: "https://example.test".to_string(),
        }
    }

    async fn count(pool: &SqlitePool, sql: &str) -> i64 {
        let row: (i64,) = sqlx::query_as(sql).fetch_one(pool).await.unwrap();
        row.0
    }

    async fn dependent_rows_for(pool: &SqlitePool, dealer_id: i64) -> Vec<(&'static str, i64)> {
        let mut counts = Vec::new();
        for table in [
            "dealer_profiles",
            "bonus_accounts",
            "sales_plans",
            "marketing_budgets",
            "conn_projects",
            "campaign_registrations",
        ] {
            let n = count(
                pool,
                &format!("SELECT COUNT(*) FROM {} WHERE dealer_id = {}", table, dealer_id),
            )
            .await;
            counts.push((table, n));
        }
        counts
    }

    /// Every dependent/companion/multi-row record must point at an existing
    /// dealer once a pass completes.
    async fn assert_no_dangling_refs(pool: &SqlitePool) {
        for table in [
            "dealer_profiles",
            "bonus_accounts",
            "sales_plans",
            "marketing_budgets",
            "conn_projects",
            "campaign_registrations",
        ] {
            let dangling = count(
                pool,
                &format!(
                    "SELECT COUNT(*) FROM {} WHERE dealer_id NOT IN (SELECT id FROM dealers)",
                    table
                ),
            )
            .await;
            assert_eq!(dangling, 0, "{} has rows referencing no dealer", table);
        }
    }

    #[tokio::test]
    async fn test_first_pass_creates_dealers_with_dependents() {
        let pool = test_pool().await;
        let feed = StaticFeed::new(
            vec![city(10, "Hamburg")],
            vec![showroom(1, "G1", 10), showroom(2, "G2", 10)],
        );

        let report = engine(&pool, feed).run().await.unwrap();

        assert_eq!(report.cities_synced, 1);
        assert_eq!(report.dealers_created, 2);
        assert_eq!(report.record_failures, 0);

        for id in [1, 2] {
            assert!(store::dealers::find_by_id(&pool, id).await.unwrap().is_some());
            assert_eq!(
                count(&pool, &format!("SELECT COUNT(*) FROM dealer_profiles WHERE dealer_id = {}", id)).await,
                1
            );
            assert_eq!(
                count(&pool, &format!("SELECT COUNT(*) FROM bonus_accounts WHERE dealer_id = {}", id)).await,
                1
            );
        }
        assert_no_dangling_refs(&pool).await;
    }

    #[tokio::test]
    async fn test_second_pass_with_unchanged_feed_is_noop() {
        let pool = test_pool().await;
        let cities = vec![city(10, "Hamburg")];
        let showrooms = vec![showroom(1, "G1", 10), showroom(2, "G2", 10)];

        engine(&pool, StaticFeed::new(cities.clone(), showrooms.clone()))
            .run()
            .await
            .unwrap();
        let second = engine(&pool, StaticFeed::new(cities, showrooms))
            .run()
            .await
            .unwrap();

        assert!(second.is_noop(), "second pass wrote: {:?}", second);
        assert_eq!(second.record_failures, 0);
    }

    #[tokio::test]
    async fn test_collision_swap_relocates_occupant_to_fresh_id() {
        let pool = test_pool().await;
        let cities = vec![city(10, "Hamburg")];

        // A(Id=1, G1), B(Id=2, G2) locally.
        engine(
            &pool,
            StaticFeed::new(cities.clone(), vec![showroom(1, "G1", 10), showroom(2, "G2", 10)]),
        )
        .run()
        .await
        .unwrap();

        // The feed reassigns G1 to id 2 and stops delivering G2, so G2 is
        // displaced to a fresh id by the collision and archived by the sweep.
        let report = engine(&pool, StaticFeed::new(cities, vec![showroom(2, "G1", 10)]))
            .run()
            .await
            .unwrap();
        assert_eq!(report.record_failures, 0);

        // G1 now occupies id 2; G2 was relocated to the fresh id 3.
        let g1 = store::dealers::find_by_gssn(&pool, "G1").await.unwrap().unwrap();
        let g2 = store::dealers::find_by_gssn(&pool, "G2").await.unwrap().unwrap();
        assert_eq!(g1.id, 2);
        assert_eq!(g2.id, 3, "occupant should hold fresh id max+1");
        assert!(!g1.is_archive);
        assert!(g2.is_archive, "displaced dealer left the feed, so it is swept");

        // Dependents followed both dealers to their final ids.
        for (table, n) in dependent_rows_for(&pool, 2).await {
            if matches!(table, "dealer_profiles" | "bonus_accounts" | "conn_projects") {
                assert_eq!(n, 1, "{} for dealer 2", table);
            }
        }
        for (table, n) in dependent_rows_for(&pool, 3).await {
            if matches!(table, "dealer_profiles" | "bonus_accounts" | "conn_projects") {
                assert_eq!(n, 1, "{} for dealer 3", table);
            }
        }
        assert_no_dangling_refs(&pool).await;

        // The old id of G1 is gone entirely (renumber deletes the old row).
        assert!(store::dealers::find_by_id(&pool, 1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_pure_renumber_conserves_dependent_row_counts() {
        let pool = test_pool().await;
        let cities = vec![city(10, "Hamburg")];

        engine(&pool, StaticFeed::new(cities.clone(), vec![showroom(1, "G1", 10)]))
            .run()
            .await
            .unwrap();

        // Give the dealer per-year and multi-row records to carry over.
        sqlx::raw_sql(
            "INSERT INTO sales_plans (dealer_id, year, target_units) VALUES (1, 2024, 10);
             INSERT INTO sales_plans (dealer_id, year, target_units) VALUES (1, 2025, 12);
             INSERT INTO campaign_registrations (dealer_id, campaign_id, status) VALUES (1, 7, 1);
             INSERT INTO campaign_registrations (dealer_id, campaign_id, status) VALUES (1, 8, 0);",
        )
        .execute(&pool)
        .await
        .unwrap();

        let before = dependent_rows_for(&pool, 1).await;

        // Feed renumbers G1 from 1 to 5; target id is free.
        let report = engine(&pool, StaticFeed::new(cities, vec![showroom(5, "G1", 10)]))
            .run()
            .await
            .unwrap();
        assert_eq!(report.dealers_renumbered, 1);
        assert_eq!(report.record_failures, 0);

        let after = dependent_rows_for(&pool, 5).await;
        let before_counts: Vec<i64> = before.iter().map(|(_, n)| *n).collect();
        let after_counts: Vec<i64> = after.iter().map(|(_, n)| *n).collect();
        assert_eq!(before_counts, after_counts, "row counts changed across renumber");

        assert!(store::dealers::find_by_id(&pool, 1).await.unwrap().is_none());
        assert_no_dangling_refs(&pool).await;
    }

    #[tokio::test]
    async fn test_absent_dealer_is_archived_never_deleted() {
        let pool = test_pool().await;
        let cities = vec![city(10, "Hamburg")];

        engine(
            &pool,
            StaticFeed::new(cities.clone(), vec![showroom(1, "G1", 10), showroom(2, "G2", 10)]),
        )
        .run()
        .await
        .unwrap();

        // G2 disappears from the feed.
        let report = engine(&pool, StaticFeed::new(cities, vec![showroom(1, "G1", 10)]))
            .run()
            .await
            .unwrap();
        assert_eq!(report.dealers_archived, 1);

        let g2 = store::dealers::find_by_id(&pool, 2).await.unwrap().unwrap();
        assert!(g2.is_archive);
        assert_eq!(g2.gssn, "G2");
        // History stays queryable.
        assert_eq!(
            count(&pool, "SELECT COUNT(*) FROM conn_projects WHERE dealer_id = 2").await,
            1
        );
    }

    #[tokio::test]
    async fn test_missing_city_skips_dealer_and_continues() {
        let pool = test_pool().await;
        // Feed delivers dealer {Id:5, Gssn:X, CityId:10} but no city 10.
        let feed = StaticFeed::new(
            vec![city(1, "Bremen")],
            vec![showroom(5, "X", 10), showroom(6, "Y", 1)],
        );

        let report = engine(&pool, feed).run().await.unwrap();

        assert_eq!(report.record_failures, 1);
        assert_eq!(report.dealers_created, 1);
        assert!(store::dealers::find_by_id(&pool, 5).await.unwrap().is_none());
        assert!(store::dealers::find_by_id(&pool, 6).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_fresh_ids_are_strictly_increasing_within_a_pass() {
        let pool = test_pool().await;
        let cities = vec![city(10, "Hamburg")];

        engine(
            &pool,
            StaticFeed::new(
                cities.clone(),
                vec![showroom(1, "G1", 10), showroom(2, "G2", 10), showroom(3, "G3", 10)],
            ),
        )
        .run()
        .await
        .unwrap();

        // Two new dealers collide with ids 1 and 2 in a single pass: both
        // occupants must move to distinct, strictly increasing fresh ids.
        let report = engine(
            &pool,
            StaticFeed::new(cities, vec![showroom(1, "G4", 10), showroom(2, "G5", 10)]),
        )
        .run()
        .await
        .unwrap();
        assert_eq!(report.dealers_created, 2);
        assert_eq!(report.record_failures, 0);

        let g1 = store::dealers::find_by_gssn(&pool, "G1").await.unwrap().unwrap();
        let g2 = store::dealers::find_by_gssn(&pool, "G2").await.unwrap().unwrap();
        assert_eq!(g1.id, 4, "first occupant takes max+1");
        assert_eq!(g2.id, 5, "second occupant takes the next fresh id");
        assert_no_dangling_refs(&pool).await;
    }

    #[tokio::test]
    async fn test_field_drift_is_updated_in_place() {
        let pool = test_pool().await;
        let cities = vec![city(10, "Hamburg")];

        engine(&pool, StaticFeed::new(cities.clone(), vec![showroom(1, "G1", 10)]))
            .run()
            .await
            .unwrap();

        let mut changed = showroom(1, "G1", 10);
        changed.phone = "999".to_string();
        let report = engine(&pool, StaticFeed::new(cities, vec![changed]))
            .run()
            .await
            .unwrap();

        assert_eq!(report.dealers_updated, 1);
        assert_eq!(report.dealers_created, 0);
        let dealer = store::dealers::find_by_id(&pool, 1).await.unwrap().unwrap();
        assert_eq!(dealer.phone, "999");
    }

    #[tokio::test]
    async fn test_feed_fetch_failure_fails_the_whole_pass() {
        let pool = test_pool().await;

        let result = engine(&pool, StaticFeed::unreachable()).run().await;

        assert!(result.is_err());
        // Nothing was written.
        assert_eq!(count(&pool, "SELECT COUNT(*) FROM cities").await, 0);
        assert_eq!(count(&pool, "SELECT COUNT(*) FROM dealers").await, 0);
    }
}
