//! Dependent-Type Registry
//!
//! A closed, compile-time table of every record family that carries a
//! `dealer_id` foreign key, together with its key policy. The registry is
//! constructed once at startup and passed by reference into the resolver,
//! migrator and initializer; there is no lazy global state.
//!
//! Excluded on purpose: `conn_projects` (the 1:1 companion with payload to
//! carry forward) and `campaign_registrations` (multi-row relation). Both get
//! hand-written move logic in the migrator instead of the generic policies.

use anyhow::{Context, Result};
use sqlx::SqlitePool;

/// How rows of a family are keyed per dealer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyPolicy {
    /// Exactly one row per dealer.
    SingletonDefault,
    /// One row per (dealer, year); the year set is whatever distinct years
    /// already exist anywhere in the family's table.
    PerYear,
}

/// One record family carrying a `dealer_id` foreign key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DependentFamily {
    DealerProfiles,
    BonusAccounts,
    SalesPlans,
    MarketingBudgets,
}

impl DependentFamily {
    /// The full family set, in registry order. Must stay in lockstep with the
    /// tables created by [`crate::store::init_schema`].
    pub const ALL: [DependentFamily; 4] = [
        DependentFamily::DealerProfiles,
        DependentFamily::BonusAccounts,
        DependentFamily::SalesPlans,
        DependentFamily::MarketingBudgets,
    ];

    pub fn table(self) -> &'static str {
        match self {
            DependentFamily::DealerProfiles => "dealer_profiles",
            DependentFamily::BonusAccounts => "bonus_accounts",
            DependentFamily::SalesPlans => "sales_plans",
            DependentFamily::MarketingBudgets => "marketing_budgets",
        }
    }

    pub fn key_policy(self) -> KeyPolicy {
        match self {
            DependentFamily::DealerProfiles | DependentFamily::BonusAccounts => {
                KeyPolicy::SingletonDefault
            }
            DependentFamily::SalesPlans | DependentFamily::MarketingBudgets => KeyPolicy::PerYear,
        }
    }

    /// Insert the single default row for a freshly created dealer.
    /// Only meaningful for singleton-default families.
    pub async fn create_default_row(self, pool: &SqlitePool, dealer_id: i64) -> Result<()> {
        let sql = match self {
            DependentFamily::DealerProfiles => {
                "INSERT INTO dealer_profiles (dealer_id) VALUES (?)"
            }
            DependentFamily::BonusAccounts => "INSERT INTO bonus_accounts (dealer_id) VALUES (?)",
            DependentFamily::SalesPlans | DependentFamily::MarketingBudgets => {
                anyhow::bail!("{} is keyed per year, not singleton", self.table())
            }
        };

        sqlx::query(sql)
            .bind(dealer_id)
            .execute(pool)
            .await
            .with_context(|| format!("Failed to insert default {} row", self.table()))?;

        Ok(())
    }

    /// Insert the row for one (dealer, year) pair.
    /// Only meaningful for per-year families.
    pub async fn create_row_for_year(
        self,
        pool: &SqlitePool,
        dealer_id: i64,
        year: i64,
    ) -> Result<()> {
        let sql = match self {
            DependentFamily::SalesPlans => {
                "INSERT INTO sales_plans (dealer_id, year) VALUES (?, ?)"
            }
            DependentFamily::MarketingBudgets => {
                "INSERT INTO marketing_budgets (dealer_id, year) VALUES (?, ?)"
            }
            DependentFamily::DealerProfiles | DependentFamily::BonusAccounts => {
                anyhow::bail!("{} has no year column", self.table())
            }
        };

        sqlx::query(sql)
            .bind(dealer_id)
            .bind(year)
            .execute(pool)
            .await
            .with_context(|| format!("Failed to insert {} row for year {}", self.table(), year))?;

        Ok(())
    }

    /// Distinct years already present anywhere in this family's table, across
    /// all dealers. Empty for a family that has no rows yet.
    pub async fn distinct_years(self, pool: &SqlitePool) -> Result<Vec<i64>> {
        let sql = match self {
            DependentFamily::SalesPlans => "SELECT DISTINCT year FROM sales_plans ORDER BY year",
            DependentFamily::MarketingBudgets => {
                "SELECT DISTINCT year FROM marketing_budgets ORDER BY year"
            }
            DependentFamily::DealerProfiles | DependentFamily::BonusAccounts => {
                anyhow::bail!("{} has no year column", self.table())
            }
        };

        let rows: Vec<(i64,)> = sqlx::query_as(sql)
            .fetch_all(pool)
            .await
            .with_context(|| format!("Failed to list distinct years in {}", self.table()))?;

        Ok(rows.into_iter().map(|(year,)| year).collect())
    }

    /// The bulk-rewrite statement for this family, with `{old}`/`{new}` id
    /// placeholders. Table names come from this closed set, never from input.
    fn rewrite_statement(self) -> String {
        format!(
            "UPDATE {} SET dealer_id = {{new}} WHERE dealer_id = {{old}};",
            self.table()
        )
    }
}

/// Entry in the ordered family set exposed by the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FamilyEntry {
    pub family: DependentFamily,
    pub key_policy: KeyPolicy,
}

/// Process-scoped registry of dependent families.
///
/// Construction renders the multi-statement bulk-rewrite template once; every
/// migration reuses it with the concrete id pair substituted in.
#[derive(Debug, Clone)]
pub struct DependentRegistry {
    families: Vec<FamilyEntry>,
    rewrite_template: String,
}

impl DependentRegistry {
    pub fn new() -> Self {
        let families: Vec<FamilyEntry> = DependentFamily::ALL
            .iter()
            .map(|&family| FamilyEntry {
                family,
                key_policy: family.key_policy(),
            })
            .collect();

        let rewrite_template = families
            .iter()
            .map(|entry| entry.family.rewrite_statement())
            .collect::<Vec<_>>()
            .join("\n");

        Self {
            families,
            rewrite_template,
        }
    }

    /// The ordered set of dependent families and their key policies.
    pub fn families(&self) -> &[FamilyEntry] {
        &self.families
    }

    /// Render the batched rewrite command for one migration. Ids are integers
    /// formatted into the fixed template; SQLite cannot bind parameters across
    /// the statements of a batch.
    pub fn rewrite_command(&self, old_id: i64, new_id: i64) -> String {
        self.rewrite_template
            .replace("{old}", &old_id.to_string())
            .replace("{new}", &new_id.to_string())
    }
}

impl Default for DependentRegistry {
    fn default() -> Self {
        Self::new()
    }
}
