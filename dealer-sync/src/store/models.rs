//! Row types for the catalog store

use sqlx::FromRow;

/// City reference row. Dealers point at it through `dealers.city_id`.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct City {
    pub id: i64,
    pub name: String,
    pub sort_order: i64,
}

/// Dealer row.
///
/// `id` mirrors the feed's externally assigned identifier and is reused by the
/// feed over time; `gssn` is the stable business key. At most one non-archived
/// dealer exists per gssn.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct Dealer {
    pub id: i64,
    pub gssn: String,
    pub name: String,
    pub city_id: Option<i64>,
    pub address: String,
    pub cofico: String,
    pub fax: String,
    pub latitude: f64,
    pub longitude: f64,
    pub phone: String,
    pub url: String,
    pub is_archive: bool,
}

/// Companion row, 1:1 with a dealer and keyed by the dealer id itself.
/// Every active dealer has exactly one.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct ConnProject {
    pub dealer_id: i64,
    pub complete_wheels: bool,
    pub service_contract: bool,
    pub service_online: bool,
    pub service_price: bool,
}

impl ConnProject {
    /// Companion row with all programs disabled, used when a dealer gains an
    /// id without ever having had a companion row under the old one.
    pub fn default_for(dealer_id: i64) -> Self {
        Self {
            dealer_id,
            complete_wheels: false,
            service_contract: false,
            service_online: false,
            service_price: false,
        }
    }
}

/// Multi-row relation: one dealer holds any number of campaign registrations.
/// Membership (the payload set) must survive a dealer id migration.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct CampaignRegistration {
    pub dealer_id: i64,
    pub campaign_id: i64,
    pub status: i64,
}
