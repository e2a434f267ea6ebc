//! Identity Resolver
//!
//! Per feed record, decides whether the record is a brand-new dealer, a
//! renumbered dealer, a collision with an unrelated occupant of the target id,
//! an in-place update, or a no-op, and drives the migrator/initializer
//! accordingly. The business key (gssn) identifies a dealer across id
//! changes; the feed id is authoritative for where that dealer must end up.

use anyhow::Result;
use sqlx::SqlitePool;

use crate::feed::ShowroomDto;
use crate::store::dealers;
use crate::store::models::Dealer;

use super::registry::DependentRegistry;
use super::{initializer, migrator, SyncError};

/// Positions on geographic coordinates closer than this are considered equal;
/// the feed jitters in the low decimals.
const COORDINATE_TOLERANCE: f64 = 0.01;

/// What the resolver did with one feed record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Dealer did not exist locally and was created (occupant relocated first
    /// if the target id was taken).
    Created,
    /// Dealer existed under a different id and was moved to the feed's id.
    Renumbered,
    /// Dealer existed at the right id but a tracked field changed.
    Updated,
    /// Dealer existed at the right id with all tracked fields equal.
    Unchanged,
}

/// Mints fresh dealer ids for relocating collision occupants.
///
/// Candidate is `1 + max(id)` over all dealers, archived included, clamped to
/// a monotonic watermark: within one pass ids are never reused even if a
/// lower id is freed by a later deletion. Safe only while a single sync pass
/// runs against the store, which is the stated operational constraint.
#[derive(Debug, Default)]
pub struct IdAllocator {
    watermark: i64,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn next(&mut self, pool: &SqlitePool) -> Result<i64> {
        let max = dealers::max_id(pool).await?.unwrap_or(0);
        let id = (max + 1).max(self.watermark + 1);
        self.watermark = id;
        Ok(id)
    }
}

/// Run the identity state machine for one feed record.
pub async fn resolve_showroom(
    pool: &SqlitePool,
    registry: &DependentRegistry,
    allocator: &mut IdAllocator,
    showroom: &ShowroomDto,
) -> Result<Resolution> {
    match dealers::find_by_gssn(pool, &showroom.gssn).await? {
        None => {
            // NEW: relocate whoever currently holds the target id, then
            // create. The occupant move commits before creation is attempted.
            if let Some(occupant) = dealers::find_by_id(pool, showroom.id).await? {
                let fresh_id = allocator.next(pool).await?;
                log::info!(
                    "Dealer id {} occupied by gssn {}; relocating occupant to {}",
                    showroom.id,
                    occupant.gssn,
                    fresh_id
                );
                relocate(pool, registry, &occupant, fresh_id).await?;
            }

            create_dealer(pool, showroom).await?;

            if let Err(e) = initializer::create_dependent_rows(pool, registry, showroom.id).await {
                // The dealer row itself is already committed and stays.
                log::error!(
                    "Dependent-row initialization failed for dealer {}: {:#}",
                    showroom.id,
                    e
                );
            }

            Ok(Resolution::Created)
        }
        Some(existing) if existing.id != showroom.id => {
            // RENUMBER: the dealer is known but the feed moved it to another
            // id. Free the target first if a third dealer is sitting on it.
            if let Some(occupant) = dealers::find_by_id(pool, showroom.id).await? {
                let fresh_id = allocator.next(pool).await?;
                log::info!(
                    "Renumber target {} occupied by gssn {}; relocating occupant to {}",
                    showroom.id,
                    occupant.gssn,
                    fresh_id
                );
                relocate(pool, registry, &occupant, fresh_id).await?;
            }

            create_dealer(pool, showroom).await?;
            migrator::migrate_relations(pool, registry, existing.id, showroom.id).await;
            dealers::delete(pool, existing.id).await?;

            log::info!(
                "Renumbered dealer gssn {} from {} to {}",
                showroom.gssn,
                existing.id,
                showroom.id
            );
            Ok(Resolution::Renumbered)
        }
        Some(existing) => {
            if tracked_fields_differ(&existing, showroom) {
                let updated = Dealer {
                    is_archive: existing.is_archive,
                    ..dealer_from_feed(showroom)
                };
                dealers::update(pool, &updated).await?;
                Ok(Resolution::Updated)
            } else {
                Ok(Resolution::Unchanged)
            }
        }
    }
}

/// Move an existing dealer row (and everything referencing it) to a fresh id:
/// insert a copy under the new id, migrate relations, delete the old row.
async fn relocate(
    pool: &SqlitePool,
    registry: &DependentRegistry,
    dealer: &Dealer,
    new_id: i64,
) -> Result<()> {
    let moved = Dealer {
        id: new_id,
        ..dealer.clone()
    };
    dealers::insert(pool, &moved).await?;

    migrator::migrate_relations(pool, registry, dealer.id, new_id).await;

    dealers::delete(pool, dealer.id).await?;

    Ok(())
}

/// Create the dealer row for a feed record at the feed's id.
///
/// A feed record whose city cannot be resolved locally violates the city
/// prerequisite and is rejected before any row is written.
async fn create_dealer(pool: &SqlitePool, showroom: &ShowroomDto) -> Result<()> {
    let city_known = match showroom.city_id {
        Some(city_id) => crate::store::cities::exists(pool, city_id).await?,
        None => false,
    };
    if !city_known {
        return Err(SyncError::MissingCity {
            dealer_id: showroom.id,
            city_id: showroom.city_id,
        }
        .into());
    }

    dealers::insert(pool, &dealer_from_feed(showroom)).await?;

    Ok(())
}

fn dealer_from_feed(showroom: &ShowroomDto) -> Dealer {
    Dealer {
        id: showroom.id,
        gssn: showroom.gssn.clone(),
        name: showroom.name.clone(),
        city_id: showroom.city_id,
        address: showroom.address.clone(),
        cofico: showroom.cofico.clone().unwrap_or_else(|| "0".to_string()),
        fax: showroom.fax.clone(),
        latitude: showroom.latitude,
        longitude: showroom.longitude,
        phone: showroom.phone.clone(),
        url: showroom.site.clone(),
        is_archive: false,
    }
}

/// True when any tracked business field differs, coordinates compared within
/// [`COORDINATE_TOLERANCE`].
fn tracked_fields_differ(local: &Dealer, showroom: &ShowroomDto) -> bool {
    let cofico = showroom.cofico.as_deref().unwrap_or("0");

    local.name != showroom.name
        || local.city_id != showroom.city_id
        || local.address != showroom.address
        || local.cofico != cofico
        || local.fax != showroom.fax
        || local.gssn != showroom.gssn
        || local.phone != showroom.phone
        || local.url != showroom.site
        || (local.latitude - showroom.latitude).abs() > COORDINATE_TOLERANCE
        || (local.longitude - showroom.longitude).abs() > COORDINATE_TOLERANCE
}
