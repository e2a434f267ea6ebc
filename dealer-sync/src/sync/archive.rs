//! Archival Sweeper
//!
//! Runs once after the whole feed has been processed: any non-archived local
//! dealer whose id the feed no longer delivers is flagged archived. Dealer
//! rows are never physically deleted so dependent and companion records keep
//! a resolvable dealer id for their history.

use std::collections::HashSet;

use anyhow::Result;
use sqlx::SqlitePool;

use crate::store::dealers;

/// Archive every active dealer absent from the feed id set. Returns how many
/// dealers were archived.
pub async fn archive_missing(pool: &SqlitePool, feed_ids: &HashSet<i64>) -> Result<u64> {
    let mut archived = 0;

    for id in dealers::non_archived_ids(pool).await? {
        if !feed_ids.contains(&id) {
            dealers::set_archived(pool, id).await?;
            archived += 1;
        }
    }

    if archived > 0 {
        log::info!("Archived {} dealers missing from the feed", archived);
    }

    Ok(archived)
}
