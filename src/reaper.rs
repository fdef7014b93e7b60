//! Staleness reaper: the only path that closes postings

use crate::error::{Error, Result};
use crate::models::format_timestamp;
use crate::store::Database;
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Outcome of one reaper pass
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReapStats {
    pub retention_days: u32,
    pub cutoff: String,
    pub closed: usize,
    pub dry_run: bool,
}

/// Close every open posting whose `last_seen_at` predates the retention window.
///
/// Idempotent: a second pass without new observations closes nothing.
pub async fn reap(db: &Database, retention_days: u32, dry_run: bool) -> Result<ReapStats> {
    if retention_days == 0 {
        return Err(Error::Config("retention_days must be at least 1".to_string()));
    }

    let cutoff = format_timestamp(Utc::now() - Duration::days(i64::from(retention_days)));
    let closed = if dry_run {
        db.count_stale_postings(&cutoff).await?
    } else {
        db.close_stale_postings(&cutoff).await?
    };

    info!(
        retention_days,
        cutoff = %cutoff,
        closed,
        dry_run,
        "Reaper pass complete"
    );

    Ok(ReapStats {
        retention_days,
        cutoff,
        closed,
        dry_run,
    })
}
