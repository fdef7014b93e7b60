//! Reap command implementation

use super::recorded;
use crate::config::Config;
use crate::error::Result;
use crate::reaper::{reap, ReapStats};
use crate::store::Database;

/// Close stale postings. `retention_days` overrides the configured window.
pub async fn cmd_reap(
    config: &Config,
    db: &Database,
    retention_days: Option<u32>,
    dry_run: bool,
) -> Result<ReapStats> {
    let days = retention_days.unwrap_or(config.reaper.retention_days);
    if dry_run {
        reap(db, days, true).await
    } else {
        recorded(db, "reap", reap(db, days, false)).await
    }
}

/// Print reap stats to console
pub fn print_reap_stats(stats: &ReapStats) {
    if stats.dry_run {
        println!("\n🔍 Dry run - no changes made\n");
        println!(
            "Would close {} postings not seen since {}",
            stats.closed, stats.cutoff
        );
    } else {
        println!("\n✓ Reaper pass complete");
        println!("  Retention: {} days", stats.retention_days);
        println!("  Postings closed: {}", stats.closed);
    }
}
