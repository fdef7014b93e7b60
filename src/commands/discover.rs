//! Seed and discover command implementations

use super::recorded;
use crate::config::Config;
use crate::discovery::{DiscoveryEngine, DiscoveryStats, SeedStats};
use crate::error::{Error, Result};
use crate::store::Database;
use std::time::Duration;

/// Register the configured multi-tenant boards
pub async fn cmd_seed(config: &Config, db: &Database) -> Result<SeedStats> {
    let engine = DiscoveryEngine::new(config, db.clone())?;
    recorded(db, "seed", async { Ok::<_, Error>(engine.seed_hosts().await) }).await
}

/// Probe the candidate vocabulary and register fingerprinted hosts
pub async fn cmd_discover(
    config: &Config,
    db: &Database,
    max_time_ms: Option<u64>,
) -> Result<DiscoveryStats> {
    let engine = DiscoveryEngine::new(config, db.clone())?;
    let budget = max_time_ms.map(Duration::from_millis);
    recorded(db, "discover", engine.run(budget)).await
}

/// Print seed stats to console
pub fn print_seed_stats(stats: &SeedStats) {
    println!("\n✓ Seeding complete");
    println!("  Hosts registered: {}", stats.registered);
    println!("  Hosts refreshed: {}", stats.refreshed);
    if stats.failures > 0 {
        println!("  Registry write failures: {}", stats.failures);
    }
}

/// Print discovery stats to console
pub fn print_discovery_stats(stats: &DiscoveryStats) {
    println!("\n✓ Discovery complete");
    println!("  Candidates: {}", stats.candidates);
    println!("  Probed: {}", stats.probed);
    println!("  Unreachable: {}", stats.unreachable);
    println!("  No fingerprint: {}", stats.unmatched);
    println!("  Hosts registered: {}", stats.hosts_registered);
    println!("  Hosts refreshed: {}", stats.hosts_refreshed);
    if stats.persist_failures > 0 {
        println!("  Registry write failures: {}", stats.persist_failures);
    }
    for (vendor, count) in &stats.by_vendor {
        println!("    {}: {}", vendor, count);
    }
    if stats.budget_exhausted {
        println!("  ⚠ Time budget exhausted before all candidates were probed");
    }
}
