//! Render command implementation

use super::recorded;
use crate::config::Config;
use crate::error::Result;
use crate::render::{is_js_rendering_available, RenderScraper, RenderStats};
use crate::store::Database;
use tracing::warn;

/// Scrape the curated seed pages through the headless browser
pub async fn cmd_render(config: &Config, db: &Database) -> Result<RenderStats> {
    if !is_js_rendering_available() {
        warn!("Built without js-rendering; every seed will fail to render");
    }
    let scraper = RenderScraper::new(config, db.clone());
    recorded(db, "render", scraper.run()).await
}

/// Print render stats to console
pub fn print_render_stats(stats: &RenderStats) {
    println!("\n✓ Render scrape complete");
    println!("  Seeds visited: {}", stats.seeds_visited);
    println!("  Seed failures: {}", stats.seed_failures);
    println!("  Anchor fallbacks: {}", stats.anchor_fallbacks);
    println!("  Engineering listings: {}", stats.listings_found);
    println!("  Postings inserted: {}", stats.postings_inserted);
    println!("  Postings updated: {}", stats.postings_updated);
    if stats.persist_failures > 0 {
        println!("  Store failures: {}", stats.persist_failures);
    }
}
