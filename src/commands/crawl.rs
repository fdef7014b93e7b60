//! Crawl command implementation

use super::recorded;
use crate::config::Config;
use crate::crawl::{CrawlEngine, CrawlStats};
use crate::error::{Error, Result};
use crate::progress::add_progress_bar;
use crate::store::Database;
use tracing::info;

/// Crawl every active host, or a single registered domain
pub async fn cmd_crawl(config: &Config, db: &Database, domain: Option<&str>) -> Result<CrawlStats> {
    let hosts = match domain {
        Some(domain) => {
            let host = db
                .get_host_by_domain(domain)
                .await?
                .ok_or_else(|| Error::Config(format!("Host not registered: {}", domain)))?;
            vec![host]
        }
        None => db.list_hosts(true).await?,
    };

    info!(hosts = hosts.len(), "Crawling hosts");
    let progress = add_progress_bar(hosts.len() as u64, "hosts");
    let engine = CrawlEngine::new(config, db.clone())?.with_progress(progress.clone());

    let stats = recorded(db, "crawl", async {
        Ok::<_, Error>(engine.crawl_hosts(&hosts).await)
    })
    .await;
    progress.finish_and_clear();
    stats
}

/// Print crawl stats to console
pub fn print_crawl_stats(stats: &CrawlStats) {
    println!("\n✓ Crawl complete");
    println!("  Hosts visited: {}", stats.hosts_visited);
    println!(
        "  Listing pages: {} fetched, {} failed",
        stats.listing_pages_fetched, stats.listing_failures
    );
    println!("  Job pages attempted: {}", stats.job_pages_attempted);
    println!("  Postings inserted: {}", stats.postings_inserted);
    println!("  Postings updated: {}", stats.postings_updated);
    println!("  Job page failures: {}", stats.job_failures);

    if !stats.errors_by_domain.is_empty() {
        println!("\n  Errors by domain:");
        for (domain, count) in &stats.errors_by_domain {
            println!("    {}: {}", domain, count);
        }
    }
}
