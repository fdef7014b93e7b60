//! Status and host registry command implementations

use crate::config::Config;
use crate::crawl::url_hash;
use crate::error::{Error, Result};
use crate::models::{AtsHost, JobPosting};
use crate::store::{CrawlRun, Database, StoreStats};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Status information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusInfo {
    pub config_path: String,
    pub database_url: String,
    pub store: StoreStats,
    pub recent_runs: Vec<CrawlRun>,
}

/// Get system status
pub async fn cmd_status(config: &Config, db: &Database) -> Result<StatusInfo> {
    info!("Getting status");

    Ok(StatusInfo {
        config_path: config.paths.config_file.display().to_string(),
        database_url: config.database_url.clone(),
        store: db.get_stats().await?,
        recent_runs: db.list_recent_runs(5).await?,
    })
}

/// List registered hosts
pub async fn cmd_list_hosts(db: &Database, include_inactive: bool) -> Result<Vec<AtsHost>> {
    db.list_hosts(!include_inactive).await
}

/// Deactivate a host so the crawler skips it
pub async fn cmd_deactivate(db: &Database, domain: &str) -> Result<()> {
    if db.deactivate_host(domain).await? {
        info!(domain = %domain, "Host deactivated");
        Ok(())
    } else {
        Err(Error::Config(format!("Host not registered: {}", domain)))
    }
}

/// Find stored postings for a URL, ignoring tracking parameters and other
/// differences that normalization removes
pub async fn cmd_lookup(config: &Config, db: &Database, url: &str) -> Result<Vec<JobPosting>> {
    let hash = url_hash(url, &config.crawl.query_allowlist)?;
    db.find_postings_by_url_hash(&hash).await
}

/// Print status to console
pub fn print_status(status: &StatusInfo) {
    println!("\n📊 atscrawl Status\n");
    println!("Configuration: {}", status.config_path);
    println!("Database: {}", status.database_url);

    println!("\nHost Registry:");
    println!(
        "  Hosts: {} ({} active)",
        status.store.host_count, status.store.active_host_count
    );
    for (vendor, count) in &status.store.hosts_by_vendor {
        println!("    {}: {}", vendor, count);
    }

    println!("\nPosting Store:");
    println!("  Open: {}", status.store.open_postings);
    println!("  Closed: {}", status.store.closed_postings);

    if !status.recent_runs.is_empty() {
        println!("\nRecent Runs:");
        for run in &status.recent_runs {
            println!(
                "  {} {:<10} {:<9} {}",
                run.started_at,
                run.operation,
                run.status,
                run.completed_at.as_deref().unwrap_or("-")
            );
        }
    }
}

/// Print hosts to console
pub fn print_hosts(hosts: &[AtsHost]) {
    println!("\n🏢 Registered Hosts\n");

    if hosts.is_empty() {
        println!("No hosts registered. Use 'atscrawl seed' or 'atscrawl discover'.");
        return;
    }

    for host in hosts {
        let state = if host.is_active { "" } else { " (inactive)" };
        println!("• {} [{}]{}", host.domain, host.ats_type, state);
        println!("  Company: {}", host.company);
        println!("  Discovered: {}", host.discovered_at);
    }
}

/// Print looked-up postings to console
pub fn print_postings(postings: &[JobPosting]) {
    if postings.is_empty() {
        println!("No stored postings match that URL.");
        return;
    }

    for posting in postings {
        println!(
            "• {} [{}]",
            posting.job_title.as_deref().unwrap_or("(untitled)"),
            posting.status
        );
        println!("  URL: {}", posting.url);
        if let Some(company) = &posting.company {
            println!("  Company: {}", company);
        }
        if let Some(location) = &posting.location {
            println!("  Location: {}", location);
        }
        println!("  Last seen: {}", posting.last_seen_at);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AtsType;
    use crate::store::tests::setup_test_db;

    #[tokio::test]
    async fn test_deactivate_and_list() {
        let (db, _tmp) = setup_test_db().await;
        db.upsert_host(&AtsHost::new("jobs.lever.co", "Lever", AtsType::Lever))
            .await
            .unwrap();

        cmd_deactivate(&db, "jobs.lever.co").await.unwrap();
        assert!(cmd_deactivate(&db, "unknown.example.com").await.is_err());

        assert!(cmd_list_hosts(&db, false).await.unwrap().is_empty());
        assert_eq!(cmd_list_hosts(&db, true).await.unwrap().len(), 1);

        let status = cmd_status(&Config::default(), &db).await.unwrap();
        assert_eq!(status.store.host_count, 1);
        assert_eq!(status.store.active_host_count, 0);
    }

    #[tokio::test]
    async fn test_lookup_ignores_tracking_params() {
        let (db, _tmp) = setup_test_db().await;
        let config = Config::default();
        let url = "https://boards.greenhouse.io/vercel/jobs/12345";
        let posting = JobPosting::new(
            url,
            url_hash(url, &config.crawl.query_allowlist).unwrap(),
            "html".to_string(),
        );
        db.upsert_posting(&posting).await.unwrap();

        let found = cmd_lookup(&config, &db, &format!("{}?utm_source=linkedin", url))
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, posting.id);

        let missing = cmd_lookup(&config, &db, "https://jobs.lever.co/acme/1")
            .await
            .unwrap();
        assert!(missing.is_empty());
    }
}
