//! Crawl engine: turns active registry hosts into upserted job postings
//!
//! This module provides:
//! - Sequential listing-page fetches per host
//! - Job-detail link classification and extraction
//! - Bounded-parallel job page fetches per host
//! - URL normalization for the secondary lookup key
//! - The global request ceiling used by discovery probes

mod extract;
mod normalize;
mod rate_limit;

pub use extract::*;
pub use normalize::*;
pub use rate_limit::*;

use crate::config::Config;
use crate::error::Result;
use crate::fetch::{Fetcher, HttpFetcher};
use crate::models::{content_hash, AtsHost, JobPosting};
use crate::store::{Database, UpsertOutcome};
use futures::future::{BoxFuture, FutureExt};
use futures::stream::{self, StreamExt};
use indicatif::ProgressBar;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

/// Aggregate statistics for one crawl run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CrawlStats {
    pub hosts_visited: usize,
    pub listing_pages_fetched: usize,
    pub listing_failures: usize,
    pub job_pages_attempted: usize,
    pub postings_inserted: usize,
    pub postings_updated: usize,
    pub job_failures: usize,
    /// Failed fetches and upserts per originating domain
    pub errors_by_domain: BTreeMap<String, usize>,
}

impl CrawlStats {
    fn record_error(&mut self, domain: &str) {
        *self.errors_by_domain.entry(domain.to_string()).or_insert(0) += 1;
    }

    /// Fold another host's stats into this one
    pub fn merge(&mut self, other: CrawlStats) {
        self.hosts_visited += other.hosts_visited;
        self.listing_pages_fetched += other.listing_pages_fetched;
        self.listing_failures += other.listing_failures;
        self.job_pages_attempted += other.job_pages_attempted;
        self.postings_inserted += other.postings_inserted;
        self.postings_updated += other.postings_updated;
        self.job_failures += other.job_failures;
        for (domain, count) in other.errors_by_domain {
            *self.errors_by_domain.entry(domain).or_insert(0) += count;
        }
    }

    pub fn postings_stored(&self) -> usize {
        self.postings_inserted + self.postings_updated
    }
}

/// Crawl engine state
pub struct CrawlEngine {
    config: Config,
    db: Database,
    fetcher: Arc<dyn Fetcher>,
    progress: Option<ProgressBar>,
}

impl CrawlEngine {
    /// Create an engine backed by a reqwest fetcher
    pub fn new(config: &Config, db: Database) -> Result<Self> {
        let fetcher = HttpFetcher::new(
            &config.http.user_agent,
            Duration::from_secs(config.crawl.timeout_secs),
        )?;
        Ok(Self::with_fetcher(config, db, Arc::new(fetcher)))
    }

    /// Create an engine with a custom fetcher
    pub fn with_fetcher(config: &Config, db: Database, fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            config: config.clone(),
            db,
            fetcher,
            progress: None,
        }
    }

    /// Advance `progress` once per finished host
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Crawl every active host in the registry
    pub async fn run(&self) -> Result<CrawlStats> {
        let hosts = self.db.list_hosts(true).await?;
        info!(hosts = hosts.len(), "Starting crawl");
        if let Some(progress) = &self.progress {
            progress.set_length(hosts.len() as u64);
        }

        let stats = self.crawl_hosts(&hosts).await;

        info!(
            hosts = stats.hosts_visited,
            listings = stats.listing_pages_fetched,
            jobs = stats.job_pages_attempted,
            stored = stats.postings_stored(),
            failures = stats.job_failures,
            "Crawl complete"
        );
        Ok(stats)
    }

    /// Crawl the given hosts, started in order, independent of one another
    pub async fn crawl_hosts(&self, hosts: &[AtsHost]) -> CrawlStats {
        let host_futures: Vec<BoxFuture<'_, CrawlStats>> = hosts
            .iter()
            .map(|host| {
                async move {
                    let stats = self.crawl_host(host).await;
                    if let Some(progress) = &self.progress {
                        progress.inc(1);
                    }
                    stats
                }
                .boxed()
            })
            .collect();
        let per_host: Vec<CrawlStats> = stream::iter(host_futures)
            .buffer_unordered(self.config.crawl.host_concurrency)
            .collect()
            .await;

        let mut stats = CrawlStats::default();
        for host_stats in per_host {
            stats.merge(host_stats);
        }
        stats
    }

    /// Crawl a single host. Failures are tallied, never propagated.
    pub async fn crawl_host(&self, host: &AtsHost) -> CrawlStats {
        let mut stats = CrawlStats {
            hosts_visited: 1,
            ..Default::default()
        };

        let base = match Url::parse(&self.config.base_url(&host.domain)) {
            Ok(base) => base,
            Err(e) => {
                warn!(domain = %host.domain, "Invalid host domain: {}", e);
                stats.record_error(&host.domain);
                return stats;
            }
        };

        // One listing fetch in flight per host
        let mut seen = HashSet::new();
        let mut candidates = Vec::new();
        for path in self.config.crawl.listing_paths_for(&host.domain) {
            let listing_url = match base.join(path) {
                Ok(url) => url.to_string(),
                Err(e) => {
                    warn!(domain = %host.domain, path = %path, "Bad listing path: {}", e);
                    continue;
                }
            };

            match self.fetcher.fetch(&listing_url).await {
                Ok(page) => {
                    stats.listing_pages_fetched += 1;
                    let links = extract_job_links(&page.body, &page.final_url);
                    debug!(url = %listing_url, links = links.len(), "Listing page parsed");
                    for link in links {
                        if seen.insert(link.clone()) {
                            candidates.push(link);
                        }
                    }
                }
                Err(e) => {
                    stats.listing_failures += 1;
                    stats.record_error(&host.domain);
                    debug!(url = %listing_url, "Listing fetch failed: {}", e);
                }
            }
        }

        if candidates.is_empty() {
            debug!(domain = %host.domain, "No job links found");
            return stats;
        }

        stats.job_pages_attempted = candidates.len();
        let outcomes: Vec<(String, Result<UpsertOutcome>)> = stream::iter(candidates)
            .map(|url| {
                async move {
                    let outcome = self.process_job(host, &url).await;
                    (url, outcome)
                }
                .boxed()
            })
            .buffer_unordered(self.config.crawl.job_concurrency)
            .collect()
            .await;

        // Aggregated only after every job future has settled
        for (url, outcome) in outcomes {
            match outcome {
                Ok(UpsertOutcome::Inserted) => stats.postings_inserted += 1,
                Ok(UpsertOutcome::Updated) => stats.postings_updated += 1,
                Err(e) => {
                    stats.job_failures += 1;
                    stats.record_error(&host.domain);
                    if e.is_transient() {
                        debug!(url = %url, "Job fetch failed: {}", e);
                    } else {
                        warn!(url = %url, "Job page skipped: {}", e);
                    }
                }
            }
        }

        info!(
            domain = %host.domain,
            jobs = stats.job_pages_attempted,
            inserted = stats.postings_inserted,
            updated = stats.postings_updated,
            failures = stats.job_failures,
            "Host crawled"
        );
        stats
    }

    async fn process_job(&self, host: &AtsHost, url: &str) -> Result<UpsertOutcome> {
        let page = self.fetcher.fetch(url).await?;
        let posting = build_posting(&self.config, host, url, &page.body)?;
        self.db.upsert_posting(&posting).await
    }
}

/// Build the posting row for a fetched job page
pub fn build_posting(config: &Config, host: &AtsHost, url: &str, html: &str) -> Result<JobPosting> {
    let fields = extract_job_fields(html, config.crawl.title_max_chars);
    let mut posting = JobPosting::new(
        url,
        url_hash(url, &config.crawl.query_allowlist)?,
        content_hash(html),
    );
    posting.ats_host_id = Some(host.id.clone());
    posting.company = Some(host.company.clone());
    posting.job_family = fields
        .title
        .as_deref()
        .and_then(classify_job_family)
        .map(str::to_string);
    posting.job_title = fields.title;
    posting.location = fields.location;
    Ok(posting)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BoardPaths;
    use crate::error::Error;
    use crate::fetch::FetchedPage;
    use crate::models::{AtsType, PostingStatus};
    use crate::store::tests::setup_test_db;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn local_config(domain: &str, paths: &[&str]) -> Config {
        let mut config = Config::default();
        config.http.scheme = "http".to_string();
        config.crawl.boards = vec![BoardPaths {
            domain: domain.to_string(),
            paths: paths.iter().map(|p| p.to_string()).collect(),
        }];
        config
    }

    fn html_response(body: &str) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_raw(body.as_bytes().to_vec(), "text/html")
    }

    #[tokio::test]
    async fn test_greenhouse_board_crawl() {
        let mock_server = MockServer::start().await;
        let domain = mock_server.address().to_string();

        Mock::given(method("GET"))
            .and(path("/vercel"))
            .respond_with(html_response(
                r#"<html><body>
                    <a href="/vercel/jobs/12345-backend-engineer">Backend Engineer</a>
                    <a href="/vercel">Home</a>
                    <a href="mailto:jobs@vercel.com">Email</a>
                </body></html>"#,
            ))
            .mount(&mock_server)
            .await;

        Mock::given(method("GET"))
            .and(path("/vercel/jobs/12345-backend-engineer"))
            .respond_with(html_response(
                "<html><body><h1>Backend Engineer</h1><p>San Francisco, CA</p></body></html>",
            ))
            .mount(&mock_server)
            .await;

        let (db, _tmp) = setup_test_db().await;
        let config = local_config(&domain, &["/vercel"]);
        let host = AtsHost::new(&domain, "Vercel", AtsType::Greenhouse);
        db.upsert_host(&host).await.unwrap();

        let engine = CrawlEngine::new(&config, db.clone()).unwrap();
        let stats = engine.run().await.unwrap();

        assert_eq!(stats.hosts_visited, 1);
        assert_eq!(stats.listing_pages_fetched, 1);
        assert_eq!(stats.job_pages_attempted, 1);
        assert_eq!(stats.postings_inserted, 1);

        let url = format!("{}/vercel/jobs/12345-backend-engineer", mock_server.uri());
        let posting = db.get_posting_by_url(&url).await.unwrap().unwrap();
        assert_eq!(posting.get_status().unwrap(), PostingStatus::Open);
        assert_eq!(posting.job_title.as_deref(), Some("Backend Engineer"));
        assert_eq!(posting.location.as_deref(), Some("San Francisco, CA"));
        assert_eq!(posting.job_family.as_deref(), Some("engineering"));
        assert_eq!(posting.ats_host_id.as_deref(), Some(host.id.as_str()));
    }

    #[tokio::test]
    async fn test_recrawl_updates_content_but_keeps_identity() {
        let mock_server = MockServer::start().await;
        let domain = mock_server.address().to_string();

        Mock::given(method("GET"))
            .and(path("/jobs"))
            .respond_with(html_response(r#"<a href="/jobs/77-sre">SRE</a>"#))
            .mount(&mock_server)
            .await;

        Mock::given(method("GET"))
            .and(path("/jobs/77-sre"))
            .respond_with(html_response("<h1>Site Reliability Engineer</h1>"))
            .up_to_n_times(1)
            .with_priority(1)
            .mount(&mock_server)
            .await;

        Mock::given(method("GET"))
            .and(path("/jobs/77-sre"))
            .respond_with(html_response("<h1>Senior Site Reliability Engineer</h1>"))
            .with_priority(2)
            .mount(&mock_server)
            .await;

        let (db, _tmp) = setup_test_db().await;
        let config = local_config(&domain, &["/jobs"]);
        let host = AtsHost::new(&domain, "Acme", AtsType::Lever);
        db.upsert_host(&host).await.unwrap();
        let engine = CrawlEngine::new(&config, db.clone()).unwrap();
        let url = format!("{}/jobs/77-sre", mock_server.uri());

        engine.run().await.unwrap();
        let first = db.get_posting_by_url(&url).await.unwrap().unwrap();

        tokio::time::sleep(Duration::from_millis(5)).await;
        let stats = engine.run().await.unwrap();
        assert_eq!(stats.postings_updated, 1);
        let second = db.get_posting_by_url(&url).await.unwrap().unwrap();

        assert_eq!(second.id, first.id);
        assert_eq!(second.discovered_at, first.discovered_at);
        assert_ne!(second.html_hash, first.html_hash);
        assert_eq!(
            second.job_title.as_deref(),
            Some("Senior Site Reliability Engineer")
        );
        assert!(second.last_seen_at > first.last_seen_at);
        assert_eq!(db.get_stats().await.unwrap().open_postings, 1);
    }

    #[tokio::test]
    async fn test_failures_are_isolated_and_tallied() {
        let mock_server = MockServer::start().await;
        let domain = mock_server.address().to_string();

        Mock::given(method("GET"))
            .and(path("/broken"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&mock_server)
            .await;

        Mock::given(method("GET"))
            .and(path("/careers"))
            .respond_with(html_response(
                r#"<a href="/jobs/1-good">Good</a><a href="/jobs/2-gone">Gone</a>"#,
            ))
            .mount(&mock_server)
            .await;

        Mock::given(method("GET"))
            .and(path("/jobs/1-good"))
            .respond_with(html_response("<h1>Good Job</h1>"))
            .mount(&mock_server)
            .await;

        Mock::given(method("GET"))
            .and(path("/jobs/2-gone"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;

        let (db, _tmp) = setup_test_db().await;
        let config = local_config(&domain, &["/broken", "/careers"]);
        db.upsert_host(&AtsHost::new(&domain, "Acme", AtsType::Workable))
            .await
            .unwrap();

        let stats = CrawlEngine::new(&config, db.clone())
            .unwrap()
            .run()
            .await
            .unwrap();

        assert_eq!(stats.listing_failures, 1);
        assert_eq!(stats.listing_pages_fetched, 1);
        assert_eq!(stats.job_pages_attempted, 2);
        assert_eq!(stats.postings_inserted, 1);
        assert_eq!(stats.job_failures, 1);
        assert_eq!(stats.errors_by_domain.get(&domain), Some(&2));

        // a failing host is never deactivated by the crawler
        let host = db.get_host_by_domain(&domain).await.unwrap().unwrap();
        assert!(host.is_active);
    }

    /// Serves one listing page with many job links and tracks in-flight job fetches
    struct CountingFetcher {
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    #[async_trait]
    impl Fetcher for CountingFetcher {
        async fn fetch(&self, url: &str) -> crate::error::Result<FetchedPage> {
            if url.ends_with("/jobs") {
                let links: String = (0..12)
                    .map(|i| format!(r#"<a href="/jobs/{}-role">Role</a>"#, i))
                    .collect();
                return Ok(FetchedPage {
                    url: url.to_string(),
                    final_url: url.to_string(),
                    status: 200,
                    body: links,
                });
            }
            if url.ends_with("/jobs/5-role") {
                return Err(Error::Timeout(url.to_string()));
            }

            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            Ok(FetchedPage {
                url: url.to_string(),
                final_url: url.to_string(),
                status: 200,
                body: "<h1>Role</h1>".to_string(),
            })
        }
    }

    #[tokio::test]
    async fn test_job_fetches_respect_concurrency_bound() {
        let (db, _tmp) = setup_test_db().await;
        let mut config = local_config("bounded.example.com", &["/jobs"]);
        config.crawl.job_concurrency = 3;

        let fetcher = Arc::new(CountingFetcher {
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        });
        let engine = CrawlEngine::with_fetcher(&config, db.clone(), fetcher.clone());
        let host = AtsHost::new("bounded.example.com", "Bounded", AtsType::Ashby);
        db.upsert_host(&host).await.unwrap();

        let stats = engine.crawl_host(&host).await;

        assert_eq!(stats.job_pages_attempted, 12);
        assert_eq!(stats.postings_inserted, 11);
        assert_eq!(stats.job_failures, 1);
        let max = fetcher.max_in_flight.load(Ordering::SeqCst);
        assert!(max <= 3, "saw {} concurrent job fetches", max);
        assert!(max >= 2);
    }

    #[test]
    fn test_build_posting_fields() {
        let config = Config::default();
        let host = AtsHost::new("jobs.lever.co", "Lever", AtsType::Lever);
        let posting = build_posting(
            &config,
            &host,
            "https://jobs.lever.co/acme/1?utm_source=x",
            "<h1>Data Scientist</h1><div>New York, NY</div>",
        )
        .unwrap();

        assert_eq!(posting.url, "https://jobs.lever.co/acme/1?utm_source=x");
        assert_eq!(
            posting.url_hash,
            url_hash("https://jobs.lever.co/acme/1", &config.crawl.query_allowlist).unwrap()
        );
        assert_eq!(posting.job_family.as_deref(), Some("data"));
        assert_eq!(posting.location.as_deref(), Some("New York, NY"));
        assert_eq!(posting.company.as_deref(), Some("Lever"));
    }
}
