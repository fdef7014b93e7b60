//! Domain discovery: probe candidate domains and register fingerprinted hosts
//!
//! Probes run in a bounded pool under a global request ceiling. Results are
//! consumed by a single coordinating loop that performs every registry write,
//! so an expired duration budget simply stops the stream: no new probes start,
//! in-flight probes are dropped and completed registrations stay in place.

mod candidates;
mod fingerprint;

pub use candidates::*;
pub use fingerprint::*;

use crate::config::Config;
use crate::crawl::GlobalRateLimiter;
use crate::error::{Error, Result};
use crate::fetch::{Fetcher, HttpFetcher};
use crate::models::{AtsHost, AtsType};
use crate::store::{Database, UpsertOutcome};
use futures::future::{self, BoxFuture, FutureExt};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Result of probing one candidate domain
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// A path answered 200 and a fingerprint matched
    Matched(AtsType),
    /// A path answered 200 but no fingerprint matched
    Unmatched,
    /// Every path failed
    Unreachable,
}

/// Aggregate statistics for one discovery run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiscoveryStats {
    pub candidates: usize,
    pub probed: usize,
    pub unreachable: usize,
    pub unmatched: usize,
    pub hosts_registered: usize,
    pub hosts_refreshed: usize,
    pub persist_failures: usize,
    pub by_vendor: BTreeMap<String, usize>,
    /// Matches whose vendor differs from the base domain that produced them
    pub vendor_mismatches: usize,
    /// The duration budget expired before every candidate was probed
    pub budget_exhausted: bool,
}

/// Statistics for static seeding
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SeedStats {
    pub registered: usize,
    pub refreshed: usize,
    pub failures: usize,
}

/// Discovery engine state
pub struct DiscoveryEngine {
    config: Config,
    db: Database,
    fetcher: Arc<dyn Fetcher>,
    limiter: Arc<GlobalRateLimiter>,
}

impl DiscoveryEngine {
    /// Create an engine backed by a reqwest fetcher
    pub fn new(config: &Config, db: Database) -> Result<Self> {
        let fetcher = HttpFetcher::new(&config.http.user_agent, config.discovery.probe_timeout())?;
        Ok(Self::with_fetcher(config, db, Arc::new(fetcher)))
    }

    /// Create an engine with a custom fetcher
    pub fn with_fetcher(config: &Config, db: Database, fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            limiter: Arc::new(GlobalRateLimiter::new(
                config.discovery.requests_per_second,
            )),
            config: config.clone(),
            db,
            fetcher,
        }
    }

    /// Probe every generated candidate, stopping early when `budget` expires
    pub async fn run(&self, budget: Option<Duration>) -> Result<DiscoveryStats> {
        let candidates = generate_candidates(&self.config.discovery);
        let budget = budget.or(self
            .config
            .discovery
            .max_duration_ms
            .map(Duration::from_millis));

        info!(
            candidates = candidates.len(),
            concurrency = self.config.discovery.concurrency,
            budget_ms = budget.map(|b| b.as_millis() as u64),
            "Starting discovery"
        );
        let stats = self.discover(candidates, budget).await;

        info!(
            probed = stats.probed,
            registered = stats.hosts_registered,
            refreshed = stats.hosts_refreshed,
            unreachable = stats.unreachable,
            budget_exhausted = stats.budget_exhausted,
            "Discovery complete"
        );
        Ok(stats)
    }

    /// Probe the given candidates and register every fingerprinted host
    pub async fn discover<C>(&self, candidates: Vec<C>, budget: Option<Duration>) -> DiscoveryStats
    where
        C: Into<Candidate>,
    {
        let candidates: Vec<Candidate> = candidates.into_iter().map(Into::into).collect();
        let mut stats = DiscoveryStats {
            candidates: candidates.len(),
            ..Default::default()
        };

        let deadline: BoxFuture<'static, ()> = match budget {
            Some(budget) => tokio::time::sleep(budget).boxed(),
            None => future::pending().boxed(),
        };

        let probes = stream::iter(candidates)
            .map(|candidate| {
                async move {
                    let outcome = self.probe(&candidate.domain).await;
                    (candidate, outcome)
                }
                .boxed()
            })
            .buffer_unordered(self.config.discovery.concurrency)
            .take_until(deadline);
        tokio::pin!(probes);

        while let Some((candidate, outcome)) = probes.next().await {
            let domain = candidate.domain;
            stats.probed += 1;
            match outcome {
                ProbeOutcome::Unreachable => stats.unreachable += 1,
                ProbeOutcome::Unmatched => stats.unmatched += 1,
                ProbeOutcome::Matched(ats_type) => {
                    if let Some(expected) = candidate.base_vendor.filter(|v| *v != ats_type) {
                        stats.vendor_mismatches += 1;
                        debug!(
                            domain = %domain,
                            base_vendor = %expected,
                            ats_type = %ats_type,
                            "Fingerprint differs from the base domain's vendor"
                        );
                    }
                    let host = AtsHost::new(&domain, company_from_domain(&domain), ats_type);
                    match self.db.upsert_host(&host).await {
                        Ok(outcome) => {
                            match outcome {
                                UpsertOutcome::Inserted => stats.hosts_registered += 1,
                                UpsertOutcome::Updated => stats.hosts_refreshed += 1,
                            }
                            *stats.by_vendor.entry(ats_type.to_string()).or_insert(0) += 1;
                            info!(domain = %domain, ats_type = %ats_type, "Host discovered");
                        }
                        Err(e) => {
                            stats.persist_failures += 1;
                            warn!(domain = %domain, "Failed to register host: {}", e);
                        }
                    }
                }
            }
        }

        stats.budget_exhausted = probes.is_stopped();
        if stats.budget_exhausted {
            info!(
                probed = stats.probed,
                remaining = stats.candidates - stats.probed,
                "Discovery budget exhausted"
            );
        }
        stats
    }

    /// Try each probe path in order; the first HTTP 200 decides the outcome
    pub async fn probe(&self, domain: &str) -> ProbeOutcome {
        let base = self.config.base_url(domain);
        let timeout = self.config.discovery.probe_timeout();

        for path in &self.config.discovery.probe_paths {
            let url = format!("{}{}", base.trim_end_matches('/'), path);
            self.limiter.wait().await;

            let result = match tokio::time::timeout(timeout, self.fetcher.fetch(&url)).await {
                Ok(result) => result,
                Err(_) => Err(Error::Timeout(format!("{} after {:?}", url, timeout))),
            };

            match result {
                Ok(page) if page.status == 200 => {
                    return match fingerprint(domain, &page.body) {
                        Some(ats_type) => ProbeOutcome::Matched(ats_type),
                        None => {
                            debug!(domain = %domain, path = %path, "No fingerprint matched");
                            ProbeOutcome::Unmatched
                        }
                    };
                }
                Ok(page) => {
                    debug!(url = %url, status = page.status, "Probe skipped non-200 response");
                }
                Err(e) => {
                    debug!(url = %url, "Probe failed: {}", e);
                }
            }
        }

        ProbeOutcome::Unreachable
    }

    /// Register the configured multi-tenant boards without probing.
    /// A failed write is counted and the remaining seeds still register.
    pub async fn seed_hosts(&self) -> SeedStats {
        let mut stats = SeedStats::default();
        for seed in &self.config.discovery.seed_hosts {
            let host = AtsHost::new(&seed.domain, company_from_domain(&seed.domain), seed.ats_type);
            match self.db.upsert_host(&host).await {
                Ok(UpsertOutcome::Inserted) => stats.registered += 1,
                Ok(UpsertOutcome::Updated) => stats.refreshed += 1,
                Err(e) => {
                    stats.failures += 1;
                    warn!(domain = %seed.domain, "Failed to seed host: {}", e);
                    continue;
                }
            }
            debug!(domain = %seed.domain, ats_type = %seed.ats_type, "Seeded host");
        }
        info!(
            registered = stats.registered,
            refreshed = stats.refreshed,
            failures = stats.failures,
            "Seed hosts registered"
        );
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SeedHost;
    use crate::fetch::FetchedPage;
    use crate::store::tests::{reject_host_inserts, setup_test_db};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn local_config() -> Config {
        let mut config = Config::default();
        config.http.scheme = "http".to_string();
        config.discovery.probe_timeout_ms = 2000;
        config.discovery.requests_per_second = 1000;
        config
    }

    #[tokio::test]
    async fn test_all_paths_404_registers_nothing() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .expect(4)
            .mount(&mock_server)
            .await;

        let (db, _tmp) = setup_test_db().await;
        let engine = DiscoveryEngine::new(&local_config(), db.clone()).unwrap();
        let domain = mock_server.address().to_string();

        let stats = engine.discover(vec![domain.clone()], None).await;

        assert_eq!(stats.probed, 1);
        assert_eq!(stats.unreachable, 1);
        assert_eq!(stats.hosts_registered, 0);
        assert!(db.get_host_by_domain(&domain).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_first_200_path_is_fingerprinted() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/careers"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"<iframe id="icims_content_iframe" src="https://careers-acme.icims.com/jobs"></iframe>"#,
            ))
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/jobs"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(r#"<a href="https://jobs.lever.co/acme">x</a>"#),
            )
            .expect(0)
            .mount(&mock_server)
            .await;

        let (db, _tmp) = setup_test_db().await;
        let engine = DiscoveryEngine::new(&local_config(), db.clone()).unwrap();
        let domain = mock_server.address().to_string();

        let stats = engine.discover(vec![domain.clone()], None).await;
        assert_eq!(stats.hosts_registered, 1);
        assert_eq!(stats.by_vendor.get("icims"), Some(&1));

        let host = db.get_host_by_domain(&domain).await.unwrap().unwrap();
        assert_eq!(host.get_type().unwrap(), AtsType::Icims);
        assert!(host.is_active);
    }

    #[tokio::test]
    async fn test_unmatched_body_registers_nothing() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<h1>Welcome</h1>"))
            .mount(&mock_server)
            .await;

        let (db, _tmp) = setup_test_db().await;
        let engine = DiscoveryEngine::new(&local_config(), db.clone()).unwrap();

        let stats = engine
            .discover(vec![mock_server.address().to_string()], None)
            .await;
        assert_eq!(stats.unmatched, 1);
        assert_eq!(db.get_stats().await.unwrap().host_count, 0);
    }

    #[tokio::test]
    async fn test_rediscovery_refreshes_but_keeps_discovered_at() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"<script src="https://boards.greenhouse.io/embed/job_board/js?for=acme"></script>"#,
            ))
            .mount(&mock_server)
            .await;

        let (db, _tmp) = setup_test_db().await;
        let domain = mock_server.address().to_string();
        db.upsert_host(&AtsHost::new(&domain, "Acme", AtsType::Lever))
            .await
            .unwrap();
        db.deactivate_host(&domain).await.unwrap();
        let before = db.get_host_by_domain(&domain).await.unwrap().unwrap();

        let engine = DiscoveryEngine::new(&local_config(), db.clone()).unwrap();
        let stats = engine.discover(vec![domain.clone()], None).await;
        assert_eq!(stats.hosts_refreshed, 1);

        let after = db.get_host_by_domain(&domain).await.unwrap().unwrap();
        assert_eq!(after.id, before.id);
        assert_eq!(after.discovered_at, before.discovered_at);
        assert_eq!(after.company, "Acme");
        assert_eq!(after.get_type().unwrap(), AtsType::Greenhouse);
        assert!(after.is_active);
    }

    /// Never answers within the test window
    struct StallingFetcher {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Fetcher for StallingFetcher {
        async fn fetch(&self, url: &str) -> Result<FetchedPage> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(FetchedPage {
                url: url.to_string(),
                final_url: url.to_string(),
                status: 200,
                body: "jobs.lever.co".to_string(),
            })
        }
    }

    #[tokio::test]
    async fn test_budget_stops_new_probes() {
        let (db, _tmp) = setup_test_db().await;
        let mut config = local_config();
        config.discovery.concurrency = 2;
        let fetcher = Arc::new(StallingFetcher {
            calls: AtomicUsize::new(0),
        });
        let engine = DiscoveryEngine::with_fetcher(&config, db.clone(), fetcher.clone());
        let domains: Vec<String> = (0..20).map(|i| format!("tenant{}.example.com", i)).collect();

        let started = std::time::Instant::now();
        let stats = engine
            .discover(domains, Some(Duration::from_millis(200)))
            .await;

        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(stats.budget_exhausted);
        assert_eq!(stats.probed, 0);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 2);
        assert_eq!(db.get_stats().await.unwrap().host_count, 0);
    }

    #[tokio::test]
    async fn test_seed_hosts() {
        let (db, _tmp) = setup_test_db().await;
        let mut config = local_config();
        config.discovery.seed_hosts = vec![
            SeedHost {
                domain: "boards.greenhouse.io".to_string(),
                ats_type: AtsType::Greenhouse,
            },
            SeedHost {
                domain: "jobs.lever.co".to_string(),
                ats_type: AtsType::Lever,
            },
        ];
        let engine = DiscoveryEngine::new(&config, db.clone()).unwrap();

        let first = engine.seed_hosts().await;
        assert_eq!(first.registered, 2);
        let second = engine.seed_hosts().await;
        assert_eq!(second.registered, 0);
        assert_eq!(second.refreshed, 2);

        let host = db
            .get_host_by_domain("boards.greenhouse.io")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(host.company, "Greenhouse");
        assert_eq!(host.get_type().unwrap(), AtsType::Greenhouse);
    }

    #[tokio::test]
    async fn test_failed_seed_write_does_not_stop_the_rest() {
        let (db, _tmp) = setup_test_db().await;
        reject_host_inserts(&db, "bad.example.com").await;

        let mut config = local_config();
        config.discovery.seed_hosts = vec![
            SeedHost {
                domain: "bad.example.com".to_string(),
                ats_type: AtsType::Greenhouse,
            },
            SeedHost {
                domain: "jobs.lever.co".to_string(),
                ats_type: AtsType::Lever,
            },
        ];
        let engine = DiscoveryEngine::new(&config, db.clone()).unwrap();

        let stats = engine.seed_hosts().await;
        assert_eq!(stats.failures, 1);
        assert_eq!(stats.registered, 1);
        assert!(db.get_host_by_domain("jobs.lever.co").await.unwrap().is_some());
        assert!(db.get_host_by_domain("bad.example.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_match_from_another_vendors_base_domain_is_counted() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/careers"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"<div id="grnhse_app"></div>"#,
            ))
            .mount(&mock_server)
            .await;

        let (db, _tmp) = setup_test_db().await;
        let engine = DiscoveryEngine::new(&local_config(), db.clone()).unwrap();
        let candidate = Candidate {
            domain: mock_server.address().to_string(),
            base_vendor: Some(AtsType::Workday),
        };

        let stats = engine.discover(vec![candidate], None).await;
        assert_eq!(stats.hosts_registered, 1);
        assert_eq!(stats.vendor_mismatches, 1);
        assert_eq!(stats.by_vendor.get("greenhouse"), Some(&1));
    }
}
