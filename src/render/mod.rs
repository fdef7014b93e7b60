//! Render-based fallback scraper for client-rendered listing pages
//!
//! This module provides:
//! - A headless browser renderer behind the [`PageRenderer`] trait
//! - Per-vendor selector strategies with an anchor-scan fallback
//! - Seed visits paced by a fixed delay, writing into the posting store

mod renderer;
mod strategies;

pub use renderer::*;
pub use strategies::*;

use crate::config::{Config, RenderSeed};
use crate::crawl::{classify_job_family, url_hash};
use crate::error::Result;
use crate::models::{content_hash, JobPosting};
use crate::store::{Database, UpsertOutcome};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

/// Aggregate statistics for one render run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RenderStats {
    pub seeds_visited: usize,
    pub seed_failures: usize,
    pub anchor_fallbacks: usize,
    pub listings_found: usize,
    pub postings_inserted: usize,
    pub postings_updated: usize,
    pub persist_failures: usize,
    pub errors_by_domain: BTreeMap<String, usize>,
}

impl RenderStats {
    fn record_error(&mut self, domain: &str) {
        *self.errors_by_domain.entry(domain.to_string()).or_insert(0) += 1;
    }
}

/// Headless fallback scraper
pub struct RenderScraper {
    config: Config,
    db: Database,
    renderer: Arc<dyn PageRenderer>,
}

impl RenderScraper {
    /// Create a scraper backed by a headless browser
    pub fn new(config: &Config, db: Database) -> Self {
        let renderer = HeadlessRenderer::new(RendererConfig::from(&config.render));
        Self::with_renderer(config, db, Arc::new(renderer))
    }

    /// Create a scraper with a custom renderer
    pub fn with_renderer(config: &Config, db: Database, renderer: Arc<dyn PageRenderer>) -> Self {
        Self {
            config: config.clone(),
            db,
            renderer,
        }
    }

    /// Visit every configured seed, then release the browser
    pub async fn run(&self) -> Result<RenderStats> {
        info!(seeds = self.config.render.seeds.len(), "Starting render scrape");

        let stats = self.scrape_seeds(&self.config.render.seeds).await;
        let closed = self.renderer.close().await;

        info!(
            visited = stats.seeds_visited,
            failures = stats.seed_failures,
            listings = stats.listings_found,
            inserted = stats.postings_inserted,
            updated = stats.postings_updated,
            "Render scrape complete"
        );
        closed.map(|_| stats)
    }

    /// Visit seeds in order. The configured delay runs from the end of one
    /// visit to the start of the next. Does not close the renderer.
    pub async fn scrape_seeds(&self, seeds: &[RenderSeed]) -> RenderStats {
        let delay = Duration::from_millis(self.config.render.visit_delay_ms);
        let mut stats = RenderStats::default();

        for (i, seed) in seeds.iter().enumerate() {
            if i > 0 && !delay.is_zero() {
                debug!(delay_ms = self.config.render.visit_delay_ms, "Waiting before next seed");
                tokio::time::sleep(delay).await;
            }
            self.scrape_seed(seed, &mut stats).await;
        }
        stats
    }

    async fn scrape_seed(&self, seed: &RenderSeed, stats: &mut RenderStats) {
        let domain = Url::parse(&seed.url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_else(|| seed.url.clone());

        let page = match self.renderer.render(&seed.url).await {
            Ok(page) => page,
            Err(e) => {
                stats.seed_failures += 1;
                stats.record_error(&domain);
                warn!(company = %seed.company, url = %seed.url, "Render failed: {}", e);
                return;
            }
        };
        stats.seeds_visited += 1;

        let extraction = extract_listings(seed.vendor, &page.html, &page.url);
        if extraction.source == ListingSource::AnchorFallback {
            stats.anchor_fallbacks += 1;
        }
        stats.listings_found += extraction.listings.len();
        debug!(
            company = %seed.company,
            source = ?extraction.source,
            candidates = extraction.candidates,
            kept = extraction.listings.len(),
            "Seed page extracted"
        );

        let host_id = match self.db.get_host_by_domain(&domain).await {
            Ok(host) => host.map(|h| h.id),
            Err(e) => {
                debug!(domain = %domain, "Host lookup failed: {}", e);
                None
            }
        };

        for listing in extraction.listings {
            let outcome = match self.posting_from_listing(seed, host_id.as_deref(), &listing) {
                Ok(posting) => self.db.upsert_posting(&posting).await,
                Err(e) => Err(e),
            };
            match outcome {
                Ok(UpsertOutcome::Inserted) => stats.postings_inserted += 1,
                Ok(UpsertOutcome::Updated) => stats.postings_updated += 1,
                Err(e) => {
                    stats.persist_failures += 1;
                    stats.record_error(&domain);
                    warn!(url = %listing.url, "Failed to store rendered listing: {}", e);
                }
            }
        }
    }

    fn posting_from_listing(
        &self,
        seed: &RenderSeed,
        host_id: Option<&str>,
        listing: &RenderedListing,
    ) -> Result<JobPosting> {
        let mut posting = JobPosting::new(
            &listing.url,
            url_hash(&listing.url, &self.config.crawl.query_allowlist)?,
            content_hash(&listing.html),
        );
        posting.ats_host_id = host_id.map(str::to_string);
        posting.company = Some(seed.company.clone());
        posting.job_family = classify_job_family(&listing.title).map(str::to_string);
        posting.job_title = Some(listing.title.clone());
        posting.location = listing.location.clone();
        posting.department = listing.department.clone();
        Ok(posting)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::models::{AtsHost, AtsType};
    use crate::store::tests::setup_test_db;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Instant;

    /// Serves canned HTML per URL; unknown URLs fail to render
    struct FakeRenderer {
        pages: HashMap<String, String>,
        closes: AtomicUsize,
    }

    impl FakeRenderer {
        fn new(pages: &[(&str, &str)]) -> Self {
            Self {
                pages: pages
                    .iter()
                    .map(|(u, h)| (u.to_string(), h.to_string()))
                    .collect(),
                closes: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl PageRenderer for FakeRenderer {
        async fn render(&self, url: &str) -> Result<RenderedPage> {
            self.pages
                .get(url)
                .map(|html| RenderedPage {
                    url: url.to_string(),
                    html: html.clone(),
                    render_time_ms: 1,
                })
                .ok_or_else(|| Error::Render(format!("navigation failed: {}", url)))
        }

        async fn close(&self) -> Result<()> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    const LEVER_URL: &str = "https://jobs.lever.co/netflix";
    const LEVER_PAGE: &str = r#"
        <div class="posting">
          <a class="posting-title" href="https://jobs.lever.co/netflix/1a2b">
            <h5 data-qa="posting-name">Backend Engineer</h5>
          </a>
          <span class="sort-by-location">Los Gatos, California</span>
          <span class="sort-by-team">Platform</span>
        </div>
        <div class="posting">
          <a class="posting-title" href="https://jobs.lever.co/netflix/5e6f">
            <h5 data-qa="posting-name">Talent Partner</h5>
          </a>
        </div>
    "#;

    fn config_with_seeds(seeds: Vec<RenderSeed>, delay_ms: u64) -> Config {
        let mut config = Config::default();
        config.render.seeds = seeds;
        config.render.visit_delay_ms = delay_ms;
        config
    }

    fn seed(vendor: AtsType, company: &str, url: &str) -> RenderSeed {
        RenderSeed {
            vendor,
            company: company.to_string(),
            url: url.to_string(),
        }
    }

    #[tokio::test]
    async fn test_render_run_stores_postings_and_closes_browser() {
        let (db, _tmp) = setup_test_db().await;
        let host = AtsHost::new("jobs.lever.co", "Lever", AtsType::Lever);
        db.upsert_host(&host).await.unwrap();

        let config = config_with_seeds(
            vec![
                seed(AtsType::Workday, "Broken", "https://broken.wd1.myworkdayjobs.com/x"),
                seed(AtsType::Lever, "Netflix", LEVER_URL),
            ],
            0,
        );
        let renderer = Arc::new(FakeRenderer::new(&[(LEVER_URL, LEVER_PAGE)]));
        let scraper = RenderScraper::with_renderer(&config, db.clone(), renderer.clone());

        let stats = scraper.run().await.unwrap();

        assert_eq!(stats.seed_failures, 1);
        assert_eq!(stats.seeds_visited, 1);
        assert_eq!(stats.listings_found, 1);
        assert_eq!(stats.postings_inserted, 1);
        assert_eq!(
            stats.errors_by_domain.get("broken.wd1.myworkdayjobs.com"),
            Some(&1)
        );
        assert_eq!(renderer.closes.load(Ordering::SeqCst), 1);

        let posting = db
            .get_posting_by_url("https://jobs.lever.co/netflix/1a2b")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(posting.job_title.as_deref(), Some("Backend Engineer"));
        assert_eq!(posting.company.as_deref(), Some("Netflix"));
        assert_eq!(posting.department.as_deref(), Some("Platform"));
        assert_eq!(posting.job_family.as_deref(), Some("engineering"));
        assert_eq!(posting.ats_host_id.as_deref(), Some(host.id.as_str()));
    }

    #[tokio::test]
    async fn test_render_and_static_paths_share_identity() {
        let (db, _tmp) = setup_test_db().await;
        let url = "https://jobs.lever.co/netflix/1a2b";

        // the static crawler saw the page first
        let mut first = JobPosting::new(url, "static-hash".into(), "static-html".into());
        first.job_title = Some("Backend Engineer".into());
        db.upsert_posting(&first).await.unwrap();

        let config = config_with_seeds(vec![seed(AtsType::Lever, "Netflix", LEVER_URL)], 0);
        let renderer = Arc::new(FakeRenderer::new(&[(LEVER_URL, LEVER_PAGE)]));
        let stats = RenderScraper::with_renderer(&config, db.clone(), renderer)
            .run()
            .await
            .unwrap();

        assert_eq!(stats.postings_updated, 1);
        let matches = db
            .find_postings_by_url_hash(
                &url_hash(url, &config.crawl.query_allowlist).unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].id, first.id);
    }

    #[tokio::test]
    async fn test_seed_visits_are_spaced() {
        let (db, _tmp) = setup_test_db().await;
        let config = config_with_seeds(
            vec![
                seed(AtsType::Lever, "Netflix", LEVER_URL),
                seed(AtsType::Lever, "Netflix", LEVER_URL),
                seed(AtsType::Lever, "Netflix", LEVER_URL),
            ],
            60,
        );
        let renderer = Arc::new(FakeRenderer::new(&[(LEVER_URL, LEVER_PAGE)]));
        let scraper = RenderScraper::with_renderer(&config, db.clone(), renderer);

        let started = Instant::now();
        let stats = scraper.run().await.unwrap();

        assert_eq!(stats.seeds_visited, 3);
        assert!(started.elapsed() >= Duration::from_millis(120));
        // re-rendering the same listing updates the one row
        assert_eq!(stats.postings_inserted, 1);
        assert_eq!(stats.postings_updated, 2);
    }

    #[tokio::test]
    async fn test_browser_closed_when_every_seed_fails() {
        let (db, _tmp) = setup_test_db().await;
        let config = config_with_seeds(
            vec![seed(AtsType::Ashby, "Nobody", "https://jobs.ashbyhq.com/nobody")],
            0,
        );
        let renderer = Arc::new(FakeRenderer::new(&[]));
        let stats = RenderScraper::with_renderer(&config, db, renderer.clone())
            .run()
            .await
            .unwrap();

        assert_eq!(stats.seed_failures, 1);
        assert_eq!(renderer.closes.load(Ordering::SeqCst), 1);
    }

    /// Takes a fixed time per render and records when each visit ran
    struct SlowRenderer {
        render_time: Duration,
        visits: Mutex<Vec<(Instant, Instant)>>,
    }

    #[async_trait]
    impl PageRenderer for SlowRenderer {
        async fn render(&self, url: &str) -> Result<RenderedPage> {
            let started = Instant::now();
            tokio::time::sleep(self.render_time).await;
            self.visits.lock().unwrap().push((started, Instant::now()));
            Ok(RenderedPage {
                url: url.to_string(),
                html: LEVER_PAGE.to_string(),
                render_time_ms: self.render_time.as_millis() as u64,
            })
        }

        async fn close(&self) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_delay_follows_slow_renders() {
        let (db, _tmp) = setup_test_db().await;
        let config = config_with_seeds(
            vec![
                seed(AtsType::Lever, "Netflix", LEVER_URL),
                seed(AtsType::Lever, "Netflix", LEVER_URL),
                seed(AtsType::Lever, "Netflix", LEVER_URL),
            ],
            200,
        );
        // each render outlasts the delay
        let renderer = Arc::new(SlowRenderer {
            render_time: Duration::from_millis(300),
            visits: Mutex::new(Vec::new()),
        });
        let scraper = RenderScraper::with_renderer(&config, db, renderer.clone());

        let stats = scraper.run().await.unwrap();
        assert_eq!(stats.seeds_visited, 3);

        let visits = renderer.visits.lock().unwrap();
        assert_eq!(visits.len(), 3);
        for pair in visits.windows(2) {
            let gap = pair[1].0.duration_since(pair[0].1);
            assert!(gap >= Duration::from_millis(190), "gap was {:?}", gap);
        }
    }
}
