//! Fire-and-forget pipeline trigger
//!
//! [`trigger`] acquires the database, records a run and hands the work to an
//! independently scheduled task. The caller gets the run id back immediately;
//! completion is observable through the `crawl_runs` row and the logs.

use crate::config::Config;
use crate::crawl::{CrawlEngine, CrawlStats};
use crate::discovery::{DiscoveryEngine, DiscoveryStats, SeedStats};
use crate::error::Result;
use crate::store::{Database, RunStatus};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Which stages a pipeline run executes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineOptions {
    pub run_discovery: bool,
    pub run_crawling: bool,
    /// Duration budget for the discovery stage
    pub max_discovery_time_ms: Option<u64>,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            run_discovery: true,
            run_crawling: true,
            max_discovery_time_ms: None,
        }
    }
}

/// Stats persisted with a pipeline run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineStats {
    pub seed: Option<SeedStats>,
    pub discovery: Option<DiscoveryStats>,
    pub crawl: Option<CrawlStats>,
    pub error: Option<String>,
}

/// Acknowledgement for a started run
pub struct PipelineHandle {
    pub run_id: String,
    task: JoinHandle<()>,
}

impl PipelineHandle {
    /// Wait for the background run to finish. Only the CLI uses this; the run
    /// outcome itself is read back from the store.
    pub async fn join(self) {
        if let Err(e) = self.task.await {
            error!(run_id = %self.run_id, "Pipeline task aborted: {}", e);
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

/// Start a pipeline run without waiting for it.
///
/// Fails only when the run cannot start at all: an invalid configuration or
/// no database connection.
pub async fn trigger(config: Config, options: PipelineOptions) -> Result<PipelineHandle> {
    config.validate()?;
    let db = Database::connect(&config.database_url).await?;
    let run = db.start_run("pipeline").await?;
    let run_id = run.id.clone();

    info!(
        run_id = %run_id,
        discovery = options.run_discovery,
        crawl = options.run_crawling,
        "Pipeline triggered"
    );

    let task = tokio::spawn(async move {
        let (status, stats) = match execute(&config, &db, &options).await {
            Ok(stats) => (RunStatus::Completed, stats),
            Err(e) => {
                error!(run_id = %run.id, "Pipeline failed: {}", e);
                (
                    RunStatus::Failed,
                    PipelineStats {
                        error: Some(e.to_string()),
                        ..Default::default()
                    },
                )
            }
        };

        if let Err(e) = db.complete_run(&run.id, status, &stats).await {
            error!(run_id = %run.id, "Failed to record run completion: {}", e);
        }
        info!(run_id = %run.id, status = %status, "Pipeline finished");
        db.close().await;
    });

    Ok(PipelineHandle { run_id, task })
}

async fn execute(config: &Config, db: &Database, options: &PipelineOptions) -> Result<PipelineStats> {
    let mut stats = PipelineStats::default();

    if options.run_discovery {
        let engine = DiscoveryEngine::new(config, db.clone())?;
        stats.seed = Some(engine.seed_hosts().await);
        let budget = options.max_discovery_time_ms.map(Duration::from_millis);
        stats.discovery = Some(engine.run(budget).await?);
    }

    if options.run_crawling {
        let engine = CrawlEngine::new(config, db.clone())?;
        stats.crawl = Some(engine.run().await?);
    }

    Ok(stats)
}
