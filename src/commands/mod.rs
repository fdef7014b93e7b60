//! CLI commands implementation

pub mod crawl;
pub mod discover;
pub mod init;
pub mod reap;
pub mod render;
pub mod status;

pub use crawl::*;
pub use discover::*;
pub use init::*;
pub use reap::*;
pub use render::*;
pub use status::*;

use crate::error::Result;
use crate::store::{Database, RunStatus};
use serde::Serialize;
use std::future::Future;
use tracing::warn;

/// Run one operation under a `crawl_runs` record
pub(crate) async fn recorded<T, F>(db: &Database, operation: &str, work: F) -> Result<T>
where
    T: Serialize,
    F: Future<Output = Result<T>>,
{
    let run = db.start_run(operation).await?;
    let result = work.await;

    let recorded = match &result {
        Ok(stats) => db.complete_run(&run.id, RunStatus::Completed, stats).await,
        Err(e) => {
            db.complete_run(&run.id, RunStatus::Failed, &e.to_string())
                .await
        }
    };
    if let Err(e) = recorded {
        warn!(run_id = %run.id, "Failed to record {} run: {}", operation, e);
    }
    result
}
