//! Persistent host registry and posting store using SQLite
//!
//! This module handles:
//! - ATS hosts (the host registry, keyed by domain)
//! - Job postings (keyed by literal URL)
//! - Crawl runs (history and stats)
//! - The bulk staleness transition used by the reaper

mod schema;

pub use schema::*;

use crate::error::Result;
use crate::models::{now_timestamp, AtsHost, JobPosting, PostingStatus};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::FromRow;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

/// Run status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunStatus::Running => write!(f, "running"),
            RunStatus::Completed => write!(f, "completed"),
            RunStatus::Failed => write!(f, "failed"),
        }
    }
}

/// A recorded run of one pipeline operation
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct CrawlRun {
    pub id: String,
    pub operation: String,
    pub started_at: String,
    pub completed_at: Option<String>,
    pub status: String,
    pub stats_json: Option<String>,
}

/// Whether an upsert created a new row or refreshed an existing one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
}

/// Aggregate counts for the status command
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreStats {
    pub host_count: usize,
    pub active_host_count: usize,
    pub open_postings: usize,
    pub closed_postings: usize,
    pub hosts_by_vendor: Vec<(String, usize)>,
}

/// Database client handle
///
/// Constructed explicitly and passed to each component. Call [`Database::close`]
/// at the end of a run to release the pool.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Connect to the database and make sure the schema exists
    pub async fn connect(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(10));

        debug!("Connecting to SQLite database at {}", database_url);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(15))
            .connect_with(options)
            .await?;

        let db = Self { pool };
        db.init_schema().await?;
        Ok(db)
    }

    /// Initialize the database schema
    pub async fn init_schema(&self) -> Result<()> {
        debug!("Initializing database schema");
        sqlx::query(SCHEMA_SQL).execute(&self.pool).await?;
        Ok(())
    }

    /// Release all pooled connections
    pub async fn close(&self) {
        self.pool.close().await;
    }

    // ===== Host Registry =====

    /// Insert a host, or refresh `ats_type`/`is_active` of an existing domain.
    ///
    /// `id`, `company` and `discovered_at` of an existing row are preserved.
    pub async fn upsert_host(&self, host: &AtsHost) -> Result<UpsertOutcome> {
        let id: String = sqlx::query_scalar(
            r#"
            INSERT INTO ats_hosts (id, company, domain, ats_type, is_active, discovered_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(domain) DO UPDATE SET
                ats_type = excluded.ats_type,
                is_active = excluded.is_active
            RETURNING id
            "#,
        )
        .bind(&host.id)
        .bind(&host.company)
        .bind(&host.domain)
        .bind(&host.ats_type)
        .bind(host.is_active)
        .bind(&host.discovered_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(if id == host.id {
            UpsertOutcome::Inserted
        } else {
            UpsertOutcome::Updated
        })
    }

    /// Get host by domain
    pub async fn get_host_by_domain(&self, domain: &str) -> Result<Option<AtsHost>> {
        let host = sqlx::query_as::<_, AtsHost>("SELECT * FROM ats_hosts WHERE domain = ?")
            .bind(domain)
            .fetch_optional(&self.pool)
            .await?;
        Ok(host)
    }

    /// List hosts in registry iteration order
    pub async fn list_hosts(&self, active_only: bool) -> Result<Vec<AtsHost>> {
        let sql = if active_only {
            "SELECT * FROM ats_hosts WHERE is_active = 1 ORDER BY discovered_at, domain"
        } else {
            "SELECT * FROM ats_hosts ORDER BY discovered_at, domain"
        };
        let hosts = sqlx::query_as::<_, AtsHost>(sql)
            .fetch_all(&self.pool)
            .await?;
        Ok(hosts)
    }

    /// Mark a host inactive. Returns false when the domain is unknown.
    pub async fn deactivate_host(&self, domain: &str) -> Result<bool> {
        let result = sqlx::query("UPDATE ats_hosts SET is_active = 0 WHERE domain = ?")
            .bind(domain)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // ===== Posting Store =====

    /// Insert a posting or refresh the row with the same literal URL.
    ///
    /// On conflict the content hash, title, location and URL hash are replaced,
    /// `last_seen_at` only moves forward, and `id`, `discovered_at` and `status`
    /// are left untouched.
    pub async fn upsert_posting(&self, posting: &JobPosting) -> Result<UpsertOutcome> {
        let id: String = sqlx::query_scalar(
            r#"
            INSERT INTO job_postings (
                id, ats_host_id, url, url_hash, html_hash, job_title, company, location,
                department, job_family, status, posting_date, discovered_at, last_seen_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(url) DO UPDATE SET
                html_hash = excluded.html_hash,
                job_title = excluded.job_title,
                location = excluded.location,
                url_hash = excluded.url_hash,
                ats_host_id = COALESCE(excluded.ats_host_id, job_postings.ats_host_id),
                company = COALESCE(excluded.company, job_postings.company),
                department = COALESCE(excluded.department, job_postings.department),
                job_family = COALESCE(excluded.job_family, job_postings.job_family),
                last_seen_at = MAX(job_postings.last_seen_at, excluded.last_seen_at)
            RETURNING id
            "#,
        )
        .bind(&posting.id)
        .bind(&posting.ats_host_id)
        .bind(&posting.url)
        .bind(&posting.url_hash)
        .bind(&posting.html_hash)
        .bind(&posting.job_title)
        .bind(&posting.company)
        .bind(&posting.location)
        .bind(&posting.department)
        .bind(&posting.job_family)
        .bind(&posting.status)
        .bind(&posting.posting_date)
        .bind(&posting.discovered_at)
        .bind(&posting.last_seen_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(if id == posting.id {
            UpsertOutcome::Inserted
        } else {
            UpsertOutcome::Updated
        })
    }

    /// Get posting by literal URL
    pub async fn get_posting_by_url(&self, url: &str) -> Result<Option<JobPosting>> {
        let posting = sqlx::query_as::<_, JobPosting>("SELECT * FROM job_postings WHERE url = ?")
            .bind(url)
            .fetch_optional(&self.pool)
            .await?;
        Ok(posting)
    }

    /// Postings sharing a normalized URL hash (secondary lookup)
    pub async fn find_postings_by_url_hash(&self, url_hash: &str) -> Result<Vec<JobPosting>> {
        let postings = sqlx::query_as::<_, JobPosting>(
            "SELECT * FROM job_postings WHERE url_hash = ? ORDER BY discovered_at",
        )
        .bind(url_hash)
        .fetch_all(&self.pool)
        .await?;
        Ok(postings)
    }

    /// Count postings that a reaper pass with this cutoff would close
    pub async fn count_stale_postings(&self, cutoff: &str) -> Result<usize> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM job_postings WHERE status != ? AND last_seen_at < ?",
        )
        .bind(PostingStatus::Closed.to_string())
        .bind(cutoff)
        .fetch_one(&self.pool)
        .await?;
        Ok(count as usize)
    }

    /// Close every non-closed posting last seen before `cutoff`
    pub async fn close_stale_postings(&self, cutoff: &str) -> Result<usize> {
        let result = sqlx::query(
            "UPDATE job_postings SET status = ? WHERE status != ? AND last_seen_at < ?",
        )
        .bind(PostingStatus::Closed.to_string())
        .bind(PostingStatus::Closed.to_string())
        .bind(cutoff)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() as usize)
    }

    // ===== Run Operations =====

    /// Record the start of a run
    pub async fn start_run(&self, operation: &str) -> Result<CrawlRun> {
        let run = CrawlRun {
            id: Uuid::new_v4().to_string(),
            operation: operation.to_string(),
            started_at: now_timestamp(),
            completed_at: None,
            status: RunStatus::Running.to_string(),
            stats_json: None,
        };
        sqlx::query(
            "INSERT INTO crawl_runs (id, operation, started_at, status) VALUES (?, ?, ?, ?)",
        )
        .bind(&run.id)
        .bind(&run.operation)
        .bind(&run.started_at)
        .bind(&run.status)
        .execute(&self.pool)
        .await?;
        Ok(run)
    }

    /// Complete a run with its final status and stats
    pub async fn complete_run<S: Serialize>(
        &self,
        id: &str,
        status: RunStatus,
        stats: &S,
    ) -> Result<()> {
        let stats_json = serde_json::to_string(stats)?;
        sqlx::query(
            "UPDATE crawl_runs SET completed_at = ?, status = ?, stats_json = ? WHERE id = ?",
        )
        .bind(now_timestamp())
        .bind(status.to_string())
        .bind(stats_json)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Get a run by ID
    pub async fn get_run(&self, id: &str) -> Result<Option<CrawlRun>> {
        let run = sqlx::query_as::<_, CrawlRun>("SELECT * FROM crawl_runs WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(run)
    }

    /// Most recent runs, newest first
    pub async fn list_recent_runs(&self, limit: u32) -> Result<Vec<CrawlRun>> {
        let runs = sqlx::query_as::<_, CrawlRun>(
            "SELECT * FROM crawl_runs ORDER BY started_at DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(runs)
    }

    // ===== Statistics =====

    /// Get global statistics
    pub async fn get_stats(&self) -> Result<StoreStats> {
        let host_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM ats_hosts")
            .fetch_one(&self.pool)
            .await?;

        let active_host_count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM ats_hosts WHERE is_active = 1")
                .fetch_one(&self.pool)
                .await?;

        let closed: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM job_postings WHERE status = ?")
            .bind(PostingStatus::Closed.to_string())
            .fetch_one(&self.pool)
            .await?;

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM job_postings")
            .fetch_one(&self.pool)
            .await?;

        let by_vendor: Vec<(String, i64)> = sqlx::query_as(
            "SELECT ats_type, COUNT(*) FROM ats_hosts GROUP BY ats_type ORDER BY ats_type",
        )
        .fetch_all(&self.pool)
        .await?;

        info!(hosts = host_count, postings = total, "Collected store statistics");

        Ok(StoreStats {
            host_count: host_count as usize,
            active_host_count: active_host_count as usize,
            open_postings: (total - closed) as usize,
            closed_postings: closed as usize,
            hosts_by_vendor: by_vendor
                .into_iter()
                .map(|(vendor, count)| (vendor, count as usize))
                .collect(),
        })
    }
}
