//! SQLite schema definition

/// SQL schema for the host registry and posting store
pub const SCHEMA_SQL: &str = r#"
-- Hosts: domains believed to serve ATS job listings
CREATE TABLE IF NOT EXISTS ats_hosts (
    id TEXT PRIMARY KEY,
    company TEXT NOT NULL,
    domain TEXT NOT NULL UNIQUE,
    ats_type TEXT NOT NULL,
    is_active INTEGER NOT NULL DEFAULT 1,
    discovered_at TEXT NOT NULL
);

-- Postings: individual job pages, keyed by literal URL
CREATE TABLE IF NOT EXISTS job_postings (
    id TEXT PRIMARY KEY,
    ats_host_id TEXT REFERENCES ats_hosts(id),
    url TEXT NOT NULL UNIQUE,
    url_hash TEXT NOT NULL,
    html_hash TEXT NOT NULL,
    job_title TEXT,
    company TEXT,
    location TEXT,
    department TEXT,
    job_family TEXT,
    status TEXT NOT NULL DEFAULT 'open',
    posting_date TEXT,
    discovered_at TEXT NOT NULL,
    last_seen_at TEXT NOT NULL
);

-- Runs: one row per discovery/crawl/reap/render invocation
CREATE TABLE IF NOT EXISTS crawl_runs (
    id TEXT PRIMARY KEY,
    operation TEXT NOT NULL,
    started_at TEXT NOT NULL,
    completed_at TEXT,
    status TEXT NOT NULL,
    stats_json TEXT
);

CREATE INDEX IF NOT EXISTS idx_hosts_active ON ats_hosts(is_active);
CREATE INDEX IF NOT EXISTS idx_postings_status_seen ON job_postings(status, last_seen_at);
CREATE INDEX IF NOT EXISTS idx_postings_url_hash ON job_postings(url_hash);
CREATE INDEX IF NOT EXISTS idx_postings_host ON job_postings(ats_host_id);
CREATE INDEX IF NOT EXISTS idx_runs_operation ON crawl_runs(operation);
"#;
