//! Configuration management for atscrawl
//!
//! Handles loading, saving, and validating configuration from TOML files.
//! Vendor seed vocabularies live here as static configuration data.

mod defaults;

pub use defaults::*;

use crate::error::{Error, Result};
use crate::models::AtsType;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Connection identifier for the posting store
    #[serde(default = "default_database_url")]
    pub database_url: String,

    /// Static HTTP client settings
    #[serde(default)]
    pub http: HttpConfig,

    /// Domain discovery settings and seed vocabulary
    #[serde(default)]
    pub discovery: DiscoveryConfig,

    /// Crawl engine settings
    #[serde(default)]
    pub crawl: CrawlConfig,

    /// Staleness reaper settings
    #[serde(default)]
    pub reaper: ReaperConfig,

    /// Headless render fallback settings
    #[serde(default)]
    pub render: RenderConfig,

    /// Paths configuration (internal, not user-editable)
    #[serde(skip)]
    pub paths: PathsConfig,
}

/// HTTP client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// User agent string
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Scheme used to turn a registry domain into a URL
    #[serde(default = "default_scheme")]
    pub scheme: String,
}

/// A vendor hosting base domain and its known tenant prefixes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VendorBaseDomain {
    pub ats_type: AtsType,
    pub domain: String,
    #[serde(default)]
    pub prefixes: Vec<String>,
}

/// A host registered by static seeding
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedHost {
    pub domain: String,
    pub ats_type: AtsType,
}

/// Domain discovery configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// Maximum probes in flight
    #[serde(default = "default_discovery_concurrency")]
    pub concurrency: usize,

    /// Timeout for a single probe request (milliseconds)
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,

    /// Global ceiling on probe requests per second
    #[serde(default = "default_probe_rate")]
    pub requests_per_second: u32,

    /// Ordered paths tried per candidate
    #[serde(default = "default_probe_paths")]
    pub probe_paths: Vec<String>,

    /// Optional wall-clock budget for a discovery run (milliseconds)
    #[serde(default)]
    pub max_duration_ms: Option<u64>,

    /// Vendor base domains with curated prefixes
    #[serde(default = "default_base_domains")]
    pub base_domains: Vec<VendorBaseDomain>,

    /// Generic company-name subdomains
    #[serde(default = "default_generic_subdomains")]
    pub generic_subdomains: Vec<String>,

    /// Hosts registered without probing
    #[serde(default = "default_seed_hosts")]
    pub seed_hosts: Vec<SeedHost>,
}

/// Listing paths for one multi-tenant board
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoardPaths {
    pub domain: String,
    pub paths: Vec<String>,
}

/// Crawl engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlConfig {
    /// Ordered listing paths for hosts without a board override
    #[serde(default = "default_listing_paths")]
    pub listing_paths: Vec<String>,

    /// Per-domain listing path overrides
    #[serde(default = "default_boards")]
    pub boards: Vec<BoardPaths>,

    /// Maximum job-detail fetches in flight per host
    #[serde(default = "default_job_concurrency")]
    pub job_concurrency: usize,

    /// Maximum hosts crawled at once
    #[serde(default = "default_host_concurrency")]
    pub host_concurrency: usize,

    /// Request timeout in seconds
    #[serde(default = "default_crawl_timeout")]
    pub timeout_secs: u64,

    /// Extracted titles are truncated to this many characters
    #[serde(default = "default_title_max_chars")]
    pub title_max_chars: usize,

    /// Query parameters preserved by URL normalization
    #[serde(default = "default_query_allowlist")]
    pub query_allowlist: Vec<String>,
}

/// Staleness reaper configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReaperConfig {
    /// Postings not seen for this many days are closed
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
}

/// A company page crawled through the headless browser
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderSeed {
    pub vendor: AtsType,
    pub company: String,
    pub url: String,
}

/// Render fallback configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConfig {
    /// Curated seed pages
    #[serde(default = "default_render_seeds")]
    pub seeds: Vec<RenderSeed>,

    /// Delay between consecutive seed visits (milliseconds)
    #[serde(default = "default_visit_delay_ms")]
    pub visit_delay_ms: u64,

    /// Time to wait for page load (milliseconds)
    #[serde(default = "default_page_load_timeout_ms")]
    pub page_load_timeout_ms: u64,

    /// Time to let the page settle after navigation (milliseconds)
    #[serde(default = "default_settle_wait_ms")]
    pub settle_wait_ms: u64,

    /// Disable browser sandbox (required in some Docker/CI environments)
    #[serde(default)]
    pub no_sandbox: bool,

    /// User agent presented by the browser
    #[serde(default = "default_browser_user_agent")]
    pub user_agent: String,
}

/// Internal paths configuration
#[derive(Debug, Clone, Default)]
pub struct PathsConfig {
    /// Base directory for atscrawl data
    pub base_dir: PathBuf,

    /// Path to config file
    pub config_file: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: default_database_url(),
            http: HttpConfig::default(),
            discovery: DiscoveryConfig::default(),
            crawl: CrawlConfig::default(),
            reaper: ReaperConfig::default(),
            render: RenderConfig::default(),
            paths: PathsConfig::default(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            scheme: default_scheme(),
        }
    }
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            concurrency: default_discovery_concurrency(),
            probe_timeout_ms: default_probe_timeout_ms(),
            requests_per_second: default_probe_rate(),
            probe_paths: default_probe_paths(),
            max_duration_ms: None,
            base_domains: default_base_domains(),
            generic_subdomains: default_generic_subdomains(),
            seed_hosts: default_seed_hosts(),
        }
    }
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            listing_paths: default_listing_paths(),
            boards: default_boards(),
            job_concurrency: default_job_concurrency(),
            host_concurrency: default_host_concurrency(),
            timeout_secs: default_crawl_timeout(),
            title_max_chars: default_title_max_chars(),
            query_allowlist: default_query_allowlist(),
        }
    }
}

impl Default for ReaperConfig {
    fn default() -> Self {
        Self {
            retention_days: default_retention_days(),
        }
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            seeds: default_render_seeds(),
            visit_delay_ms: default_visit_delay_ms(),
            page_load_timeout_ms: default_page_load_timeout_ms(),
            settle_wait_ms: default_settle_wait_ms(),
            no_sandbox: false,
            user_agent: default_browser_user_agent(),
        }
    }
}

impl DiscoveryConfig {
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }
}

impl CrawlConfig {
    /// Listing paths for a domain, honouring board overrides
    pub fn listing_paths_for(&self, domain: &str) -> &[String] {
        self.boards
            .iter()
            .find(|b| b.domain.eq_ignore_ascii_case(domain))
            .map(|b| b.paths.as_slice())
            .unwrap_or(&self.listing_paths)
    }
}

impl Config {
    /// Get the default base directory for atscrawl (~/.atscrawl)
    pub fn default_base_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".atscrawl")
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        Self::default_base_dir().join("config.toml")
    }

    /// Initialize paths configuration
    pub fn init_paths(&mut self, base_dir: Option<PathBuf>) {
        let base = base_dir.unwrap_or_else(Self::default_base_dir);
        self.paths = PathsConfig {
            config_file: base.join("config.toml"),
            base_dir: base,
        };
    }

    /// Load configuration from a specific file path
    pub fn load(config_path: &Path) -> Result<Self> {
        debug!("Loading config from {:?}", config_path);

        if !config_path.exists() {
            return Err(Error::Config(format!(
                "Config file not found: {}",
                config_path.display()
            )));
        }

        let content = std::fs::read_to_string(config_path)?;
        let mut config: Config = toml::from_str(&content)?;

        let base = config_path
            .parent()
            .unwrap_or(Path::new("."))
            .to_path_buf();
        config.paths = PathsConfig {
            config_file: config_path.to_path_buf(),
            base_dir: base,
        };

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a base directory, falling back to defaults
    pub fn load_from(base_dir: Option<PathBuf>) -> Result<Self> {
        let mut config = Config::default();
        config.init_paths(base_dir);

        if config.paths.config_file.exists() {
            debug!("Loading config from {:?}", config.paths.config_file);
            let content = std::fs::read_to_string(&config.paths.config_file)?;
            let mut loaded: Config = toml::from_str(&content)?;
            loaded.paths = config.paths;
            config = loaded;
        } else {
            debug!("No config file found, using defaults");
        }

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.paths.config_file.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(&self.paths.config_file, content)?;
        info!("Saved config to {:?}", self.paths.config_file);
        Ok(())
    }

    /// Turn a registry domain into a base URL
    pub fn base_url(&self, domain: &str) -> String {
        if domain.contains("://") {
            domain.trim_end_matches('/').to_string()
        } else {
            format!("{}://{}", self.http.scheme, domain.trim_end_matches('/'))
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.database_url.trim().is_empty() {
            return Err(Error::Config("database_url must be set".to_string()));
        }

        if self.http.scheme != "http" && self.http.scheme != "https" {
            return Err(Error::Config(
                "http.scheme must be 'http' or 'https'".to_string(),
            ));
        }

        if self.discovery.concurrency == 0 {
            return Err(Error::Config(
                "discovery.concurrency must be positive".to_string(),
            ));
        }

        if self.discovery.probe_timeout_ms == 0 {
            return Err(Error::Config(
                "discovery.probe_timeout_ms must be positive".to_string(),
            ));
        }

        if self.discovery.probe_paths.is_empty() {
            return Err(Error::Config(
                "discovery.probe_paths must not be empty".to_string(),
            ));
        }

        if self.crawl.job_concurrency == 0 || self.crawl.host_concurrency == 0 {
            return Err(Error::Config(
                "crawl.job_concurrency and crawl.host_concurrency must be positive".to_string(),
            ));
        }

        if self.crawl.timeout_secs == 0 {
            return Err(Error::Config(
                "crawl.timeout_secs must be positive".to_string(),
            ));
        }

        if self.reaper.retention_days == 0 {
            return Err(Error::Config(
                "reaper.retention_days must be positive".to_string(),
            ));
        }

        Ok(())
    }
}
