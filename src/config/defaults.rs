//! Default values for configuration

use super::{BoardPaths, RenderSeed, SeedHost, VendorBaseDomain};
use crate::models::AtsType;

/// Default database URL, stored next to the config file
pub fn default_database_url() -> String {
    std::env::var("ATSCRAWL_DATABASE_URL").unwrap_or_else(|_| {
        let path = super::Config::default_base_dir().join("postings.db");
        format!("sqlite://{}?mode=rwc", path.display())
    })
}

/// Default user agent for static fetches
pub fn default_user_agent() -> String {
    format!("atscrawl/{} (job index crawler)", env!("CARGO_PKG_VERSION"))
}

/// Default URL scheme for registry domains
pub fn default_scheme() -> String {
    "https".to_string()
}

/// Default number of concurrent discovery probes
pub fn default_discovery_concurrency() -> usize {
    10
}

/// Default per-probe timeout in milliseconds
pub fn default_probe_timeout_ms() -> u64 {
    8000
}

/// Default global probe rate ceiling
pub fn default_probe_rate() -> u32 {
    50
}

/// Paths tried, in order, when probing a candidate domain
pub fn default_probe_paths() -> Vec<String> {
    ["/", "/careers", "/jobs", "/job-search"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// Vendor base domains combined with prefixes during candidate generation
pub fn default_base_domains() -> Vec<VendorBaseDomain> {
    let workday_tenants = [
        "nvidia", "salesforce", "adobe", "intel", "cisco", "dell", "hp", "paypal", "target",
        "walmart", "mastercard", "capitalone", "workday", "autodesk", "broadcom",
    ];
    let icims_tenants = [
        "careers-ibm",
        "careers-microsoft",
        "careers-amd",
        "jobs-northropgrumman",
        "careers-peraton",
        "careers-leidos",
        "careers-saic",
        "uscareers-honeywell",
    ];

    let to_vec = |items: &[&str]| items.iter().map(|s| s.to_string()).collect::<Vec<_>>();

    vec![
        VendorBaseDomain {
            ats_type: AtsType::Workday,
            domain: "wd1.myworkdayjobs.com".to_string(),
            prefixes: to_vec(&workday_tenants),
        },
        VendorBaseDomain {
            ats_type: AtsType::Workday,
            domain: "wd5.myworkdayjobs.com".to_string(),
            prefixes: to_vec(&workday_tenants),
        },
        VendorBaseDomain {
            ats_type: AtsType::Icims,
            domain: "icims.com".to_string(),
            prefixes: to_vec(&icims_tenants),
        },
    ]
}

/// Generic company-name subdomains tried against every base domain
pub fn default_generic_subdomains() -> Vec<String> {
    [
        "google", "amazon", "apple", "meta", "netflix", "uber", "airbnb", "stripe", "oracle",
        "ibm", "qualcomm", "vmware", "servicenow", "snowflake", "databricks",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// Multi-tenant boards registered by `atscrawl seed`
pub fn default_seed_hosts() -> Vec<SeedHost> {
    [
        ("boards.greenhouse.io", AtsType::Greenhouse),
        ("jobs.lever.co", AtsType::Lever),
        ("jobs.ashbyhq.com", AtsType::Ashby),
        ("apply.workable.com", AtsType::Workable),
    ]
    .into_iter()
    .map(|(domain, ats_type)| SeedHost {
        domain: domain.to_string(),
        ats_type,
    })
    .collect()
}

/// Listing paths tried on hosts without a board override
pub fn default_listing_paths() -> Vec<String> {
    ["/", "/jobs", "/careers", "/job-search"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// Company paths on the multi-tenant boards
pub fn default_boards() -> Vec<BoardPaths> {
    let board = |domain: &str, paths: &[&str]| BoardPaths {
        domain: domain.to_string(),
        paths: paths.iter().map(|s| s.to_string()).collect(),
    };

    vec![
        board(
            "boards.greenhouse.io",
            &["/vercel", "/airbnb", "/stripe", "/cloudflare", "/discord"],
        ),
        board("jobs.lever.co", &["/netflix", "/palantir", "/plaid"]),
        board("jobs.ashbyhq.com", &["/openai", "/notion", "/linear"]),
        board("apply.workable.com", &["/hugging-face", "/blueground"]),
    ]
}

/// Default number of concurrent job-detail fetches per host
pub fn default_job_concurrency() -> usize {
    4
}

/// Default number of hosts crawled at once
pub fn default_host_concurrency() -> usize {
    2
}

/// Default request timeout in seconds
pub fn default_crawl_timeout() -> u64 {
    20
}

/// Default maximum stored title length
pub fn default_title_max_chars() -> usize {
    200
}

/// Query parameters kept by URL normalization
pub fn default_query_allowlist() -> Vec<String> {
    ["gh_jid", "jobid", "job_id", "jid", "req", "reqid", "lever-source"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// Default retention window before a posting is closed
pub fn default_retention_days() -> u32 {
    7
}

/// Seed pages crawled by the render fallback
pub fn default_render_seeds() -> Vec<RenderSeed> {
    let seed = |vendor: AtsType, company: &str, url: &str| RenderSeed {
        vendor,
        company: company.to_string(),
        url: url.to_string(),
    };

    vec![
        seed(
            AtsType::Workday,
            "NVIDIA",
            "https://nvidia.wd5.myworkdayjobs.com/NVIDIAExternalCareerSite",
        ),
        seed(
            AtsType::Workday,
            "Salesforce",
            "https://salesforce.wd12.myworkdayjobs.com/External_Career_Site",
        ),
        seed(AtsType::Ashby, "OpenAI", "https://jobs.ashbyhq.com/openai"),
        seed(AtsType::Lever, "Netflix", "https://jobs.lever.co/netflix"),
        seed(
            AtsType::Icims,
            "IBM",
            "https://careers-ibm.icims.com/jobs/search",
        ),
    ]
}

/// Default delay between consecutive seed-page visits
pub fn default_visit_delay_ms() -> u64 {
    3000
}

/// Default page load timeout for the headless browser
pub fn default_page_load_timeout_ms() -> u64 {
    30000
}

/// Default settle time after navigation
pub fn default_settle_wait_ms() -> u64 {
    2500
}

/// Browser identity presented by the render fallback
pub fn default_browser_user_agent() -> String {
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36"
        .to_string()
}
