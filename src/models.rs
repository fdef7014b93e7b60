//! Domain records shared by discovery, crawling and the posting store.

use crate::error::{Error, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::str::FromStr;
use uuid::Uuid;

/// Format a timestamp for storage.
///
/// Fixed microsecond precision with a `Z` suffix keeps lexical order equal to
/// chronological order, which the reaper's cutoff comparison relies on.
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Current time in storage format
pub fn now_timestamp() -> String {
    format_timestamp(Utc::now())
}

/// ATS vendors recognised by fingerprinting and seeding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AtsType {
    Workday,
    Greenhouse,
    Lever,
    Ashby,
    Workable,
    Icims,
    SmartRecruiters,
    Jobvite,
}

impl AtsType {
    pub const ALL: [AtsType; 8] = [
        AtsType::Workday,
        AtsType::Greenhouse,
        AtsType::Lever,
        AtsType::Ashby,
        AtsType::Workable,
        AtsType::Icims,
        AtsType::SmartRecruiters,
        AtsType::Jobvite,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AtsType::Workday => "workday",
            AtsType::Greenhouse => "greenhouse",
            AtsType::Lever => "lever",
            AtsType::Ashby => "ashby",
            AtsType::Workable => "workable",
            AtsType::Icims => "icims",
            AtsType::SmartRecruiters => "smartrecruiters",
            AtsType::Jobvite => "jobvite",
        }
    }
}

impl std::fmt::Display for AtsType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for AtsType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let lower = s.to_lowercase();
        AtsType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == lower)
            .ok_or_else(|| Error::Config(format!("Unknown ATS type: {}", s)))
    }
}

/// Posting lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostingStatus {
    Open,
    Closed,
}

impl std::fmt::Display for PostingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PostingStatus::Open => write!(f, "open"),
            PostingStatus::Closed => write!(f, "closed"),
        }
    }
}

impl FromStr for PostingStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            // Older rows written by the render path used "active"
            "open" | "active" => Ok(PostingStatus::Open),
            "closed" => Ok(PostingStatus::Closed),
            _ => Err(Error::Parse(format!("Unknown posting status: {}", s))),
        }
    }
}

/// A domain believed to host ATS job listings
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct AtsHost {
    pub id: String,
    pub company: String,
    pub domain: String,
    pub ats_type: String,
    pub is_active: bool,
    pub discovered_at: String,
}

impl AtsHost {
    pub fn new(domain: impl Into<String>, company: impl Into<String>, ats_type: AtsType) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            company: company.into(),
            domain: domain.into(),
            ats_type: ats_type.to_string(),
            is_active: true,
            discovered_at: now_timestamp(),
        }
    }

    pub fn get_type(&self) -> Result<AtsType> {
        self.ats_type.parse()
    }
}

/// One observed job listing page
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct JobPosting {
    pub id: String,
    pub ats_host_id: Option<String>,
    pub url: String,
    pub url_hash: String,
    pub html_hash: String,
    pub job_title: Option<String>,
    pub company: Option<String>,
    pub location: Option<String>,
    pub department: Option<String>,
    pub job_family: Option<String>,
    pub status: String,
    pub posting_date: Option<String>,
    pub discovered_at: String,
    pub last_seen_at: String,
}

impl JobPosting {
    pub fn new(url: impl Into<String>, url_hash: String, html_hash: String) -> Self {
        let now = now_timestamp();
        Self {
            id: Uuid::new_v4().to_string(),
            ats_host_id: None,
            url: url.into(),
            url_hash,
            html_hash,
            job_title: None,
            company: None,
            location: None,
            department: None,
            job_family: None,
            status: PostingStatus::Open.to_string(),
            posting_date: None,
            discovered_at: now.clone(),
            last_seen_at: now,
        }
    }

    pub fn get_status(&self) -> Result<PostingStatus> {
        self.status.parse()
    }
}

/// Hex digest used for content and URL hashes
pub fn content_hash(data: &str) -> String {
    blake3::hash(data.as_bytes()).to_hex().to_string()
}
