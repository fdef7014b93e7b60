//! atscrawl - discovery and crawling of ATS-hosted job boards
//!
//! This crate provides:
//! - A domain discovery engine that probes and fingerprints candidate ATS hosts
//! - A bounded-concurrency crawl engine that extracts job postings per host
//! - A staleness reaper that closes postings no longer observed
//! - A headless-browser fallback scraper for client-rendered listing pages

pub mod commands;
pub mod config;
pub mod crawl;
pub mod discovery;
pub mod error;
pub mod fetch;
pub mod models;
pub mod pipeline;
pub mod progress;
pub mod reaper;
pub mod render;
pub mod store;

pub use config::Config;
pub use error::{Error, Result};
