//! Per-vendor extraction strategies over rendered listing pages
//!
//! Every vendor carries ordered selector lists for the listing container and
//! for each extracted field. Lists are tried front to back; the first selector
//! that yields something wins. Extraction is pure so it runs against saved
//! HTML in tests.

use crate::crawl::{collapse_whitespace, is_job_link, truncate_chars};
use crate::models::AtsType;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use url::Url;

/// Longest title kept from container text
const MAX_TITLE_CHARS: usize = 200;

/// Field extracted from a listing container
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Title,
    Location,
    Department,
}

/// Selector lists for one vendor
#[derive(Debug)]
pub struct VendorStrategy {
    pub vendor: AtsType,
    /// Listing containers, one element per job
    pub containers: &'static [&'static str],
    /// Anchor carrying the job URL inside a container
    pub links: &'static [&'static str],
    pub title: &'static [&'static str],
    pub location: &'static [&'static str],
    pub department: &'static [&'static str],
}

impl VendorStrategy {
    pub fn selectors(&self, field: Field) -> &'static [&'static str] {
        match field {
            Field::Title => self.title,
            Field::Location => self.location,
            Field::Department => self.department,
        }
    }
}

const STRATEGIES: &[VendorStrategy] = &[
    VendorStrategy {
        vendor: AtsType::Workday,
        containers: &[
            "section[data-automation-id='jobResults'] li",
            "[data-automation-id='jobResults'] li",
            "li.css-1q2dra3",
        ],
        links: &["a[data-automation-id='jobTitle']", "h3 a"],
        title: &["a[data-automation-id='jobTitle']", "h3"],
        location: &[
            "[data-automation-id='locations'] dd",
            "[data-automation-id='locations']",
        ],
        department: &["[data-automation-id='jobFamilyGroup']"],
    },
    VendorStrategy {
        vendor: AtsType::Greenhouse,
        containers: &["tr.job-post", "div.opening", "section.level-0 div.opening"],
        links: &["a[href*='/jobs/']", "a"],
        title: &["p.body--medium", "a"],
        location: &["p.body--metadata", "span.location"],
        department: &[".department", "h3"],
    },
    VendorStrategy {
        vendor: AtsType::Lever,
        containers: &["div.posting", "a.posting-title"],
        links: &["a.posting-title", "a.posting-btn-submit"],
        title: &["h5[data-qa='posting-name']", "a.posting-title h5", "h5"],
        location: &["span.sort-by-location", ".posting-categories .location"],
        department: &["span.sort-by-team", ".posting-categories .department"],
    },
    VendorStrategy {
        vendor: AtsType::Ashby,
        containers: &[
            "a[class*='_container_']",
            "div[class*='ashby-job-posting-brief']",
        ],
        links: &["a[href*='/']"],
        title: &["h3", "[class*='_title_']"],
        location: &["[class*='_details_'] p", "[class*='location']"],
        department: &["[class*='_departmentHeading_']", "[class*='department']"],
    },
    VendorStrategy {
        vendor: AtsType::Workable,
        containers: &["li[data-ui='job']", "ul.jobs li"],
        links: &["a[href*='/j/']", "a"],
        title: &["h3[data-ui='job-title']", "h3"],
        location: &["[data-ui='job-location']", ".location"],
        department: &["[data-ui='job-department']", ".department"],
    },
    VendorStrategy {
        vendor: AtsType::Icims,
        containers: &["li.iCIMS_JobCardItem", "div.iCIMS_JobsTable div.row"],
        links: &["a.iCIMS_Anchor", "a"],
        title: &["a.iCIMS_Anchor h3", "h3", "a.iCIMS_Anchor"],
        location: &[
            "div.header.left span",
            "[class*='iCIMS_JobHeaderField'] .location",
        ],
        department: &["[class*='category']"],
    },
    VendorStrategy {
        vendor: AtsType::SmartRecruiters,
        containers: &["li.opening-job", "li.js-openings-load"],
        links: &["a.details", "a"],
        title: &["h4.job-title", "h4"],
        location: &["span.job-location", ".location"],
        department: &["span.job-department"],
    },
    VendorStrategy {
        vendor: AtsType::Jobvite,
        containers: &["table.jv-job-list tr", "ul.jv-job-list li"],
        links: &["td.jv-job-list-name a", "a"],
        title: &["td.jv-job-list-name", "a"],
        location: &["td.jv-job-list-location", ".jv-job-list-location"],
        department: &["td.jv-job-list-department"],
    },
];

/// Strategy for a vendor
pub fn strategy_for(vendor: AtsType) -> &'static VendorStrategy {
    STRATEGIES
        .iter()
        .find(|s| s.vendor == vendor)
        .unwrap_or(&STRATEGIES[0])
}

/// Terms that mark an engineering role
pub const ENGINEERING_KEYWORDS: &[&str] = &[
    "engineer",
    "engineering",
    "developer",
    "software",
    "programmer",
    "architect",
    "devops",
    "backend",
    "back-end",
    "frontend",
    "front-end",
    "full stack",
    "fullstack",
    "infrastructure",
    "platform",
    "machine learning",
    "sre",
    "swe",
    "ml",
];

/// Whether a title names an engineering role
pub fn is_engineering_role(title: &str) -> bool {
    let lower = title.to_lowercase();
    let words: HashSet<&str> = lower
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();

    ENGINEERING_KEYWORDS.iter().any(|k| {
        // short keywords must match a whole word
        if k.len() <= 3 {
            words.contains(k)
        } else {
            lower.contains(k)
        }
    })
}

/// How the listings on a page were located
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListingSource {
    /// A vendor container selector matched
    Container(&'static str),
    /// No container matched; job-like anchors were scanned instead
    AnchorFallback,
}

/// One job listing found on a rendered page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedListing {
    pub url: String,
    pub title: String,
    pub location: Option<String>,
    pub department: Option<String>,
    /// Outer HTML of the matched element, used for change detection
    pub html: String,
}

/// Result of extracting one rendered page
#[derive(Debug, Clone)]
pub struct Extraction {
    pub source: ListingSource,
    /// Listings before the role filter
    pub candidates: usize,
    /// Engineering listings, deduplicated by URL
    pub listings: Vec<RenderedListing>,
}

/// Extract engineering listings from a rendered page
pub fn extract_listings(vendor: AtsType, html: &str, page_url: &str) -> Extraction {
    let document = Html::parse_document(html);
    let base = Url::parse(page_url).ok();
    let strategy = strategy_for(vendor);

    let (source, found) = match find_containers(&document, strategy) {
        Some((selector, containers)) => (
            ListingSource::Container(selector),
            containers
                .into_iter()
                .filter_map(|c| listing_from_container(c, strategy, base.as_ref()))
                .collect::<Vec<_>>(),
        ),
        None => (
            ListingSource::AnchorFallback,
            anchor_fallback(&document, base.as_ref()),
        ),
    };

    let candidates = found.len();
    let mut seen = HashSet::new();
    let listings = found
        .into_iter()
        .filter(|l| is_engineering_role(&l.title))
        .filter(|l| seen.insert(l.url.clone()))
        .collect();

    Extraction {
        source,
        candidates,
        listings,
    }
}

fn find_containers<'a>(
    document: &'a Html,
    strategy: &VendorStrategy,
) -> Option<(&'static str, Vec<ElementRef<'a>>)> {
    strategy.containers.iter().find_map(|raw| {
        let selector = Selector::parse(raw).ok()?;
        let elements: Vec<ElementRef<'a>> = document.select(&selector).collect();
        (!elements.is_empty()).then_some((*raw, elements))
    })
}

fn listing_from_container(
    container: ElementRef<'_>,
    strategy: &VendorStrategy,
    base: Option<&Url>,
) -> Option<RenderedListing> {
    let href = if container.value().name() == "a" {
        container.value().attr("href")
    } else {
        first_match(container, strategy.links).and_then(|a| a.value().attr("href"))
    }?;
    let url = resolve(base, href)?;

    // Every field falls back to the container's own text
    let raw = element_text(container);
    let field = |f: Field| field_text(container, strategy.selectors(f)).or_else(|| raw.clone());

    let title = field(Field::Title).map(|t| truncate_chars(&t, MAX_TITLE_CHARS))?;

    Some(RenderedListing {
        url,
        title,
        location: field(Field::Location),
        department: field(Field::Department),
        html: container.html(),
    })
}

fn anchor_fallback(document: &Html, base: Option<&Url>) -> Vec<RenderedListing> {
    let Ok(selector) = Selector::parse("a[href]") else {
        return Vec::new();
    };

    document
        .select(&selector)
        .filter_map(|anchor| {
            let href = anchor.value().attr("href")?;
            if !is_job_link(href) {
                return None;
            }
            Some(RenderedListing {
                url: resolve(base, href)?,
                title: truncate_chars(&element_text(anchor)?, MAX_TITLE_CHARS),
                location: None,
                department: None,
                html: anchor.html(),
            })
        })
        .collect()
}

fn first_match<'a>(scope: ElementRef<'a>, selectors: &[&str]) -> Option<ElementRef<'a>> {
    selectors.iter().find_map(|raw| {
        let selector = Selector::parse(raw).ok()?;
        scope.select(&selector).next()
    })
}

/// Text of the first selector yielding non-empty text
fn field_text(scope: ElementRef<'_>, selectors: &[&str]) -> Option<String> {
    selectors.iter().find_map(|raw| {
        let selector = Selector::parse(raw).ok()?;
        scope.select(&selector).find_map(element_text)
    })
}

fn element_text(element: ElementRef<'_>) -> Option<String> {
    let text = collapse_whitespace(&element.text().collect::<Vec<_>>().join(" "));
    (!text.is_empty()).then_some(text)
}

fn resolve(base: Option<&Url>, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') {
        return None;
    }
    let mut url = match base {
        Some(base) => base.join(href).ok()?,
        None => Url::parse(href).ok()?,
    };
    if url.scheme() != "http" && url.scheme() != "https" {
        return None;
    }
    url.set_fragment(None);
    Some(url.to_string())
}
