//! Field and link extraction from job listing and job detail pages

use regex::Regex;
use scraper::{Html, Selector};
use std::collections::HashSet;
use std::sync::LazyLock;
use url::Url;

static JOB_LINK_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?ix)
        /(jobs?|positions?|postings?|openings?|requisitions?|job-details?)/[^/?\#]+
        | [?&](gh_jid|jobid|job_id|jid|reqid)=\d+
        | /[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}",
    )
    .expect("job link pattern is valid")
});

/// Two-letter region abbreviations recognised in "City, ST" locations
pub const REGION_CODES: &[&str] = &[
    "AL", "AK", "AZ", "AR", "CA", "CO", "CT", "DE", "FL", "GA", "HI", "ID", "IL", "IN", "IA",
    "KS", "KY", "LA", "ME", "MD", "MA", "MI", "MN", "MS", "MO", "MT", "NE", "NV", "NH", "NJ",
    "NM", "NY", "NC", "ND", "OH", "OK", "OR", "PA", "RI", "SC", "SD", "TN", "TX", "UT", "VT",
    "VA", "WA", "WV", "WI", "WY", "DC",
];

static LOCATION_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    let regions = REGION_CODES.join("|");
    Regex::new(&format!(
        r"\b([A-Z][A-Za-z.'\-]+(?: [A-Z][A-Za-z.'\-]+){{0,2}}), ({})\b",
        regions
    ))
    .expect("location pattern is valid")
});

/// Heading selectors in priority order
const TITLE_SELECTORS: &[&str] = &["h1", "h2", "h3", "[itemprop='title']", ".job-title"];

/// Whether an href looks like a job detail page
pub fn is_job_link(href: &str) -> bool {
    JOB_LINK_PATTERN.is_match(href)
}

/// Collect job-detail candidate URLs from a listing page.
///
/// Relative hrefs are resolved against `page_url`; the result is deduplicated
/// and keeps first-seen order.
pub fn extract_job_links(html: &str, page_url: &str) -> Vec<String> {
    let Ok(base) = Url::parse(page_url) else {
        return Vec::new();
    };
    let Ok(selector) = Selector::parse("a[href]") else {
        return Vec::new();
    };

    let document = Html::parse_document(html);
    let mut seen = HashSet::new();
    let mut links = Vec::new();

    for elem in document.select(&selector) {
        let Some(href) = elem.value().attr("href") else {
            continue;
        };
        let href = href.trim();
        if href.is_empty() || href.starts_with('#') || !is_job_link(href) {
            continue;
        }

        let Ok(mut resolved) = base.join(href) else {
            continue;
        };
        if resolved.scheme() != "http" && resolved.scheme() != "https" {
            continue;
        }
        resolved.set_fragment(None);

        let resolved = resolved.to_string();
        if resolved == base.as_str() {
            continue;
        }
        if seen.insert(resolved.clone()) {
            links.push(resolved);
        }
    }

    links
}

/// Collapse runs of whitespace into single spaces
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Truncate to at most `max_chars` characters on a char boundary
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => text[..idx].trim_end().to_string(),
        None => text.to_string(),
    }
}

/// Title from the first heading-like element, truncated to `max_chars`
pub fn extract_title(document: &Html, max_chars: usize) -> Option<String> {
    TITLE_SELECTORS
        .iter()
        .filter_map(|s| Selector::parse(s).ok())
        .find_map(|selector| {
            document
                .select(&selector)
                .map(|elem| collapse_whitespace(&elem.text().collect::<String>()))
                .find(|text| !text.is_empty())
        })
        .map(|title| truncate_chars(&title, max_chars))
}

/// Visible text of a document, one line per text node, skipping script and
/// style contents
pub fn visible_text(document: &Html) -> String {
    let mut parts = Vec::new();
    for node in document.root_element().descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node
            .parent()
            .and_then(|p| p.value().as_element().map(|e| e.name()))
            .map(|name| matches!(name, "script" | "style" | "noscript" | "template"))
            .unwrap_or(false);
        if !hidden && !text.trim().is_empty() {
            parts.push(collapse_whitespace(text));
        }
    }
    parts.join("\n")
}

/// First "City, ST" match in the given text
pub fn extract_location(text: &str) -> Option<String> {
    LOCATION_PATTERN
        .captures(text)
        .map(|caps| format!("{}, {}", &caps[1], &caps[2]))
}

/// Fields extracted from one job detail page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobFields {
    pub title: Option<String>,
    pub location: Option<String>,
}

/// Extract title and location from a job detail page
pub fn extract_job_fields(html: &str, title_max_chars: usize) -> JobFields {
    let document = Html::parse_document(html);
    JobFields {
        title: extract_title(&document, title_max_chars),
        location: extract_location(&visible_text(&document)),
    }
}

/// Job family buckets in match priority order
const JOB_FAMILIES: &[(&str, &[&str])] = &[
    (
        "data",
        &["data scien", "data engineer", "data analyst", "analytics", "machine learning"],
    ),
    (
        "engineering",
        &[
            "engineer", "developer", "sre", "devops", "architect", "programmer", "software",
        ],
    ),
    ("design", &["designer", "design", "ux", "ui"]),
    ("product", &["product manager", "product owner", "program manager"]),
    ("sales", &["sales", "account executive", "account manager", "business development"]),
    ("marketing", &["marketing", "growth", "content", "brand"]),
    (
        "operations",
        &["operations", "recruit", "people", "finance", "legal", "accountant"],
    ),
];

/// Classify a job title into a coarse family
pub fn classify_job_family(title: &str) -> Option<&'static str> {
    let lower = title.to_lowercase();
    if lower.trim().is_empty() {
        return None;
    }
    let words: HashSet<&str> = lower
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();

    JOB_FAMILIES
        .iter()
        .find(|(_, keywords)| {
            keywords.iter().any(|k| {
                // short keywords must match a whole word
                if k.len() <= 3 {
                    words.contains(k)
                } else {
                    lower.contains(k)
                }
            })
        })
        .map(|(family, _)| *family)
        .or(Some("other"))
}
