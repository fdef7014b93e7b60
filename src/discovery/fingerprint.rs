//! Vendor fingerprinting over (domain, response body)
//!
//! Rules are evaluated strictly in [`FINGERPRINTS`] order and the first
//! matching rule decides the vendor. Domain suffix rules come before any body
//! rule, so a vendor-hosted domain is never reclassified by markers of another
//! vendor embedded in its page (for example a "powered by" footer). Among body
//! rules, vendors are ordered by how specific their markers are.

use crate::models::AtsType;
use scraper::{Html, Selector};

/// A pure test over one probe response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Predicate {
    /// Domain equals or ends with `.<suffix>`
    DomainSuffix(&'static str),
    /// Body contains the marker, case-insensitively
    BodyMarker(&'static str),
    /// `<meta name="generator">` content contains the value, case-insensitively
    MetaGenerator(&'static str),
}

impl Predicate {
    pub fn matches(&self, probe: &ProbeResponse) -> bool {
        match self {
            Predicate::DomainSuffix(suffix) => {
                probe.domain == *suffix || probe.domain.ends_with(&format!(".{}", suffix))
            }
            Predicate::BodyMarker(marker) => probe.body.contains(marker),
            Predicate::MetaGenerator(value) => probe
                .generator
                .as_deref()
                .is_some_and(|generator| generator.contains(value)),
        }
    }
}

/// Prioritized fingerprint rules. Markers are lowercase.
pub const FINGERPRINTS: &[(AtsType, Predicate)] = &[
    (AtsType::Workday, Predicate::DomainSuffix("myworkdayjobs.com")),
    (AtsType::Workday, Predicate::DomainSuffix("myworkdaysite.com")),
    (AtsType::Greenhouse, Predicate::DomainSuffix("greenhouse.io")),
    (AtsType::Lever, Predicate::DomainSuffix("lever.co")),
    (AtsType::Ashby, Predicate::DomainSuffix("ashbyhq.com")),
    (AtsType::Workable, Predicate::DomainSuffix("workable.com")),
    (AtsType::Icims, Predicate::DomainSuffix("icims.com")),
    (AtsType::SmartRecruiters, Predicate::DomainSuffix("smartrecruiters.com")),
    (AtsType::Jobvite, Predicate::DomainSuffix("jobvite.com")),
    (AtsType::Workday, Predicate::MetaGenerator("workday")),
    (AtsType::Workday, Predicate::BodyMarker("/wday/cxs/")),
    (AtsType::Workday, Predicate::BodyMarker("myworkdayjobs.com")),
    (AtsType::Icims, Predicate::BodyMarker("icims_content_iframe")),
    (AtsType::Icims, Predicate::BodyMarker(".icims.com")),
    (AtsType::Greenhouse, Predicate::BodyMarker("boards.greenhouse.io")),
    (AtsType::Greenhouse, Predicate::BodyMarker("grnhse_app")),
    (AtsType::Lever, Predicate::BodyMarker("jobs.lever.co")),
    (AtsType::Ashby, Predicate::BodyMarker("jobs.ashbyhq.com")),
    (AtsType::Ashby, Predicate::BodyMarker("ashby_embed")),
    (AtsType::Workable, Predicate::BodyMarker("apply.workable.com")),
    (AtsType::SmartRecruiters, Predicate::BodyMarker("smartrecruiters.com")),
    (AtsType::Jobvite, Predicate::BodyMarker("jobs.jobvite.com")),
];

/// Normalized view of a probe response that predicates run against
#[derive(Debug, Clone)]
pub struct ProbeResponse {
    pub domain: String,
    pub body: String,
    pub generator: Option<String>,
}

impl ProbeResponse {
    pub fn new(domain: &str, body: &str) -> Self {
        let host = domain.split(':').next().unwrap_or(domain);
        Self {
            domain: host.trim_end_matches('.').to_lowercase(),
            body: body.to_lowercase(),
            generator: meta_generator(body).map(|g| g.to_lowercase()),
        }
    }
}

fn meta_generator(html: &str) -> Option<String> {
    let selector = Selector::parse("meta[name]").ok()?;
    Html::parse_document(html)
        .select(&selector)
        .filter(|meta| {
            meta.value()
                .attr("name")
                .is_some_and(|name| name.eq_ignore_ascii_case("generator"))
        })
        .find_map(|meta| meta.value().attr("content").map(str::to_string))
}

/// Vendor of the first rule matching the response, if any
pub fn fingerprint(domain: &str, body: &str) -> Option<AtsType> {
    let probe = ProbeResponse::new(domain, body);
    FINGERPRINTS
        .iter()
        .find(|(_, predicate)| predicate.matches(&probe))
        .map(|(ats_type, _)| *ats_type)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_suffix() {
        assert_eq!(
            fingerprint("nvidia.wd5.myworkdayjobs.com", "<html></html>"),
            Some(AtsType::Workday)
        );
        assert_eq!(fingerprint("careers-ibm.icims.com", ""), Some(AtsType::Icims));
        assert_eq!(fingerprint("boards.greenhouse.io", ""), Some(AtsType::Greenhouse));
        // suffix must align on a label boundary
        assert_eq!(fingerprint("notlever.co.example", ""), None);
        assert_eq!(fingerprint("myicims.com", ""), None);
    }

    #[test]
    fn test_body_markers_and_meta() {
        assert_eq!(
            fingerprint(
                "careers.acme.com",
                r#"<iframe src="https://boards.greenhouse.io/embed/job_board?for=acme"></iframe>"#
            ),
            Some(AtsType::Greenhouse)
        );
        assert_eq!(
            fingerprint(
                "careers.acme.com",
                r#"<html><head><meta name="generator" content="Workday Recruiting"></head></html>"#
            ),
            Some(AtsType::Workday)
        );
        assert_eq!(
            fingerprint("careers.acme.com", "<html><body>Join us!</body></html>"),
            None
        );
    }

    #[test]
    fn test_priority_is_deterministic() {
        let both = r#"<a href="https://jobs.lever.co/acme">Lever</a>
                      <a href="https://boards.greenhouse.io/acme">Greenhouse</a>"#;
        // Greenhouse body rules precede Lever body rules
        assert_eq!(fingerprint("careers.acme.com", both), Some(AtsType::Greenhouse));

        // Domain suffix beats any body marker
        assert_eq!(
            fingerprint("acme.wd1.myworkdayjobs.com", both),
            Some(AtsType::Workday)
        );

        for _ in 0..10 {
            assert_eq!(fingerprint("careers.acme.com", both), Some(AtsType::Greenhouse));
        }
    }

    #[test]
    fn test_marker_is_case_insensitive() {
        assert_eq!(
            fingerprint("jobs.acme.com", "<div id=\"ICIMS_CONTENT_IFRAME\"></div>"),
            Some(AtsType::Icims)
        );
    }
}
