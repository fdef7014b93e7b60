//! Candidate domain generation from the static seed vocabulary

use crate::config::DiscoveryConfig;
use crate::models::AtsType;
use std::collections::HashSet;

/// A domain to probe, with the vendor whose base domain produced it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub domain: String,
    pub base_vendor: Option<AtsType>,
}

impl From<String> for Candidate {
    fn from(domain: String) -> Self {
        Self {
            domain,
            base_vendor: None,
        }
    }
}

/// Combine every vendor base domain with its curated prefixes and the generic
/// subdomains. Order follows the configuration; duplicates are dropped.
pub fn generate_candidates(config: &DiscoveryConfig) -> Vec<Candidate> {
    let mut seen = HashSet::new();
    let mut candidates = Vec::new();

    for base in &config.base_domains {
        let base_domain = base.domain.trim().trim_start_matches('.').to_lowercase();
        if base_domain.is_empty() {
            continue;
        }

        let labels = base.prefixes.iter().chain(config.generic_subdomains.iter());
        for label in labels {
            let label = label.trim().trim_end_matches('.').to_lowercase();
            if label.is_empty() {
                continue;
            }
            let domain = format!("{}.{}", label, base_domain);
            if seen.insert(domain.clone()) {
                candidates.push(Candidate {
                    domain,
                    base_vendor: Some(base.ats_type),
                });
            }
        }
    }

    candidates
}

/// Labels that name the board rather than the company
const HOST_LABELS: &[&str] = &["www", "boards", "jobs", "apply", "careers", "job-boards"];

/// Tenant prefixes stripped before deriving a company name
const TENANT_PREFIXES: &[&str] = &["uscareers-", "careers-", "jobs-"];

/// Best-effort display name for the company behind a domain.
///
/// `careers-ibm.icims.com` becomes `Ibm`, `boards.greenhouse.io` becomes
/// `Greenhouse`.
pub fn company_from_domain(domain: &str) -> String {
    let host = domain.split(':').next().unwrap_or(domain).to_lowercase();
    let labels: Vec<&str> = host.split('.').filter(|l| !l.is_empty()).collect();

    let label = labels
        .iter()
        .find(|l| !HOST_LABELS.contains(l))
        .or_else(|| labels.first())
        .copied()
        .unwrap_or("");

    let mut name = label;
    for prefix in TENANT_PREFIXES {
        if let Some(rest) = name.strip_prefix(prefix) {
            name = rest;
            break;
        }
    }

    name.split(['-', '_'])
        .filter(|w| !w.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
