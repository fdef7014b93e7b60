//! URL normalization for the secondary posting lookup key

use crate::error::Result;
use crate::models::content_hash;
use url::Url;

/// Normalize a job URL.
///
/// Drops the fragment and every query parameter not in `allowlist`, lower-cases
/// the path and the remaining query, and sorts the kept parameters. Applying it
/// to its own output returns the same string.
pub fn normalize_url(url: &str, allowlist: &[String]) -> Result<String> {
    let mut parsed = Url::parse(url)?;
    parsed.set_fragment(None);

    let mut kept: Vec<(String, String)> = parsed
        .query_pairs()
        .filter(|(key, _)| allowlist.iter().any(|a| a.eq_ignore_ascii_case(key)))
        .map(|(key, value)| (key.to_lowercase(), value.to_lowercase()))
        .collect();
    kept.sort();

    let path = parsed.path().to_lowercase();
    if path.starts_with('/') {
        parsed.set_path(&path);
    } else {
        parsed.set_path(&format!("/{}", path));
    }

    if kept.is_empty() {
        parsed.set_query(None);
    } else {
        parsed.query_pairs_mut().clear().extend_pairs(kept);
    }

    Ok(parsed.to_string())
}

/// Hash of the normalized form of `url`
pub fn url_hash(url: &str, allowlist: &[String]) -> Result<String> {
    Ok(content_hash(&normalize_url(url, allowlist)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_query_allowlist;

    #[test]
    fn test_drops_tracking_params() {
        let allow = default_query_allowlist();
        assert_eq!(
            normalize_url(
                "https://boards.greenhouse.io/Vercel/Jobs/123?utm_source=x&gh_jid=123#apply",
                &allow
            )
            .unwrap(),
            "https://boards.greenhouse.io/vercel/jobs/123?gh_jid=123"
        );
        assert_eq!(
            normalize_url("https://jobs.lever.co/acme/abc?lever-origin=applied", &allow).unwrap(),
            "https://jobs.lever.co/acme/abc"
        );
    }

    #[test]
    fn test_kept_params_are_sorted_and_lowercased() {
        let allow = default_query_allowlist();
        assert_eq!(
            normalize_url("https://x.icims.com/jobs?JobId=AB12&gh_jid=9&ref=1", &allow).unwrap(),
            "https://x.icims.com/jobs?gh_jid=9&jobid=ab12"
        );
    }

    #[test]
    fn test_normalization_is_idempotent() {
        let allow = default_query_allowlist();
        let inputs = [
            "https://Example.com/A/B%2FC?jobId=X1&utm=2#frag",
            "https://example.com",
            "https://example.com/jobs/Senior%20Engineer?gh_jid=42&JID=7",
            "https://nvidia.wd5.myworkdayjobs.com/en-US/External/job/Santa-Clara/Engineer_JR1",
        ];
        for input in inputs {
            let once = normalize_url(input, &allow).unwrap();
            let twice = normalize_url(&once, &allow).unwrap();
            assert_eq!(once, twice, "normalizing {} twice changed it", input);
        }
    }

    #[test]
    fn test_root_path_is_absolute() {
        let allow = default_query_allowlist();
        assert_eq!(
            normalize_url("https://example.com?utm=1", &allow).unwrap(),
            "https://example.com/"
        );
    }

    #[test]
    fn test_invalid_url_is_parse_error() {
        assert!(normalize_url("not a url", &[]).is_err());
        assert_eq!(
            url_hash("https://a.com/x?utm=1", &[]).unwrap(),
            url_hash("https://a.com/X", &[]).unwrap()
        );
    }
}
