//! Application fingerprint: a stable (user, job) identity key.
//!
//! Equivalent posting URLs must collapse to the same fingerprint:
//! tracking parameters are stripped, hosts lowercased, trailing slashes
//! trimmed, and for sites with a known URL format the job id itself is
//! extracted so deep-link variants of the same posting match.

use serde::{Deserialize, Serialize};
use url::Url;

/// Query parameters that carry attribution, not identity.
const TRACKING_PARAMS: &[&str] = &["gh_src", "lever-source", "trk", "refId", "source", "ref", "src"];

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ApplicationFingerprint {
    pub user_id: String,
    pub job_identity: String,
}

impl ApplicationFingerprint {
    pub fn new(user_id: &str, job_url: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            job_identity: job_identity(job_url),
        }
    }
}

impl std::fmt::Display for ApplicationFingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.user_id, self.job_identity)
    }
}

/// Normalized job identity for a posting URL. Unparseable URLs fall
/// back to the trimmed raw string so the fingerprint is still total.
fn job_identity(raw: &str) -> String {
    let url = match Url::parse(raw.trim()) {
        Ok(url) => url,
        Err(_) => return raw.trim().trim_end_matches('/').to_ascii_lowercase(),
    };

    let host = url.host_str().unwrap_or("").to_ascii_lowercase();

    if let Some(identity) = site_job_id(&host, &url) {
        return identity;
    }

    let path = url.path().trim_end_matches('/');
    let mut kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| !is_tracking_param(k))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    kept.sort();

    if kept.is_empty() {
        format!("{}{}", host, path)
    } else {
        let query = kept
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("&");
        format!("{}{}?{}", host, path, query)
    }
}

pub(crate) fn is_tracking_param(key: &str) -> bool {
    key.starts_with("utm_") || TRACKING_PARAMS.iter().any(|p| key.eq_ignore_ascii_case(p))
}

/// Copy of the URL with attribution-only query parameters removed.
/// Identity-bearing parameters (board tokens, posting ids) survive.
pub(crate) fn strip_tracking_params(url: &Url) -> Url {
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| !is_tracking_param(k))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    let mut out = url.clone();
    if kept.is_empty() {
        out.set_query(None);
    } else {
        out.query_pairs_mut()
            .clear()
            .extend_pairs(kept.iter().map(|(k, v)| (k.as_str(), v.as_str())));
    }
    out
}

/// True when `host` is `domain` or a subdomain of it. Plain suffix
/// matching would accept lookalikes such as `fakelinkedin.com`.
pub(crate) fn domain_matches(host: &str, domain: &str) -> bool {
    host == domain
        || (host.len() > domain.len()
            && host.ends_with(domain)
            && host.as_bytes()[host.len() - domain.len() - 1] == b'.')
}

/// Site-aware job id extraction for URL formats we know.
fn site_job_id(host: &str, url: &Url) -> Option<String> {
    if domain_matches(host, "linkedin.com") {
        if let Some((_, id)) = url.query_pairs().find(|(k, _)| k == "currentJobId") {
            return Some(format!("linkedin:{}", id));
        }
        let segments: Vec<&str> = url.path_segments()?.filter(|s| !s.is_empty()).collect();
        if let ["jobs", "view", id, ..] = segments.as_slice() {
            return Some(format!("linkedin:{}", id));
        }
        return None;
    }

    if domain_matches(host, "indeed.com") {
        if let Some((_, jk)) = url.query_pairs().find(|(k, _)| k == "jk") {
            return Some(format!("indeed:{}", jk));
        }
        return None;
    }

    if domain_matches(host, "greenhouse.io") {
        // boards.greenhouse.io/<company>/jobs/<id>
        let segments: Vec<&str> = url.path_segments()?.filter(|s| !s.is_empty()).collect();
        if let [company, "jobs", id, ..] = segments.as_slice() {
            return Some(format!("greenhouse:{}:{}", company.to_ascii_lowercase(), id));
        }
        return None;
    }

    None
}
