//! Session cookies exported from a logged-in browser.
//!
//! Two export shapes are accepted: a list of cookie objects (the format of
//! the common cookie-editor extensions) or a flat `{ "name": "value" }` map.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum CookieError {
    #[error("failed to read cookie file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("cookie file is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionCookie {
    pub name: String,
    pub value: String,
    pub domain: String,
    pub path: String,
}

impl SessionCookie {
    /// Whether the cookie should be sent to `url`.
    pub fn matches(&self, url: &Url) -> bool {
        let Some(host) = url.host_str() else {
            return false;
        };
        let domain = self.domain.trim_start_matches('.');
        let domain_ok = domain.is_empty()
            || host.eq_ignore_ascii_case(domain)
            || host
                .to_ascii_lowercase()
                .ends_with(&format!(".{}", domain.to_ascii_lowercase()));
        domain_ok && url.path().starts_with(self.path.as_str())
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CookieExport {
    List(Vec<ExportedCookie>),
    Map(BTreeMap<String, String>),
}

#[derive(Debug, Deserialize)]
struct ExportedCookie {
    name: String,
    value: String,
    #[serde(default)]
    domain: Option<String>,
    #[serde(default)]
    path: Option<String>,
}

/// Parse a cookie export, keeping only cookies that belong to `site_domain`.
///
/// Cookies without a domain are assigned `.{site_domain}`.
pub fn parse_cookies(json: &str, site_domain: &str) -> Result<Vec<SessionCookie>, CookieError> {
    let default_domain = format!(".{}", site_domain.trim_start_matches('.'));
    let export: CookieExport = serde_json::from_str(json)?;

    let cookies: Vec<SessionCookie> = match export {
        CookieExport::List(list) => list
            .into_iter()
            .map(|c| SessionCookie {
                name: c.name,
                value: c.value,
                domain: c
                    .domain
                    .filter(|d| !d.is_empty())
                    .unwrap_or_else(|| default_domain.clone()),
                path: c.path.filter(|p| !p.is_empty()).unwrap_or_else(root_path),
            })
            .collect(),
        CookieExport::Map(map) => map
            .into_iter()
            .map(|(name, value)| SessionCookie {
                name,
                value,
                domain: default_domain.clone(),
                path: root_path(),
            })
            .collect(),
    };

    let needle = site_domain.trim_start_matches('.').to_ascii_lowercase();
    Ok(cookies
        .into_iter()
        .filter(|c| c.domain.to_ascii_lowercase().contains(&needle))
        .collect())
}

/// Read and parse a cookie export file.
pub fn load_cookie_file(path: &Path, site_domain: &str) -> Result<Vec<SessionCookie>, CookieError> {
    let text = fs::read_to_string(path).map_err(|source| CookieError::Read {
        path: path.display().to_string(),
        source,
    })?;
    parse_cookies(&text, site_domain)
}

/// Render the `Cookie` header value for `url`, if any cookie applies.
pub fn cookie_header(cookies: &[SessionCookie], url: &Url) -> Option<String> {
    let pairs: Vec<String> = cookies
        .iter()
        .filter(|c| c.matches(url))
        .map(|c| format!("{}={}", c.name, c.value))
        .collect();
    if pairs.is_empty() {
        None
    } else {
        Some(pairs.join("; "))
    }
}

fn root_path() -> String {
    "/".to_string()
}
