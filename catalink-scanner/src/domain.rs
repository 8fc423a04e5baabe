//! Domain helpers and the crawl whitelist.
//!
//! Every catalog on a domain is assumed to be reachable by appending a fixed
//! path to that domain; there is no separate discovery protocol.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::Path;
use tracing::warn;
use url::Url;

/// Path appended to a domain to reach its SPARQL query endpoint.
pub const SPARQL_QUERY_PATH: &str = "api/sparql/query";

/// Path appended to a domain to reach its last-modified metadata API.
pub const LAST_MODIFIED_PATH: &str = "api/metadata/last-modified";

/// Network authority (host plus optional port) identifying one catalog.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Domain(String);

impl Domain {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Domain {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Extract the authority component of a URL.
///
/// A bare `host` or `host:port` without a scheme is accepted as its own
/// authority. URIs that carry no network authority (`urn:`, `mailto:`)
/// yield `None`.
pub fn domain_of(url: &str) -> Option<Domain> {
    let trimmed = url.trim();
    if trimmed.is_empty() {
        return None;
    }

    match Url::parse(trimmed) {
        Ok(parsed) if parsed.has_host() => authority(&parsed),
        Ok(_) if !looks_like_authority(trimmed) => None,
        _ => Url::parse(&format!("http://{}", trimmed))
            .ok()
            .and_then(|parsed| authority(&parsed)),
    }
}

fn authority(parsed: &Url) -> Option<Domain> {
    let host = parsed.host_str().filter(|h| !h.is_empty())?;
    let authority = match parsed.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    };
    Some(Domain(authority))
}

// `localhost:3000/api` parses as scheme `localhost`; treat a numeric tail as a port.
fn looks_like_authority(value: &str) -> bool {
    value
        .split_once(':')
        .map(|(_, rest)| {
            let port = rest.split('/').next().unwrap_or_default();
            !port.is_empty() && port.chars().all(|c| c.is_ascii_digit())
        })
        .unwrap_or(false)
}

/// SPARQL query endpoint for a domain.
pub fn endpoint_for(domain: &Domain) -> String {
    format!("http://{}/{}", domain, SPARQL_QUERY_PATH)
}

/// Last-modified metadata URL on the same domain as `url`.
pub fn last_modified_endpoint_for(url: &str) -> Option<String> {
    domain_of(url).map(|domain| format!("http://{}/{}", domain, LAST_MODIFIED_PATH))
}

/// Domains eligible for recursive discovery. Loaded once, never mutated.
#[derive(Debug, Clone, Default)]
pub struct Whitelist {
    domains: Vec<Domain>,
    index: HashSet<Domain>,
}

impl Whitelist {
    /// Build a whitelist from domain names, keeping first-seen order.
    pub fn from_domains<I, S>(domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut whitelist = Self::default();
        for entry in domains {
            let entry = entry.as_ref().trim();
            match domain_of(entry) {
                Some(domain) => {
                    if whitelist.index.insert(domain.clone()) {
                        whitelist.domains.push(domain);
                    }
                }
                None => warn!("Skipping invalid whitelist entry '{}'", entry),
            }
        }
        whitelist
    }

    /// Parse newline-separated domains. Blank lines and `#` comments are ignored.
    pub fn from_lines(content: &str) -> Self {
        Self::from_domains(
            content
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty() && !line.starts_with('#')),
        )
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(Self::from_lines(&content))
    }

    pub fn contains(&self, domain: &Domain) -> bool {
        self.index.contains(domain)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Domain> {
        self.domains.iter()
    }

    pub fn len(&self) -> usize {
        self.domains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.domains.is_empty()
    }
}
