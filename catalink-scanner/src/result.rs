use crate::domain::Domain;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

/// How a single domain fared during a pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DomainOutcome {
    /// Claimed but not finished yet (or aborted by a pass-fatal error).
    Pending,
    Ingested { triples: usize, failed: usize },
    Empty,
    Unchanged,
    Unreachable { reason: String },
    NoMetadataApi,
    CatalogError { status: u16 },
    MalformedResponse { reason: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainReport {
    pub domain: Domain,
    pub endpoint: String,
    pub outcome: DomainOutcome,
}

/// Visited-domain set and running tally of one crawl pass.
///
/// A domain is claimed at most once; the claim happens before any network
/// call for it, so a failing branch can never be re-entered in the same pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CrawlPass {
    reports: Vec<DomainReport>,
    #[serde(skip)]
    claimed: HashSet<Domain>,
    pub triples_fetched: usize,
    pub triples_inserted: usize,
    pub insert_failures: usize,
    #[serde(with = "duration_millis")]
    pub elapsed: Duration,
}

impl CrawlPass {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, domain: &Domain) -> bool {
        self.claimed.contains(domain)
    }

    /// Claim `domain` for this pass. Returns false if it was already claimed.
    pub fn claim(&mut self, domain: &Domain, endpoint: &str) -> bool {
        if !self.claimed.insert(domain.clone()) {
            return false;
        }
        self.reports.push(DomainReport {
            domain: domain.clone(),
            endpoint: endpoint.to_string(),
            outcome: DomainOutcome::Pending,
        });
        true
    }

    pub fn record(&mut self, domain: &Domain, outcome: DomainOutcome) {
        if let Some(report) = self.reports.iter_mut().find(|r| &r.domain == domain) {
            report.outcome = outcome;
        }
    }

    /// Domains in the order they were claimed.
    pub fn visited(&self) -> Vec<&Domain> {
        self.reports.iter().map(|r| &r.domain).collect()
    }

    pub fn reports(&self) -> &[DomainReport] {
        &self.reports
    }

    pub fn outcome(&self, domain: &Domain) -> Option<&DomainOutcome> {
        self.reports
            .iter()
            .find(|r| &r.domain == domain)
            .map(|r| &r.outcome)
    }

    pub fn len(&self) -> usize {
        self.reports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reports.is_empty()
    }
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}
