use crate::domain::{Domain, Whitelist, domain_of, endpoint_for, last_modified_endpoint_for};
use crate::error::{CrawlError, Result};
use crate::graph_store::GraphStoreClient;
use crate::result::{CrawlPass, DomainOutcome};
use crate::sparql::{
    FULL_DUMP_QUERY, SPARQL_QUERY_CONTENT_TYPE, SPARQL_RESULTS_JSON, SelectResponse, Triple,
};
use chrono::{DateTime, NaiveDateTime, Utc};
use futures::future::{BoxFuture, FutureExt};
use reqwest::Client;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde::Deserialize;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Build the HTTP client used for every catalog and graph store call.
pub fn http_client(timeout: Duration) -> Result<Client> {
    let client = Client::builder()
        .user_agent(concat!("Catalink/", env!("CARGO_PKG_VERSION")))
        .timeout(timeout)
        .connect_timeout(timeout / 2)
        .pool_idle_timeout(Duration::from_secs(90))
        .tcp_keepalive(Duration::from_secs(60))
        .redirect(reqwest::redirect::Policy::limited(5))
        .build()?;
    Ok(client)
}

#[derive(Debug, Deserialize)]
struct LastModified {
    #[serde(rename = "lastModifiedAt")]
    last_modified_at: Option<String>,
}

/// Parse the body of a last-modified response: JSON `lastModifiedAt`, or raw text.
pub fn parse_last_modified(body: &str) -> Option<DateTime<Utc>> {
    let raw = serde_json::from_str::<LastModified>(body)
        .ok()
        .and_then(|m| m.last_modified_at)
        .unwrap_or_else(|| body.trim().trim_matches('"').to_string());
    let raw = raw.trim();

    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S")
                .ok()
                .map(|naive| naive.and_utc())
        })
}

fn bulk_fetch_failed(url: &str, source: reqwest::Error) -> CrawlError {
    let err = CrawlError::BulkFetch {
        url: url.to_string(),
        source,
    };
    error!("{}", err);
    err
}

enum Freshness {
    Changed,
    Unchanged,
    Abort(DomainOutcome),
}

/// Recursive, whitelist-bounded catalog crawler.
///
/// A pass is strictly sequential: one outstanding request at a time.
pub struct Crawler {
    client: Client,
    graph_store: GraphStoreClient,
    whitelist: Arc<Whitelist>,
    skip_unchanged: bool,
    verify_existing: bool,
}

impl Crawler {
    pub fn new(client: Client, graph_store: GraphStoreClient, whitelist: Arc<Whitelist>) -> Self {
        Self {
            client,
            graph_store,
            whitelist,
            skip_unchanged: false,
            verify_existing: false,
        }
    }

    /// Skip the full dump of catalogs whose last-modified time is not newer
    /// than the previous pass.
    pub fn with_skip_unchanged(mut self, skip: bool) -> Self {
        self.skip_unchanged = skip;
        self
    }

    /// Query the graph store for each triple before inserting it. The answer
    /// is only logged; the insert happens either way.
    pub fn with_existence_check(mut self, verify: bool) -> Self {
        self.verify_existing = verify;
        self
    }

    /// Crawl a batch of starting endpoints as one pass sharing one visited set.
    ///
    /// Duplicate endpoints are collapsed first. A bulk-fetch transport failure
    /// aborts the remainder of the pass.
    pub async fn run_pass(&self, endpoints: &[String], since: DateTime<Utc>) -> Result<CrawlPass> {
        let started = Instant::now();
        let mut seen = HashSet::new();
        let distinct: Vec<&String> = endpoints.iter().filter(|e| seen.insert(*e)).collect();
        info!(
            "Starting crawl pass over {} endpoint(s), last crawl {}",
            distinct.len(),
            since.to_rfc3339()
        );

        let mut pass = CrawlPass::new();
        for endpoint in distinct {
            self.crawl(endpoint, since, &mut pass).await?;
        }
        pass.elapsed = started.elapsed();

        info!(
            "Crawl pass complete. Visited {} domain(s), inserted {}/{} triples in {:?}",
            pass.len(),
            pass.triples_inserted,
            pass.triples_fetched,
            pass.elapsed
        );
        Ok(pass)
    }

    /// Crawl one endpoint and everything reachable from it through whitelisted
    /// object URIs, skipping domains already in `pass`.
    pub fn crawl<'a>(
        &'a self,
        endpoint: &'a str,
        since: DateTime<Utc>,
        pass: &'a mut CrawlPass,
    ) -> BoxFuture<'a, Result<()>> {
        async move {
            let Some(domain) = domain_of(endpoint) else {
                warn!("Skipping endpoint without a domain: {}", endpoint);
                return Ok(());
            };

            if !pass.claim(&domain, endpoint) {
                debug!("Domain {} already crawled in this pass", domain);
                return Ok(());
            }
            debug!("Crawling {} (visited: {:?})", endpoint, pass.visited());

            match self.check_freshness(endpoint, &domain, since).await {
                Freshness::Changed => {}
                Freshness::Unchanged if self.skip_unchanged => {
                    info!("Skipping {}: not modified since last crawl", domain);
                    pass.record(&domain, DomainOutcome::Unchanged);
                    return Ok(());
                }
                Freshness::Unchanged => {
                    debug!("{} not modified since last crawl; fetching anyway", domain);
                }
                Freshness::Abort(outcome) => {
                    pass.record(&domain, outcome);
                    return Ok(());
                }
            }

            let triples = match self.fetch_dump(&domain).await? {
                Ok(triples) => triples,
                Err(outcome) => {
                    pass.record(&domain, outcome);
                    return Ok(());
                }
            };

            if triples.is_empty() {
                info!("No data at {}", domain);
                pass.record(&domain, DomainOutcome::Empty);
                return Ok(());
            }

            pass.triples_fetched += triples.len();
            let mut inserted = 0;
            let mut failed = 0;

            for triple in &triples {
                if self.ingest(triple).await {
                    inserted += 1;
                    pass.triples_inserted += 1;
                } else {
                    failed += 1;
                    pass.insert_failures += 1;
                }

                if !triple.object.is_uri() {
                    continue;
                }

                let Some(target) = domain_of(&triple.object.value) else {
                    continue;
                };
                if !self.whitelist.contains(&target) {
                    debug!("{} is not whitelisted, not following", target);
                    continue;
                }
                if pass.contains(&target) {
                    debug!("{} already crawled in this pass", target);
                    continue;
                }

                info!("Following reference from {} to {}", domain, target);
                let next = endpoint_for(&target);
                self.crawl(&next, since, pass).await?;
            }

            pass.record(&domain, DomainOutcome::Ingested { triples: inserted, failed });
            Ok(())
        }
        .boxed()
    }

    async fn check_freshness(&self, endpoint: &str, domain: &Domain, since: DateTime<Utc>) -> Freshness {
        let Some(url) = last_modified_endpoint_for(endpoint) else {
            return Freshness::Abort(DomainOutcome::Unreachable {
                reason: "no domain".to_string(),
            });
        };

        let response = match self.client.get(&url).send().await {
            Ok(response) => response,
            Err(source) => {
                let err = CrawlError::Unreachable { url, source };
                warn!("Endpoint {}: {}", endpoint, err);
                return Freshness::Abort(DomainOutcome::Unreachable {
                    reason: err.to_string(),
                });
            }
        };

        let status = response.status().as_u16();
        match status {
            404 => {
                warn!("{}", CrawlError::NotFound(url));
                return Freshness::Abort(DomainOutcome::NoMetadataApi);
            }
            500 => {
                error!("Endpoint {} is failing: {}", endpoint, CrawlError::ServerError { url, status });
                return Freshness::Abort(DomainOutcome::CatalogError { status });
            }
            s if !(200..300).contains(&s) => {
                warn!("Unexpected status: {}", CrawlError::ServerError { url, status });
                return Freshness::Abort(DomainOutcome::CatalogError { status });
            }
            _ => {}
        }

        let body = match response.text().await {
            Ok(body) => body,
            Err(source) => {
                let err = CrawlError::Unreachable { url, source };
                warn!("Endpoint {}: {}", endpoint, err);
                return Freshness::Abort(DomainOutcome::Unreachable {
                    reason: err.to_string(),
                });
            }
        };
        debug!("Last modified response from {}: {}", domain, body);

        match parse_last_modified(&body) {
            Some(modified) if modified <= since => {
                debug!(
                    "{} last modified {} is not after last crawl {}",
                    domain,
                    modified.to_rfc3339(),
                    since.to_rfc3339()
                );
                Freshness::Unchanged
            }
            Some(_) => Freshness::Changed,
            None => {
                warn!("Unparseable last-modified value from {}: {:?}", domain, body);
                Freshness::Changed
            }
        }
    }

    /// Outer error aborts the pass; inner error is a branch-local outcome.
    async fn fetch_dump(&self, domain: &Domain) -> Result<std::result::Result<Vec<Triple>, DomainOutcome>> {
        let url = endpoint_for(domain);
        debug!("Fetching RDF data from {} with {}", url, FULL_DUMP_QUERY);

        let response = self
            .client
            .post(&url)
            .header(CONTENT_TYPE, SPARQL_QUERY_CONTENT_TYPE)
            .header(ACCEPT, SPARQL_RESULTS_JSON)
            .body(FULL_DUMP_QUERY)
            .send()
            .await
            .map_err(|source| bulk_fetch_failed(&url, source))?;
        let body = response
            .text()
            .await
            .map_err(|source| bulk_fetch_failed(&url, source))?;

        match serde_json::from_str::<SelectResponse>(&body) {
            Ok(parsed) => Ok(Ok(parsed.results.bindings)),
            Err(e) => {
                let err = CrawlError::MalformedResponse {
                    url,
                    reason: e.to_string(),
                };
                error!("{}\n{}", err, body);
                Ok(Err(DomainOutcome::MalformedResponse {
                    reason: e.to_string(),
                }))
            }
        }
    }

    async fn ingest(&self, triple: &Triple) -> bool {
        if self.verify_existing {
            match self.graph_store.triple_exists(triple).await {
                Ok(true) => debug!("Triple already stored, inserting anyway: {}", triple.insert_data()),
                Ok(false) => {}
                Err(e) => warn!("Existence check failed: {}", e),
            }
        }

        match self.graph_store.insert_triple(triple).await {
            Ok(()) => true,
            Err(e) => {
                error!(
                    "Failed to insert triple into {}: {} ({})",
                    self.graph_store.insert_url(),
                    e,
                    triple.insert_data()
                );
                false
            }
        }
    }
}
