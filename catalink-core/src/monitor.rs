use crate::config::Settings;
use crate::error::Result;
use crate::notify::{Notifier, UPDATED};
use crate::registry::{EndpointRegistry, PlannedEndpointRegistry};
use crate::sleep_or_cancelled;
use catalink_scanner::{CrawlPass, Crawler, GraphStoreClient, Whitelist, domain_of, http_client};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Build a crawler from the current settings.
pub fn crawler_for(settings: &Settings, whitelist: Arc<Whitelist>) -> Result<Crawler> {
    let client = http_client(settings.http_timeout)?;
    let graph_store = GraphStoreClient::new(
        client.clone(),
        settings.graphdb_read_url.clone(),
        settings.graphdb_insert_url.clone(),
    );
    Ok(Crawler::new(client, graph_store, whitelist)
        .with_skip_unchanged(settings.skip_unchanged)
        .with_existence_check(settings.verify_existing))
}

#[derive(Debug)]
pub enum CycleOutcome {
    /// Nothing was submitted.
    Idle,
    Crawled(CrawlPass),
}

/// Watches the endpoint registry and crawls whatever has been submitted.
///
/// After a pass the processed endpoints are published as updated, moved to
/// the planned registry and removed from the endpoint registry. A failed
/// pass leaves the registry untouched so the same endpoints are retried.
pub struct EndpointMonitor {
    endpoints: Arc<EndpointRegistry>,
    planned: Arc<PlannedEndpointRegistry>,
    whitelist: Arc<Whitelist>,
    notifier: Arc<dyn Notifier>,
    settings: watch::Receiver<Settings>,
    last_crawl: DateTime<Utc>,
}

impl EndpointMonitor {
    pub fn new(
        endpoints: Arc<EndpointRegistry>,
        planned: Arc<PlannedEndpointRegistry>,
        whitelist: Arc<Whitelist>,
        notifier: Arc<dyn Notifier>,
        settings: watch::Receiver<Settings>,
        last_crawl: DateTime<Utc>,
    ) -> Self {
        Self {
            endpoints,
            planned,
            whitelist,
            notifier,
            settings,
            last_crawl,
        }
    }

    /// High-water mark of the previous pass.
    pub fn last_crawl(&self) -> DateTime<Utc> {
        self.last_crawl
    }

    /// Run until `cancel` fires. Errors never end the loop.
    pub async fn run(mut self, cancel: CancellationToken) {
        info!("Endpoint monitor started");
        loop {
            let wait = match self.run_cycle().await {
                Ok(_) => self.settings.borrow().monitor_interval,
                Err(e) => {
                    let cooldown = self.settings.borrow().error_cooldown;
                    error!("Monitor iteration failed, retrying in {:?}: {}", cooldown, e);
                    cooldown
                }
            };
            if !sleep_or_cancelled(&cancel, wait).await {
                break;
            }
        }
        info!("Endpoint monitor stopped");
    }

    /// One wake of the loop: crawl the current submissions, if any.
    pub async fn run_cycle(&mut self) -> Result<CycleOutcome> {
        let snapshot = self.endpoints.get();
        if snapshot.is_empty() {
            return Ok(CycleOutcome::Idle);
        }

        info!("Monitor picked up {} endpoint(s)", snapshot.len());
        debug!("Endpoints: {:?}", snapshot);

        let settings = self.settings.borrow().clone();
        let crawler = crawler_for(&settings, Arc::clone(&self.whitelist))?;
        let pass = crawler.run_pass(&snapshot, self.last_crawl).await?;
        self.last_crawl = Utc::now();

        self.notify(&snapshot).await;

        self.planned.combine(snapshot.iter().cloned());
        // Only the crawled snapshot leaves; endpoints submitted during the pass stay queued.
        let removed = self.endpoints.remove_all(&snapshot);
        debug!(
            "Rotated {} endpoint(s) to planned; {} still pending",
            removed,
            self.endpoints.len()
        );

        Ok(CycleOutcome::Crawled(pass))
    }

    async fn notify(&self, endpoints: &[String]) {
        for endpoint in endpoints {
            let Some(domain) = domain_of(endpoint) else {
                warn!("No domain in {}, not notifying", endpoint);
                continue;
            };
            match self.notifier.publish(domain.as_str(), UPDATED).await {
                Ok(()) => debug!("Published {} on {}", UPDATED, domain),
                Err(e) => warn!("Failed to notify {}: {:#}", domain, e),
            }
        }
    }
}
