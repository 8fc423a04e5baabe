use crate::config::Settings;
use crate::error::{CoreError, Result};
use crate::registry::{EndpointRegistry, PlannedEndpointRegistry};
use crate::sleep_or_cancelled;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Periodically resubmits planned endpoints so they are crawled again.
pub struct CrawlingScheduler {
    endpoints: Arc<EndpointRegistry>,
    planned: Arc<PlannedEndpointRegistry>,
    settings: watch::Receiver<Settings>,
}

impl CrawlingScheduler {
    pub fn new(
        endpoints: Arc<EndpointRegistry>,
        planned: Arc<PlannedEndpointRegistry>,
        settings: watch::Receiver<Settings>,
    ) -> Self {
        Self {
            endpoints,
            planned,
            settings,
        }
    }

    /// Run until `cancel` fires. The first resubmission happens one full
    /// interval after start.
    pub async fn run(self, cancel: CancellationToken) {
        info!("Crawling scheduler started");
        let mut wait = self.settings.borrow().crawling_interval;
        loop {
            if !sleep_or_cancelled(&cancel, wait).await {
                break;
            }
            wait = match self.run_cycle() {
                Ok(interval) => interval,
                Err(e) => {
                    let cooldown = self.settings.borrow().error_cooldown;
                    error!("Scheduler iteration failed, retrying in {:?}: {}", cooldown, e);
                    cooldown
                }
            };
        }
        info!("Crawling scheduler stopped");
    }

    /// Merge planned endpoints back into the endpoint registry and return
    /// the interval to wait before the next cycle.
    pub fn run_cycle(&self) -> Result<Duration> {
        let planned = self.planned.get();
        let added = self.endpoints.combine(planned.iter().cloned());
        info!(
            "Scheduled {} planned endpoint(s) for crawling ({} new)",
            planned.len(),
            added
        );

        let interval = self.settings.borrow().crawling_interval;
        if interval.is_zero() {
            return Err(CoreError::ZeroInterval);
        }
        debug!("Next scheduling cycle in {:?}", interval);
        Ok(interval)
    }
}
