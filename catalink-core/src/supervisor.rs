use crate::config::Settings;
use crate::monitor::EndpointMonitor;
use crate::notify::Notifier;
use crate::registry::{EndpointRegistry, PlannedEndpointRegistry};
use crate::scheduler::CrawlingScheduler;
use catalink_scanner::Whitelist;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// 1990-01-01T00:00:00Z: every catalog counts as modified on the first pass.
pub fn initial_crawl_timestamp() -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(631_152_000, 0).unwrap_or_default()
}

/// Owns the endpoint monitor and the crawling scheduler.
pub struct CrawlSupervisor {
    endpoints: Arc<EndpointRegistry>,
    planned: Arc<PlannedEndpointRegistry>,
    whitelist: Arc<Whitelist>,
    notifier: Arc<dyn Notifier>,
    settings: watch::Receiver<Settings>,
    cancel: CancellationToken,
    handles: Vec<JoinHandle<()>>,
}

impl CrawlSupervisor {
    pub fn new(
        whitelist: Arc<Whitelist>,
        notifier: Arc<dyn Notifier>,
        settings: watch::Receiver<Settings>,
    ) -> Self {
        Self {
            endpoints: Arc::new(EndpointRegistry::new()),
            planned: Arc::new(PlannedEndpointRegistry::new()),
            whitelist,
            notifier,
            settings,
            cancel: CancellationToken::new(),
            handles: Vec::new(),
        }
    }

    /// Where external callers submit endpoints.
    pub fn endpoints(&self) -> Arc<EndpointRegistry> {
        Arc::clone(&self.endpoints)
    }

    pub fn planned(&self) -> Arc<PlannedEndpointRegistry> {
        Arc::clone(&self.planned)
    }

    pub fn is_running(&self) -> bool {
        !self.handles.is_empty() && !self.cancel.is_cancelled()
    }

    /// Spawn both loops. Calling this twice is a no-op.
    pub fn start(&mut self) {
        if !self.handles.is_empty() {
            return;
        }

        let monitor = EndpointMonitor::new(
            Arc::clone(&self.endpoints),
            Arc::clone(&self.planned),
            Arc::clone(&self.whitelist),
            Arc::clone(&self.notifier),
            self.settings.clone(),
            initial_crawl_timestamp(),
        );
        let scheduler = CrawlingScheduler::new(
            Arc::clone(&self.endpoints),
            Arc::clone(&self.planned),
            self.settings.clone(),
        );

        self.handles.push(tokio::spawn(monitor.run(self.cancel.child_token())));
        self.handles.push(tokio::spawn(scheduler.run(self.cancel.child_token())));
        info!(
            "Crawling started with {} whitelisted domain(s)",
            self.whitelist.len()
        );
    }

    /// Wait for both loops to finish.
    pub async fn wait(&mut self) {
        for handle in self.handles.drain(..) {
            if let Err(e) = handle.await {
                error!("Crawl loop ended abnormally: {}", e);
            }
        }
    }

    /// Cancel both loops and wait for them.
    pub async fn shutdown(&mut self) {
        info!("Stopping crawling");
        self.cancel.cancel();
        self.wait().await;
    }
}
