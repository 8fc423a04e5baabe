pub mod config;
pub mod error;
pub mod monitor;
pub mod notify;
pub mod registry;
pub mod scheduler;
pub mod supervisor;

pub use config::{ConfigSource, Settings};
pub use error::CoreError;
pub use monitor::{CycleOutcome, EndpointMonitor};
pub use notify::{LogNotifier, NatsNotifier, Notifier, RecordingNotifier, notifier_for};
pub use registry::{EndpointRegistry, PlannedEndpointRegistry};
pub use scheduler::CrawlingScheduler;
pub use supervisor::{CrawlSupervisor, initial_crawl_timestamp};

use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Sleep for `duration` unless cancelled first. Returns false on cancellation.
pub(crate) async fn sleep_or_cancelled(cancel: &CancellationToken, duration: Duration) -> bool {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(duration) => true,
    }
}
