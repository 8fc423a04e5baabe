// Tests for the crawling scheduler loop

use catalink_core::{ConfigSource, CoreError, CrawlingScheduler, EndpointRegistry, PlannedEndpointRegistry, Settings};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn settings() -> Settings {
    Settings::new("http://store/read", "http://store/insert")
        .with_crawling_interval(Duration::from_millis(50))
        .with_error_cooldown(Duration::from_millis(20))
}

fn registries() -> (Arc<EndpointRegistry>, Arc<PlannedEndpointRegistry>) {
    (
        Arc::new(EndpointRegistry::new()),
        Arc::new(PlannedEndpointRegistry::new()),
    )
}

// ============================================================================
// Single cycle
// ============================================================================

#[test]
fn test_cycle_resubmits_planned_endpoints() {
    let (endpoints, planned) = registries();
    planned.combine(["http://x/api/sparql/query", "http://y/api/sparql/query"]);
    endpoints.append("http://x/api/sparql/query");

    let config = ConfigSource::fixed(settings());
    let scheduler = CrawlingScheduler::new(Arc::clone(&endpoints), Arc::clone(&planned), config.subscribe());

    let next = scheduler.run_cycle().unwrap();
    assert_eq!(next, Duration::from_millis(50));
    assert_eq!(
        endpoints.get(),
        vec!["http://x/api/sparql/query", "http://y/api/sparql/query"]
    );
    // Planned endpoints stay planned for every later cycle.
    assert_eq!(planned.len(), 2);
}

#[test]
fn test_cycle_with_nothing_planned() {
    let (endpoints, planned) = registries();
    let config = ConfigSource::fixed(settings());
    let scheduler = CrawlingScheduler::new(Arc::clone(&endpoints), planned, config.subscribe());

    assert!(scheduler.run_cycle().is_ok());
    assert!(endpoints.is_empty());
}

#[test]
fn test_cycle_reads_interval_after_reload() {
    let (endpoints, planned) = registries();
    let config = ConfigSource::fixed(settings());
    let scheduler = CrawlingScheduler::new(endpoints, planned, config.subscribe());

    config.replace(settings().with_crawling_interval(Duration::from_secs(7)));
    assert_eq!(scheduler.run_cycle().unwrap(), Duration::from_secs(7));
}

#[test]
fn test_zero_interval_is_cycle_error() {
    let (endpoints, planned) = registries();
    planned.append("http://x/api/sparql/query");
    let config = ConfigSource::fixed(settings().with_crawling_interval(Duration::ZERO));
    let scheduler = CrawlingScheduler::new(Arc::clone(&endpoints), planned, config.subscribe());

    let err = scheduler.run_cycle().unwrap_err();
    assert!(matches!(err, CoreError::ZeroInterval));
    // The merge happened before the interval was read.
    assert_eq!(endpoints.len(), 1);
}

// ============================================================================
// Loop
// ============================================================================

#[tokio::test]
async fn test_loop_waits_one_interval_before_first_resubmission() {
    let (endpoints, planned) = registries();
    planned.append("http://x/api/sparql/query");
    let config = ConfigSource::fixed(settings().with_crawling_interval(Duration::from_millis(300)));

    let cancel = CancellationToken::new();
    let scheduler = CrawlingScheduler::new(Arc::clone(&endpoints), planned, config.subscribe());
    let handle = tokio::spawn(scheduler.run(cancel.clone()));

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(endpoints.is_empty());

    tokio::time::timeout(Duration::from_secs(5), async {
        while endpoints.is_empty() {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("planned endpoint was never resubmitted");

    cancel.cancel();
    handle.await.unwrap();
}

#[tokio::test]
async fn test_loop_survives_zero_interval() {
    let (endpoints, planned) = registries();
    let config = ConfigSource::fixed(settings().with_crawling_interval(Duration::ZERO));

    let cancel = CancellationToken::new();
    let scheduler = CrawlingScheduler::new(Arc::clone(&endpoints), Arc::clone(&planned), config.subscribe());
    let handle = tokio::spawn(scheduler.run(cancel.clone()));

    // Each failed cycle backs off for the cooldown and tries again.
    tokio::time::sleep(Duration::from_millis(60)).await;
    planned.append("http://late/api/sparql/query");

    tokio::time::timeout(Duration::from_secs(5), async {
        while endpoints.is_empty() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("scheduler stopped after a failed cycle");

    assert!(!handle.is_finished());
    cancel.cancel();
    handle.await.unwrap();
}
