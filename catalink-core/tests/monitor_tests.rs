// Tests for the endpoint monitor loop

use catalink_core::monitor::{CycleOutcome, EndpointMonitor};
use catalink_core::{
    ConfigSource, EndpointRegistry, PlannedEndpointRegistry, RecordingNotifier, Settings,
    initial_crawl_timestamp,
};
use catalink_scanner::{DomainOutcome, Whitelist, domain_of};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path},
};

struct Harness {
    endpoints: Arc<EndpointRegistry>,
    planned: Arc<PlannedEndpointRegistry>,
    notifier: Arc<RecordingNotifier>,
    config: ConfigSource,
}

impl Harness {
    fn new(store: &MockServer) -> Self {
        let settings = Settings::new(format!("{}/read", store.uri()), format!("{}/insert", store.uri()))
            .with_http_timeout(Duration::from_millis(500))
            .with_monitor_interval(Duration::from_millis(20))
            .with_error_cooldown(Duration::from_millis(20));
        Self {
            endpoints: Arc::new(EndpointRegistry::new()),
            planned: Arc::new(PlannedEndpointRegistry::new()),
            notifier: Arc::new(RecordingNotifier::new()),
            config: ConfigSource::fixed(settings),
        }
    }

    fn monitor(&self) -> EndpointMonitor {
        EndpointMonitor::new(
            Arc::clone(&self.endpoints),
            Arc::clone(&self.planned),
            Arc::new(Whitelist::default()),
            self.notifier.clone(),
            self.config.subscribe(),
            initial_crawl_timestamp(),
        )
    }
}

async fn graph_store() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/insert"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    server
}

fn dump_body(subject: &str) -> serde_json::Value {
    json!({ "results": { "bindings": [
        { "s": { "type": "uri", "value": subject },
          "p": { "type": "uri", "value": "http://purl.org/dc/terms/title" },
          "o": { "type": "literal", "value": "dataset" } }
    ] } })
}

async fn mount_metadata(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/api/metadata/last-modified"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "lastModifiedAt": "2024-05-01T00:00:00Z" })))
        .mount(server)
        .await;
}

async fn catalog() -> MockServer {
    let server = MockServer::start().await;
    mount_metadata(&server).await;
    Mock::given(method("POST"))
        .and(path("/api/sparql/query"))
        .respond_with(ResponseTemplate::new(200).set_body_json(dump_body("http://catalog/dataset/1")))
        .mount(&server)
        .await;
    server
}

/// A catalog whose first dump request outlives the client timeout.
async fn flaky_catalog() -> MockServer {
    let server = MockServer::start().await;
    mount_metadata(&server).await;
    Mock::given(method("POST"))
        .and(path("/api/sparql/query"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(dump_body("http://catalog/dataset/1"))
                .set_delay(Duration::from_secs(3)),
        )
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/sparql/query"))
        .respond_with(ResponseTemplate::new(200).set_body_json(dump_body("http://catalog/dataset/1")))
        .mount(&server)
        .await;
    server
}

async fn dump_requests(server: &MockServer) -> usize {
    server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|r| r.url.path() == "/api/sparql/query")
        .count()
}

// ============================================================================
// Single cycle
// ============================================================================

#[tokio::test]
async fn test_idle_when_nothing_submitted() {
    let store = graph_store().await;
    let harness = Harness::new(&store);
    let mut monitor = harness.monitor();

    let outcome = monitor.run_cycle().await.unwrap();
    assert!(matches!(outcome, CycleOutcome::Idle));
    assert_eq!(monitor.last_crawl(), initial_crawl_timestamp());
    assert_eq!(harness.notifier.publish_count(), 0);
}

#[tokio::test]
async fn test_cycle_rotates_endpoints_to_planned() {
    let store = graph_store().await;
    let x = catalog().await;
    let y = catalog().await;
    let harness = Harness::new(&store);
    harness.endpoints.combine([x.uri(), y.uri(), x.uri()]);

    let mut monitor = harness.monitor();
    let outcome = monitor.run_cycle().await.unwrap();

    let CycleOutcome::Crawled(pass) = outcome else {
        panic!("expected a crawl pass");
    };
    assert_eq!(pass.len(), 2);
    assert!(harness.endpoints.is_empty());

    let mut expected = vec![x.uri(), y.uri()];
    expected.sort();
    assert_eq!(harness.planned.get(), expected);
    assert!(monitor.last_crawl() > initial_crawl_timestamp());
}

#[tokio::test]
async fn test_cycle_publishes_updated_per_domain() {
    let store = graph_store().await;
    let x = catalog().await;
    let harness = Harness::new(&store);
    harness.endpoints.append(x.uri());

    let mut monitor = harness.monitor();
    monitor.run_cycle().await.unwrap();

    let published = harness.notifier.published();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].topic, domain_of(&x.uri()).unwrap().as_str());
    assert_eq!(published[0].message, "updated");
}

#[tokio::test]
async fn test_notifier_failure_does_not_fail_cycle() {
    let store = graph_store().await;
    let x = catalog().await;
    let harness = Harness::new(&store);
    harness.endpoints.append(x.uri());

    let mut monitor = EndpointMonitor::new(
        Arc::clone(&harness.endpoints),
        Arc::clone(&harness.planned),
        Arc::new(Whitelist::default()),
        Arc::new(RecordingNotifier::failing()),
        harness.config.subscribe(),
        initial_crawl_timestamp(),
    );
    assert!(monitor.run_cycle().await.is_ok());
    assert_eq!(harness.planned.len(), 1);
}

#[tokio::test]
async fn test_submission_during_pass_is_kept() {
    let store = graph_store().await;
    let x = MockServer::start().await;
    mount_metadata(&x).await;
    Mock::given(method("POST"))
        .and(path("/api/sparql/query"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(dump_body("http://catalog/dataset/1"))
                .set_delay(Duration::from_millis(200)),
        )
        .mount(&x)
        .await;
    let harness = Harness::new(&store);
    harness.endpoints.append(x.uri());

    let mut monitor = harness.monitor();
    let late = "http://late-submission/api/sparql/query";
    let endpoints = Arc::clone(&harness.endpoints);

    // Submitted while the dump request is in flight.
    let (result, _) = tokio::join!(monitor.run_cycle(), async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        endpoints.append(late);
    });
    result.unwrap();

    assert_eq!(harness.endpoints.get(), vec![late]);
    assert_eq!(harness.planned.get(), vec![x.uri()]);
}

#[tokio::test]
async fn test_failed_pass_keeps_endpoints_for_retry() {
    let store = graph_store().await;
    let x = flaky_catalog().await;
    let harness = Harness::new(&store);
    harness.endpoints.append(x.uri());

    let mut monitor = harness.monitor();
    assert!(monitor.run_cycle().await.is_err());
    assert_eq!(harness.endpoints.get(), vec![x.uri()]);
    assert!(harness.planned.is_empty());
    assert_eq!(harness.notifier.publish_count(), 0);
    assert_eq!(monitor.last_crawl(), initial_crawl_timestamp());

    let CycleOutcome::Crawled(pass) = monitor.run_cycle().await.unwrap() else {
        panic!("expected a crawl pass");
    };
    let domain = domain_of(&x.uri()).unwrap();
    assert_eq!(
        pass.outcome(&domain),
        Some(&DomainOutcome::Ingested { triples: 1, failed: 0 })
    );
    assert!(harness.endpoints.is_empty());
}

// ============================================================================
// Loop
// ============================================================================

#[tokio::test]
async fn test_loop_survives_failed_iteration() {
    let store = graph_store().await;
    let x = flaky_catalog().await;
    let harness = Harness::new(&store);
    harness.endpoints.append(x.uri());

    let cancel = CancellationToken::new();
    let handle = tokio::spawn(harness.monitor().run(cancel.clone()));

    let planned = Arc::clone(&harness.planned);
    tokio::time::timeout(Duration::from_secs(10), async {
        while planned.is_empty() {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("monitor never recovered from the failed pass");

    cancel.cancel();
    handle.await.unwrap();

    assert_eq!(dump_requests(&x).await, 2);
    assert!(harness.endpoints.is_empty());
    assert_eq!(harness.notifier.publish_count(), 1);
}

#[tokio::test]
async fn test_loop_stops_on_cancel() {
    let store = graph_store().await;
    let harness = Harness::new(&store);
    let cancel = CancellationToken::new();
    let handle = tokio::spawn(harness.monitor().run(cancel.clone()));

    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .expect("monitor did not stop")
        .unwrap();
}
