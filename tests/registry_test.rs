//! Relay polling and registry reconciliation against a mock relay

use std::sync::Arc;
use std::time::Duration;

use bson::Bson;
use relaygate::db::{DeviceConfig, DeviceSettings};
use relaygate::registry::{ConnectionRegistry, RelayPoller};
use relaygate::relay::{RelayChannel, RelayClient};
use relaygate::worker::{Worker, WorkerFactory, WorkerLauncher, WorkerMode};
use relaygate::Result;
use tokio::sync::Notify;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Worker that runs until told to stop, or returns at once for "A"
struct TestWorker {
    origin: String,
    stop: Notify,
}

#[async_trait::async_trait]
impl Worker for TestWorker {
    fn origin(&self) -> &str {
        &self.origin
    }

    async fn run(&self) {
        if self.origin == "A" {
            return;
        }
        self.stop.notified().await;
    }

    fn request_stop(&self) {
        self.stop.notify_one();
    }
}

struct TestFactory;

#[async_trait::async_trait]
impl WorkerFactory for TestFactory {
    async fn create_worker(
        &self,
        origin: &str,
        _mode: WorkerMode,
        _channel: Arc<RelayChannel>,
    ) -> Result<Option<Arc<dyn Worker>>> {
        Ok(Some(Arc::new(TestWorker {
            origin: origin.to_string(),
            stop: Notify::new(),
        })))
    }
}

struct AllDevicesKnown;

#[async_trait::async_trait]
impl DeviceSettings for AllDevicesKnown {
    async fn find_device(&self, origin: &str) -> Result<Option<DeviceConfig>> {
        Ok(Some(DeviceConfig {
            origin: origin.to_string(),
            active: true,
        }))
    }

    async fn set_device_setting(&self, _: &str, _: &str, _: Bson) -> Result<bool> {
        Ok(true)
    }
}

async fn serve_devices(server: &MockServer, names: &[&str]) {
    server.reset().await;
    let devices: Vec<_> = names
        .iter()
        .map(|name| serde_json::json!({ "name": name }))
        .collect();
    Mock::given(method("GET"))
        .and(path("/devices"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({ "devices": devices })),
        )
        .mount(server)
        .await;
}

fn setup(server: &MockServer, interval: Duration) -> (Arc<ConnectionRegistry>, RelayPoller) {
    let relay = RelayClient::new(&server.uri(), Duration::from_secs(2)).unwrap();
    let launcher = WorkerLauncher::new(relay.clone(), Arc::new(TestFactory), Duration::from_secs(2));
    let registry = Arc::new(ConnectionRegistry::new(
        launcher,
        Arc::new(AllDevicesKnown),
        false,
    ));
    let poller = RelayPoller::new(relay, Arc::clone(&registry), interval);
    (registry, poller)
}

async fn wait_until_dead(registry: &ConnectionRegistry, origin: &str) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while registry
            .get_session(origin)
            .await
            .is_some_and(|info| info.alive)
        {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn test_reconcile_reaps_dead_and_adds_new() {
    let server = MockServer::start().await;
    let (registry, poller) = setup(&server, Duration::from_secs(60));

    serve_devices(&server, &["A", "B"]).await;
    let report = poller.tick().await.unwrap();
    assert_eq!(report.created, vec!["A", "B"]);

    wait_until_dead(&registry, "A").await;

    serve_devices(&server, &["B", "C"]).await;
    let report = poller.tick().await.unwrap();
    assert_eq!(report.reaped, vec!["A"]);
    assert_eq!(report.created, vec!["C"]);
    assert!(report.skipped.is_empty());
    assert_eq!(registry.list_origins().await, vec!["B", "C"]);

    registry.stop_all().await;
}

#[tokio::test]
async fn test_failed_poll_leaves_registry_untouched() {
    let server = MockServer::start().await;
    let (registry, poller) = setup(&server, Duration::from_secs(60));

    serve_devices(&server, &["B"]).await;
    poller.tick().await.unwrap();

    server.reset().await;
    Mock::given(method("GET"))
        .and(path("/devices"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    assert!(poller.tick().await.is_err());
    assert_eq!(registry.list_origins().await, vec!["B"]);

    registry.stop_all().await;
}

#[tokio::test]
async fn test_poller_shutdown_stops_workers() {
    let server = MockServer::start().await;
    serve_devices(&server, &["B", "C", "D"]).await;
    let (registry, poller) = setup(&server, Duration::from_millis(20));

    let handle = poller.spawn();
    tokio::time::timeout(Duration::from_secs(2), async {
        while registry.len().await < 3 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();

    tokio::time::timeout(Duration::from_secs(2), handle.shutdown())
        .await
        .unwrap();
    assert!(registry.is_empty().await);
}
