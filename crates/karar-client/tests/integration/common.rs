use std::sync::Arc;
use std::time::Duration;

use karar_client::{ClientConfig, ReqwestTransport};
use karar_core::governor::GovernorConfig;
use karar_core::testutil::RecordingReporter;
use karar_core::{DecisionClient, RateGovernor};
use serde_json::json;
use wiremock::MockServer;

pub const MIN_DELAY: Duration = Duration::from_millis(50);
pub const BASE_RETRY_DELAY: Duration = Duration::from_millis(100);

pub type TestClient = DecisionClient<ReqwestTransport, Arc<RecordingReporter>>;

pub struct TestApp {
    pub server: MockServer,
    pub client: TestClient,
    pub reporter: Arc<RecordingReporter>,
}

/// Start a mock upstream and a client with short, jitter-free delays.
pub async fn setup_test_app() -> TestApp {
    let server = MockServer::start().await;

    let governor = GovernorConfig::default()
        .with_min_delay(MIN_DELAY)
        .with_max_delay(Duration::from_millis(200))
        .with_jitter(Duration::ZERO)
        .with_base_retry_delay(BASE_RETRY_DELAY);
    let config = ClientConfig::default()
        .with_base_url(server.uri())
        .with_request_timeout(Duration::from_secs(2))
        .with_governor(governor.clone());

    let transport = ReqwestTransport::from_config(&config).expect("transport");
    let reporter = Arc::new(RecordingReporter::new());
    let client =
        DecisionClient::with_reporter(transport, RateGovernor::new(governor), reporter.clone());

    TestApp {
        server,
        client,
        reporter,
    }
}

pub fn search_success(ids: &[&str], total: u64) -> serde_json::Value {
    let decisions: Vec<_> = ids
        .iter()
        .map(|id| json!({"id": id, "daire": "4. Hukuk Dairesi", "esasNo": "2023/1234"}))
        .collect();
    json!({"data": {"data": decisions, "recordsTotal": total}})
}

pub fn content_success(content: &str) -> serde_json::Value {
    json!({"metadata": {"FMTY": "SUCCESS"}, "data": content})
}

pub fn error_envelope(message: &str) -> serde_json::Value {
    json!({"metadata": {"FMTY": "ERROR", "FMTE": message}})
}
