use std::time::{Duration, Instant};

use karar_client::config::DEFAULT_USER_AGENT;
use karar_core::{AppError, ClientEvent, ContentFetchResult};
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

use crate::common::{
    BASE_RETRY_DELAY, MIN_DELAY, content_success, error_envelope, search_success,
    setup_test_app,
};

#[tokio::test]
async fn search_sends_upstream_wire_format() {
    let app = setup_test_app().await;

    Mock::given(method("POST"))
        .and(path("/aramalist"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(search_success(&["1", "2", "3"], 42)),
        )
        .expect(1)
        .mount(&app.server)
        .await;

    let result = app.client.search("tazminat", 1, 17).await.unwrap();

    assert_eq!(result.decisions.len(), 3);
    assert_eq!(result.total_records, 42);
    assert_eq!(result.filtered_records, 42);

    let requests = app.server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];

    let body: serde_json::Value = request.body_json().unwrap();
    assert_eq!(
        body,
        json!({"data": {
            "aranan": "tazminat",
            "arananKelime": "tazminat",
            "pageSize": 10,
            "pageNumber": 1
        }})
    );

    let header = |name: &str| {
        request
            .headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    assert_eq!(
        header("accept").as_deref(),
        Some("application/json, text/plain, */*")
    );
    assert_eq!(header("user-agent").as_deref(), Some(DEFAULT_USER_AGENT));
    assert_eq!(header("content-type").as_deref(), Some("application/json"));
}

#[tokio::test]
async fn fetch_content_uses_query_parameter() {
    let app = setup_test_app().await;

    Mock::given(method("GET"))
        .and(path("/getDokuman"))
        .and(query_param("id", "12345"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(content_success("<b>T.C. YARGITAY</b>")),
        )
        .expect(1)
        .mount(&app.server)
        .await;

    let result = app.client.fetch_content("12345").await.unwrap();

    assert_eq!(
        result,
        ContentFetchResult::found("12345", "<b>T.C. YARGITAY</b>")
    );
}

#[tokio::test]
async fn rate_limited_fetch_is_retried_once() {
    let app = setup_test_app().await;

    Mock::given(method("GET"))
        .and(path("/getDokuman"))
        .respond_with(ResponseTemplate::new(429).set_body_string("Too Many Requests"))
        .up_to_n_times(1)
        .expect(1)
        .mount(&app.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/getDokuman"))
        .respond_with(ResponseTemplate::new(200).set_body_json(content_success("karar metni")))
        .expect(1)
        .mount(&app.server)
        .await;

    let start = Instant::now();
    let result = app.client.fetch_content("12345").await.unwrap();

    assert!(result.found);
    assert_eq!(result.content, "karar metni");
    assert!(start.elapsed() >= BASE_RETRY_DELAY);

    let backoffs: Vec<_> = app
        .reporter
        .events()
        .into_iter()
        .filter_map(|e| match e {
            ClientEvent::RateLimited {
                slept, next_delay, ..
            } => Some((slept, next_delay)),
            _ => None,
        })
        .collect();
    assert_eq!(backoffs, vec![(BASE_RETRY_DELAY, BASE_RETRY_DELAY * 2)]);
    assert_eq!(
        app.client.governor().current_retry_delay().await,
        BASE_RETRY_DELAY
    );
}

#[tokio::test]
async fn error_envelope_yields_empty_result() {
    let app = setup_test_app().await;

    Mock::given(method("POST"))
        .and(path("/aramalist"))
        .respond_with(ResponseTemplate::new(200).set_body_json(error_envelope("Hatalı istek")))
        .mount(&app.server)
        .await;

    let result = app.client.search("tazminat", 1, 10).await.unwrap();

    assert!(result.decisions.is_empty());
    assert_eq!(result.total_records, 0);
    assert_eq!(result.filtered_records, 0);
    assert!(app.reporter.events().iter().any(|e| matches!(
        e,
        ClientEvent::UpstreamError { message, .. } if message == "Hatalı istek"
    )));
}

#[tokio::test]
async fn server_error_is_not_retried() {
    let app = setup_test_app().await;

    Mock::given(method("POST"))
        .and(path("/aramalist"))
        .respond_with(ResponseTemplate::new(500).set_body_string("<html>Internal Error</html>"))
        .expect(1)
        .mount(&app.server)
        .await;

    let result = app.client.search("tazminat", 1, 10).await.unwrap();

    assert!(result.is_empty());
    assert!(matches!(
        app.reporter.events_without_pacing().as_slice(),
        [ClientEvent::TransportError { .. }]
    ));
}

#[tokio::test]
async fn slow_upstream_is_a_transport_error() {
    let app = setup_test_app().await;

    Mock::given(method("GET"))
        .and(path("/getDokuman"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(content_success("late"))
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&app.server)
        .await;

    let result = app.client.fetch_content("1").await.unwrap();

    assert_eq!(result, ContentFetchResult::not_found("1"));
}

#[tokio::test]
async fn caller_deadline_times_out() {
    let app = setup_test_app().await;

    Mock::given(method("POST"))
        .and(path("/aramalist"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&app.server)
        .await;

    let err = app
        .client
        .search_within(Duration::from_millis(50), "tazminat", 1, 10)
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Timeout(_)));
}

#[tokio::test]
async fn search_with_content_fetches_each_decision_in_order() {
    let app = setup_test_app().await;

    Mock::given(method("POST"))
        .and(path("/aramalist"))
        .respond_with(ResponseTemplate::new(200).set_body_json(search_success(&["10", "20"], 2)))
        .expect(1)
        .mount(&app.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/getDokuman"))
        .and(query_param("id", "10"))
        .respond_with(ResponseTemplate::new(200).set_body_json(content_success("on")))
        .expect(1)
        .mount(&app.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/getDokuman"))
        .and(query_param("id", "20"))
        .respond_with(ResponseTemplate::new(200).set_body_json(content_success("yirmi")))
        .expect(1)
        .mount(&app.server)
        .await;

    let start = Instant::now();
    let result = app
        .client
        .search_with_content("tazminat", 1, 10)
        .await
        .unwrap();

    assert_eq!(result.decisions[0]["document_content"], "on");
    assert_eq!(result.decisions[1]["document_content"], "yirmi");
    // Three dispatches through one gate: at least two pacing gaps.
    assert!(start.elapsed() >= MIN_DELAY * 2);

    let requests = app.server.received_requests().await.unwrap();
    let order: Vec<_> = requests
        .iter()
        .map(|r| r.url.query().unwrap_or_default().to_string())
        .collect();
    assert_eq!(order, vec!["", "id=10", "id=20"]);
}
