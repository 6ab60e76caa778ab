// Worker lifecycle and caching behavior against a live (mock) origin.

use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use voltpass::worker::cache::{CachedResponse, FetchError, FetchSource};
use voltpass::worker::{LifecycleState, NotificationDispatcher, WorkerMessage};

fn stale_response(body: &str) -> CachedResponse {
    CachedResponse {
        status: 200,
        content_type: Some("text/html".to_string()),
        body: body.as_bytes().to_vec(),
    }
}

async fn origin_with_pages() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_string("home"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/offline"))
        .respond_with(ResponseTemplate::new(200).set_body_string("offline page"))
        .mount(&server)
        .await;
    server
}

#[tokio::test]
async fn install_precaches_and_activate_purges_stale_versions() {
    let server = origin_with_pages().await;
    let mut worker = NotificationDispatcher::new(
        &server.uri(),
        "v2",
        vec!["/".to_string(), "/offline".to_string()],
    );
    assert_eq!(worker.state(), LifecycleState::Installing);

    // Leftovers from a previous worker version
    worker.cache().put("v1", "/", stale_response("old home")).await;
    worker
        .cache()
        .put("v1", "/about", stale_response("old about"))
        .await;

    worker.install().await.unwrap();
    assert_eq!(worker.state(), LifecycleState::Waiting);
    assert_eq!(worker.cache().entry_count("v2").await, 2);

    worker.activate().await;
    assert_eq!(worker.state(), LifecycleState::Controlling);

    // Old tag gone, current tag intact
    assert!(worker.cache().get("v1", "/").await.is_none());
    assert!(worker.cache().get("v1", "/about").await.is_none());
    let home = worker.cache().get("v2", "/").await.unwrap();
    assert_eq!(home.body, b"home");
}

#[tokio::test]
async fn skip_waiting_activates_a_waiting_worker() {
    let server = origin_with_pages().await;
    let mut worker = NotificationDispatcher::new(&server.uri(), "v3", vec!["/".to_string()]);
    worker.install().await.unwrap();
    assert_eq!(worker.state(), LifecycleState::Waiting);

    worker.handle_message(WorkerMessage::SkipWaiting).await;
    assert_eq!(worker.state(), LifecycleState::Controlling);
}

#[tokio::test]
async fn network_first_serves_live_then_falls_back_to_cache() {
    // Builder-created servers are not pooled: dropping one actually
    // closes the listener, which this test relies on.
    let server = MockServer::builder().start().await;
    Mock::given(method("GET"))
        .and(path("/stations"))
        .respond_with(ResponseTemplate::new(200).set_body_string("station list"))
        .mount(&server)
        .await;

    let worker = NotificationDispatcher::new(&server.uri(), "v1", vec![]);

    let live = worker.fetch_page("GET", "/stations").await.unwrap();
    assert_eq!(live.source, FetchSource::Network);
    assert_eq!(live.response.body, b"station list");

    // Origin goes away; the cached copy answers
    drop(server);
    let fallback = worker.fetch_page("GET", "/stations").await.unwrap();
    assert_eq!(fallback.source, FetchSource::Cache);
    assert_eq!(fallback.response.body, b"station list");

    // Never-fetched pages have nothing to fall back to
    let err = worker.fetch_page("GET", "/never-seen").await.unwrap_err();
    assert!(matches!(err, FetchError::Offline(_)));
}

#[tokio::test]
async fn api_requests_bypass_the_cache() {
    // Builder-created servers are not pooled: dropping one actually
    // closes the listener, which this test relies on.
    let server = MockServer::builder().start().await;
    Mock::given(method("GET"))
        .and(path("/api/stations/A7K2"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
        .mount(&server)
        .await;

    let worker = NotificationDispatcher::new(&server.uri(), "v1", vec![]);

    let live = worker.fetch_page("GET", "/api/stations/A7K2").await.unwrap();
    assert_eq!(live.source, FetchSource::Network);
    assert!(worker.cache().get("v1", "/api/stations/A7K2").await.is_none());

    // With the origin gone there is no fallback for bypassed requests
    drop(server);
    let err = worker
        .fetch_page("GET", "/api/stations/A7K2")
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::Network(_)));
}

#[tokio::test]
async fn non_read_methods_bypass_the_cache() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/submit"))
        .respond_with(ResponseTemplate::new(200).set_body_string("accepted"))
        .mount(&server)
        .await;

    let worker = NotificationDispatcher::new(&server.uri(), "v1", vec![]);

    let live = worker.fetch_page("POST", "/submit").await.unwrap();
    assert_eq!(live.source, FetchSource::Network);
    assert!(worker.cache().get("v1", "/submit").await.is_none());
}

#[tokio::test]
async fn failed_install_leaves_worker_in_installing_state() {
    let server = MockServer::start().await;
    // No mounts: every precache asset answers 404
    let mut worker = NotificationDispatcher::new(&server.uri(), "v1", vec!["/".to_string()]);

    assert!(worker.install().await.is_err());
    assert_eq!(worker.state(), LifecycleState::Installing);
}
