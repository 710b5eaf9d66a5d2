//! Integration tests for the offline queue using wiremock and a real
//! on-disk store: the full offline -> queue -> reconnect -> drain path
//! with the actual HTTP client as the fetcher.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use tokio::sync::watch;

use skycast_offline::{
    AppEvent, LogNotifier, OfflineQueue, QueuedRequest, RecentSearches, SharedStore,
    KEY_PENDING_REQUESTS,
};
use skycast_weather::WeatherClient;

use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn city_body(name: &str) -> serde_json::Value {
    serde_json::json!({
        "location": {
            "name": name, "region": "", "country": "Testland",
            "lat": 10.0, "lon": 20.0
        },
        "current": {
            "temp_c": 21.0, "temp_f": 69.8,
            "condition": {"text": "Sunny", "icon": "", "code": 1000},
            "humidity": 40, "pressure_mb": 1012.0, "vis_km": 10.0
        }
    })
}

async fn mock_city(server: &MockServer, name: &str) {
    Mock::given(method("GET"))
        .and(path("/v1/current.json"))
        .and(query_param("q", name))
        .respond_with(ResponseTemplate::new(200).set_body_json(city_body(name)))
        .mount(server)
        .await;
}

#[tokio::test]
async fn offline_searches_replay_in_order_after_reconnect() {
    let server = MockServer::start().await;
    mock_city(&server, "Paris").await;
    mock_city(&server, "Tokyo").await;

    let dir = tempfile::tempdir().unwrap();
    let store = SharedStore::open(dir.path().join("store.db")).unwrap();
    let client = WeatherClient::new(&server.uri(), "test_key").unwrap();
    let (online_tx, online_rx) = watch::channel(false);

    let queue = Arc::new(
        OfflineQueue::new(
            store.clone(),
            Arc::new(client),
            Arc::new(LogNotifier::new(false)),
            online_rx,
        )
        .unwrap(),
    );
    let mut events = queue.subscribe();

    // Two searches while offline accumulate
    queue.queue_request("Paris").unwrap();
    queue.queue_request("Tokyo").unwrap();
    assert_eq!(queue.pending_count(), 2);

    // Back online: the drain clears the queue in FIFO order
    online_tx.send(true).unwrap();
    let outcome = queue.process_pending().await.unwrap();
    assert_eq!(outcome.succeeded, 2);
    assert_eq!(queue.pending_count(), 0);

    let AppEvent::WeatherReceived { request, report, .. } = events.try_recv().unwrap();
    assert_eq!(request.city_name, "Paris");
    assert_eq!(report.location.name, "Paris");
    let AppEvent::WeatherReceived { request, .. } = events.try_recv().unwrap();
    assert_eq!(request.city_name, "Tokyo");

    // Store agrees
    let stored: Vec<QueuedRequest> = store.get_list(KEY_PENDING_REQUESTS).unwrap();
    assert!(stored.is_empty());
}

#[tokio::test]
async fn failed_lookup_stays_queued_across_restart() {
    let server = MockServer::start().await;
    mock_city(&server, "Paris").await;
    // "Ghosttown" has no mock: requests for it return 404

    let dir = tempfile::tempdir().unwrap();
    let store = SharedStore::open(dir.path().join("store.db")).unwrap();
    let (online_tx, online_rx) = watch::channel(false);

    {
        let client = WeatherClient::new(&server.uri(), "test_key").unwrap();
        let queue = Arc::new(
            OfflineQueue::new(
                store.clone(),
                Arc::new(client),
                Arc::new(LogNotifier::new(false)),
                online_rx,
            )
            .unwrap(),
        );

        queue.queue_request("Paris").unwrap();
        queue.queue_request("Ghosttown").unwrap();

        online_tx.send(true).unwrap();
        let outcome = queue.process_pending().await.unwrap();
        assert_eq!(outcome.succeeded, 1);
        assert_eq!(outcome.requeued, 1);
    }

    // A fresh process sees only the failed request
    let (_tx2, online_rx2) = watch::channel(false);
    let client = WeatherClient::new(&server.uri(), "test_key").unwrap();
    let queue = OfflineQueue::new(
        store,
        Arc::new(client),
        Arc::new(LogNotifier::new(false)),
        online_rx2,
    )
    .unwrap();
    assert_eq!(queue.pending_count(), 1);
    assert_eq!(queue.pending()[0].city_name, "Ghosttown");
}

#[tokio::test]
async fn recent_searches_share_the_store_with_the_queue() {
    let dir = tempfile::tempdir().unwrap();
    let store = SharedStore::open(dir.path().join("store.db")).unwrap();

    let recent = RecentSearches::new(store.clone());
    recent.record("Paris").unwrap();
    recent.record("Tokyo").unwrap();

    // Reopening the same file sees both keys independently
    drop(recent);
    let reopened = RecentSearches::new(store);
    assert_eq!(reopened.list().unwrap(), vec!["Tokyo", "Paris"]);
}
