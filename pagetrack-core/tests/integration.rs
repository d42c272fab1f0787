//! Integration tests: the tracking agent against a live ingestion endpoint
//!
//! Each test binds a local server backed by an in-memory database and
//! drives an `EventTracker` over real HTTP.

use std::sync::Arc;
use std::time::Duration;

use pagetrack_core::config::{ServerConfig, TrackerConfig};
use pagetrack_core::server::IngestServer;
use pagetrack_core::tracker::EventTracker;
use pagetrack_core::{Database, LifecycleSignal, PageContext, PendingCall};
use tokio::net::TcpListener;
use tokio::sync::oneshot;

struct TestServer {
    db: Arc<Database>,
    endpoint: String,
    _shutdown: oneshot::Sender<()>,
}

async fn start_server(listener: TcpListener) -> TestServer {
    pagetrack_core::logging::init_test();

    let db = Arc::new(Database::open_in_memory().expect("open db"));
    db.migrate().expect("migrate");

    let endpoint = format!("http://{}/track", listener.local_addr().unwrap());
    let (tx, rx) = oneshot::channel::<()>();
    let server = IngestServer::new(ServerConfig::default(), db.clone());
    tokio::spawn(async move {
        server
            .serve(listener, async {
                let _ = rx.await;
            })
            .await
            .expect("server failed");
    });

    TestServer {
        db,
        endpoint,
        _shutdown: tx,
    }
}

fn tracker_config(endpoint: &str) -> TrackerConfig {
    TrackerConfig {
        endpoint: endpoint.to_string(),
        retry_delay_ms: 200,
        timeout_secs: 5,
        ..Default::default()
    }
}

fn page() -> PageContext {
    PageContext::new("http://localhost:8080/1.html", "Integration")
}

/// Poll the database until it holds `expected` events or give up
async fn wait_for_count(db: &Database, expected: i64) -> i64 {
    let mut count = 0;
    for _ in 0..250 {
        count = db.count_events().expect("count");
        if count >= expected {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    count
}

#[tokio::test]
async fn test_batch_and_exit_beacon_reach_storage() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let server = start_server(listener).await;

    let tracker =
        EventTracker::connect(&tracker_config(&server.endpoint), page(), Vec::new()).unwrap();

    // First event goes out on its own, the next three form a full batch
    tracker.track("landing", ["campaign"]);
    assert_eq!(wait_for_count(&server.db, 1).await, 1);

    tracker.track("scroll", ["50%"]);
    tracker.track("click", ["cta", ""]);
    tracker.track("signup", Vec::<String>::new());
    assert_eq!(wait_for_count(&server.db, 4).await, 4);

    // Inside the cool-down a single event stays buffered until the page exits
    tracker.track("leave", ["footer"]);
    assert_eq!(tracker.controller().pending_count(), 1);
    assert!(tracker.on_lifecycle(LifecycleSignal::Hide));
    assert!(!tracker.on_lifecycle(LifecycleSignal::Unload));
    assert_eq!(wait_for_count(&server.db, 5).await, 5);

    let stored: Vec<_> = server
        .db
        .recent_events(10)
        .unwrap()
        .into_iter()
        .map(|s| s.event)
        .collect();
    let names: Vec<&str> = stored.iter().map(|e| e.event.as_str()).collect();
    assert_eq!(names, vec!["landing", "scroll", "click", "signup", "leave"]);
    assert_eq!(stored[2].tags, vec!["cta"]);
    assert_eq!(stored[0].url, "http://localhost:8080/1.html");
    assert_eq!(stored[0].title, "Integration");
}

#[tokio::test]
async fn test_failed_send_is_retried_once_endpoint_is_up() {
    // Reserve a port, then free it so the first send is refused
    let reserved = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = reserved.local_addr().unwrap();
    drop(reserved);
    let endpoint = format!("http://{}/track", address);

    let pending = vec![
        PendingCall::new("queued-1", vec![]),
        PendingCall::new("queued-2", vec!["x".into()]),
        PendingCall::new("queued-3", vec![]),
    ];
    let tracker = EventTracker::connect(&tracker_config(&endpoint), page(), pending).unwrap();

    // Let the first attempt fail
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(tracker.controller().stats().failures, 1);

    let listener = TcpListener::bind(address).await.unwrap();
    let server = start_server(listener).await;

    assert_eq!(wait_for_count(&server.db, 3).await, 3);
    let names: Vec<String> = server
        .db
        .recent_events(10)
        .unwrap()
        .into_iter()
        .map(|s| s.event.event)
        .collect();
    assert_eq!(names, vec!["queued-1", "queued-2", "queued-3"]);
}
