//! End-to-end runs against local axum servers.
//!
//! Each test binds throwaway servers on loopback that expose the same seven
//! endpoints as the demo API, then drives them through the real reqwest
//! client.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::{http::StatusCode, routing::get, Router};
use tokio::sync::watch;

use synthetic_load::{LoadRunner, TestConfig, UserConfig, WeightedTask};

/// Start a demo server and return its address and hit counter.
async fn spawn_demo_server() -> (SocketAddr, Arc<AtomicUsize>) {
    let hits = Arc::new(AtomicUsize::new(0));

    let counted = |status: StatusCode, hits: Arc<AtomicUsize>| {
        move || {
            let hits = hits.clone();
            async move {
                hits.fetch_add(1, Ordering::SeqCst);
                (status, "ok")
            }
        }
    };

    let app = Router::new()
        .route("/", get(counted(StatusCode::OK, hits.clone())))
        .route("/io_task", get(counted(StatusCode::OK, hits.clone())))
        .route("/cpu_task", get(counted(StatusCode::OK, hits.clone())))
        .route("/random_sleep", get(counted(StatusCode::OK, hits.clone())))
        .route("/random_status", get(counted(StatusCode::NOT_FOUND, hits.clone())))
        .route("/chain", get(counted(StatusCode::OK, hits.clone())))
        .route(
            "/error_test",
            get(counted(StatusCode::INTERNAL_SERVER_ERROR, hits.clone())),
        );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (addr, hits)
}

fn unused_addr() -> SocketAddr {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap()
}

#[tokio::test]
async fn test_sweep_hits_every_endpoint_on_every_server() {
    let mut servers = Vec::new();
    let mut counters = Vec::new();
    for _ in 0..3 {
        let (addr, hits) = spawn_demo_server().await;
        servers.push(addr.to_string());
        counters.push(hits);
    }

    let config = TestConfig {
        name: "live-sweep".to_string(),
        servers,
        virtual_users: 2,
        iterations: Some(2),
        pause_ms: 0,
        ..TestConfig::default()
    };
    config.validate().unwrap();

    let (_tx, rx) = watch::channel(false);
    let results = LoadRunner::new(config)
        .unwrap()
        .run_with_shutdown(rx)
        .await
        .unwrap();

    assert_eq!(results.iterations, 4);
    assert_eq!(results.total_requests, 84);
    for hits in &counters {
        assert_eq!(hits.load(Ordering::SeqCst), 28);
    }

    // Error statuses are counted, never retried or skipped
    assert_eq!(results.status_codes.get(&200), Some(&60));
    assert_eq!(results.status_codes.get(&404), Some(&12));
    assert_eq!(results.status_codes.get(&500), Some(&12));
    assert_eq!(results.failed_requests, 24);
    assert_eq!(results.transport_errors, 0);
}

#[tokio::test]
async fn test_unreachable_server_does_not_stop_sweep() {
    let (live, hits) = spawn_demo_server().await;
    let dead = unused_addr();

    let config = TestConfig {
        name: "half-down".to_string(),
        servers: vec![dead.to_string(), live.to_string()],
        iterations: Some(1),
        pause_ms: 0,
        request_timeout_secs: 5,
        ..TestConfig::default()
    };

    let (_tx, rx) = watch::channel(false);
    let results = LoadRunner::new(config)
        .unwrap()
        .run_with_shutdown(rx)
        .await
        .unwrap();

    assert_eq!(results.iterations, 1);
    assert_eq!(results.total_requests, 14);
    assert_eq!(results.transport_errors, 7);
    assert_eq!(hits.load(Ordering::SeqCst), 7);
}

#[tokio::test]
async fn test_weighted_user_only_requests_configured_tasks() {
    let (addr, hits) = spawn_demo_server().await;

    let config = TestConfig {
        name: "weighted".to_string(),
        servers: vec![addr.to_string()],
        iterations: Some(20),
        seed: Some(11),
        user: UserConfig::Weighted {
            tasks: vec![
                WeightedTask::new("/io_task", 1.0),
                WeightedTask::new("/error_test", 0.0),
            ],
            base_server: None,
            wait_min_ms: 0,
            wait_max_ms: 0,
        },
        ..TestConfig::default()
    };
    config.validate().unwrap();

    let (_tx, rx) = watch::channel(false);
    let results = LoadRunner::new(config)
        .unwrap()
        .run_with_shutdown(rx)
        .await
        .unwrap();

    assert_eq!(results.total_requests, 20);
    assert_eq!(hits.load(Ordering::SeqCst), 20);
    assert_eq!(results.endpoints.len(), 1);
    assert_eq!(results.endpoints[0].endpoint, "/io_task");
    assert_eq!(results.successful_requests, 20);
}

#[tokio::test]
async fn test_reported_latency_tracks_server_delay() {
    let app = Router::new().route(
        "/random_sleep",
        get(|| async {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            "slept"
        }),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let config = TestConfig {
        name: "slow".to_string(),
        servers: vec![addr.to_string()],
        endpoints: vec!["/random_sleep".to_string()],
        iterations: Some(5),
        pause_ms: 0,
        ..TestConfig::default()
    };

    let (_tx, rx) = watch::channel(false);
    let results = LoadRunner::new(config)
        .unwrap()
        .run_with_shutdown(rx)
        .await
        .unwrap();

    assert_eq!(results.successful_requests, 5);
    // min() reports the lowest value in its bucket, which can sit a few µs under
    assert!(results.latency_min >= 19.9, "min = {}", results.latency_min);
    assert!(results.latency_p50 >= 20.0, "p50 = {}", results.latency_p50);
    assert!(results.latency_max < 5_000.0, "max = {}", results.latency_max);
    assert!(results.endpoints[0].latency_p50 >= 20.0);
}
