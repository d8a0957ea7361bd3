//! End-to-end API tests against a real server on an ephemeral port.
//!
//! Each test binds its own listener, wires the bound port back into the
//! config (so block-thread fan-out targets the right server), and drives the
//! HTTP surface with reqwest.

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde_json::Value;

use faultline::config::AppConfig;
use faultline::routes::create_router;
use faultline::state::AppState;

async fn start_server(max_workers: usize) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let mut config = AppConfig::default();
    config.http.host = "127.0.0.1".to_string();
    // Fan-out loops back to this server, so the config port must be real.
    config.http.port = addr.port();
    config.pool.max_workers = max_workers;
    config.heartbeat.enabled = false;

    let state = AppState::new(config);
    let app = create_router(state);
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    addr
}

async fn get_json(client: &reqwest::Client, url: &str) -> Value {
    client
        .get(url)
        .send()
        .await
        .expect("request failed")
        .json()
        .await
        .expect("invalid json")
}

/// Poll `url` until `condition` holds on the JSON body, or fail after `timeout`.
async fn wait_for_status<F>(client: &reqwest::Client, url: &str, condition: F, timeout: Duration)
where
    F: Fn(&Value) -> bool,
{
    let deadline = Instant::now() + timeout;
    loop {
        let body = get_json(client, url).await;
        if condition(&body) {
            return;
        }
        assert!(
            Instant::now() < deadline,
            "condition not reached within {:?}, last status: {}",
            timeout,
            body
        );
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn health_reports_service_identity() {
    let addr = start_server(5).await;
    let client = reqwest::Client::new();

    let response = client
        .get(format!("http://{}/api/test/health", addr))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    assert_eq!(
        response
            .headers()
            .get("cache-control")
            .and_then(|v| v.to_str().ok()),
        Some("no-store")
    );

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], "faultline");
    assert!(body["timestamp"].is_string());
}

#[tokio::test(flavor = "multi_thread")]
async fn uptime_reports_process_start() {
    let addr = start_server(5).await;
    let client = reqwest::Client::new();

    let body = get_json(&client, &format!("http://{}/api/test/uptime", addr)).await;

    let started: DateTime<Utc> = body["startedAt"].as_str().unwrap().parse().unwrap();
    let current: DateTime<Utc> = body["currentTime"].as_str().unwrap().parse().unwrap();
    assert!(started <= current);

    let uptime = body["uptime"].as_str().unwrap();
    assert_eq!(uptime.len(), 8);
    assert_eq!(uptime.matches(':').count(), 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn block_thread_exhausts_the_worker_pool() {
    let addr = start_server(3).await;
    let client = reqwest::Client::new();
    let status_url = format!("http://{}/api/test/thread-status", addr);

    // One external call; fan-out spawns the other two internally.
    let block = {
        let client = client.clone();
        let url = format!("http://{}/api/test/block-thread?seconds=2", addr);
        tokio::spawn(async move { client.post(&url).send().await.unwrap() })
    };

    // Mid-run: one holder, the rest of the pool queued behind the lock.
    wait_for_status(
        &client,
        &status_url,
        |s| {
            s["lockedThreads"] == 1
                && s["waitingThreads"] == 2
                && s["hasQueuedThreads"] == true
                && s["queueLength"] == 2
        },
        Duration::from_millis(1500),
    )
    .await;

    let snapshot = get_json(&client, &status_url).await;
    assert_eq!(snapshot["lockHeld"], true);
    assert_eq!(snapshot["lockedThreadNames"].as_array().unwrap().len(), 1);

    // The primary call completes normally.
    let response = block.await.unwrap();
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["internal"], false);
    assert_eq!(body["duration"], "2s");
    assert!(body["thread"].as_str().unwrap().starts_with("worker-"));

    // After all three sequential holds drain, everything is released.
    wait_for_status(
        &client,
        &status_url,
        |s| {
            s["lockedThreads"] == 0
                && s["waitingThreads"] == 0
                && s["lockHeld"] == false
                && s["hasQueuedThreads"] == false
                && s["queueLength"] == 0
        },
        Duration::from_secs(10),
    )
    .await;
}

#[tokio::test(flavor = "multi_thread")]
async fn internal_block_does_not_fan_out() {
    let addr = start_server(2).await;
    let client = reqwest::Client::new();
    let status_url = format!("http://{}/api/test/thread-status", addr);

    let block = {
        let client = client.clone();
        let url = format!("http://{}/api/test/block-thread?seconds=1&internal=true", addr);
        tokio::spawn(async move { client.post(&url).send().await.unwrap() })
    };

    wait_for_status(
        &client,
        &status_url,
        |s| s["lockedThreads"] == 1,
        Duration::from_millis(900),
    )
    .await;

    // No fan-out: nobody else ever queues for the lock.
    let snapshot = get_json(&client, &status_url).await;
    assert_eq!(snapshot["waitingThreads"], 0);
    assert_eq!(snapshot["hasQueuedThreads"], false);

    let body: Value = block.await.unwrap().json().await.unwrap();
    assert_eq!(body["internal"], true);
}

#[tokio::test(flavor = "multi_thread")]
async fn hang_stalls_without_touching_the_lock() {
    let addr = start_server(5).await;
    let client = reqwest::Client::new();
    let status_url = format!("http://{}/api/test/thread-status", addr);
    let before = Utc::now();

    let hang = {
        let client = client.clone();
        let url = format!("http://{}/api/test/hang?seconds=1", addr);
        tokio::spawn(async move { client.post(&url).send().await.unwrap() })
    };

    tokio::time::sleep(Duration::from_millis(300)).await;
    let snapshot = get_json(&client, &status_url).await;
    assert_eq!(snapshot["lockHeld"], false);
    assert_eq!(snapshot["waitingThreads"], 0);
    assert_eq!(snapshot["lockedThreads"], 0);

    let response = hang.await.unwrap();
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["duration"], "1s");

    let completed_at: DateTime<Utc> = body["completedAt"].as_str().unwrap().parse().unwrap();
    assert!(completed_at >= before + chrono::Duration::seconds(1));
}

#[tokio::test(flavor = "multi_thread")]
async fn cpu_intensive_reports_real_work() {
    let addr = start_server(5).await;
    let client = reqwest::Client::new();

    let started = Instant::now();
    let response = client
        .post(format!("http://{}/api/test/cpu-intensive?seconds=1", addr))
        .send()
        .await
        .unwrap();
    let elapsed = started.elapsed();

    assert_eq!(response.status(), 200);
    assert!(elapsed >= Duration::from_secs(1));
    assert!(elapsed < Duration::from_secs(3));

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["message"], "CPU intensive task completed");
    assert!(body["iterations"].as_u64().unwrap() > 0);
    assert!(body["resultChecksum"].is_u64());
    assert_eq!(body["duration"], "1s");
}

#[tokio::test(flavor = "multi_thread")]
async fn entity_crud_lifecycle() {
    let addr = start_server(5).await;
    let client = reqwest::Client::new();
    let base = format!("http://{}/api/entities", addr);

    // Create
    let response = client
        .post(&base)
        .json(&serde_json::json!({"name": "payment-service", "description": "demo"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 201);
    let created: Value = response.json().await.unwrap();
    let id = created["id"].as_u64().unwrap();
    assert_eq!(created["name"], "payment-service");

    // Read
    let fetched = get_json(&client, &format!("{}/{}", base, id)).await;
    assert_eq!(fetched, created);

    let all = get_json(&client, &base).await;
    assert_eq!(all.as_array().unwrap().len(), 1);

    // Update
    let response = client
        .put(format!("{}/{}", base, id))
        .json(&serde_json::json!({"name": "payment-gateway"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let updated: Value = response.json().await.unwrap();
    assert_eq!(updated["name"], "payment-gateway");
    assert!(updated["description"].is_null());

    // Search
    let matches = get_json(&client, &format!("{}/search?name=PAYMENT", base)).await;
    assert_eq!(matches.as_array().unwrap().len(), 1);
    let matches = get_json(&client, &format!("{}/search?name=missing", base)).await;
    assert!(matches.as_array().unwrap().is_empty());

    // Delete
    let response = client
        .delete(format!("{}/{}", base, id))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 204);

    // Gone: reads and writes now 404 with a JSON error body.
    let response = client
        .get(format!("{}/{}", base, id))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);
    let error: Value = response.json().await.unwrap();
    assert_eq!(error["status"], 404);
    assert!(error["error"].as_str().unwrap().contains("not found"));

    let response = client
        .delete(format!("{}/{}", base, id))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);

    let response = client
        .put(format!("{}/{}", base, id))
        .json(&serde_json::json!({"name": "ghost"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);
}
