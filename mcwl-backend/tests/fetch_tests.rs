//! Retry behaviour of the fetcher against a local HTTP server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use axum::Router;
use axum::http::StatusCode;
use axum::routing::get;
use mcwl_backend::fetch::{FetchError, Fetcher, RetryPolicy};

async fn spawn_server(app: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn fast_policy(retries: u32) -> RetryPolicy {
    RetryPolicy {
        timeout: Duration::from_secs(2),
        retries,
        base_delay: Duration::from_millis(10),
        backoff_factor: 2.0,
        ..RetryPolicy::default()
    }
}

/// Handler that replies 503 for the first `failures` requests, then 200.
fn flaky(failures: usize) -> (Router, Arc<AtomicUsize>) {
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();
    let app = Router::new().route(
        "/",
        get(move || {
            let counter = counter.clone();
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) < failures {
                    (StatusCode::SERVICE_UNAVAILABLE, "down")
                } else {
                    (StatusCode::OK, "up")
                }
            }
        }),
    );
    (app, hits)
}

#[tokio::test]
async fn recovers_after_retryable_statuses() {
    // GIVEN: a server that answers 503 twice, then 200
    let (app, hits) = flaky(2);
    let addr = spawn_server(app).await;
    let fetcher = Fetcher::new(fast_policy(2)).unwrap();

    // WHEN: fetching with retries = 2
    let started = Instant::now();
    let response = fetcher.get(&format!("http://{addr}/")).await.unwrap();

    // THEN: the third attempt's 200 comes back, after two backoff delays
    // of base and base x factor (10ms + 20ms)
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.text().await.unwrap(), "up");
    assert_eq!(hits.load(Ordering::SeqCst), 3);
    assert!(started.elapsed() >= Duration::from_millis(30));
}

#[tokio::test]
async fn returns_last_response_when_attempts_run_out() {
    // 503 forever, retries = 1: both attempts consumed, last response
    // surfaces as a normal non-ok response rather than an error.
    let (app, hits) = flaky(usize::MAX);
    let addr = spawn_server(app).await;
    let fetcher = Fetcher::new(fast_policy(1)).unwrap();

    let response = fetcher.get(&format!("http://{addr}/")).await.unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(hits.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn unauthorized_is_returned_without_retry() {
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();
    let app = Router::new().route(
        "/",
        get(move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                (StatusCode::UNAUTHORIZED, "bad token")
            }
        }),
    );
    let addr = spawn_server(app).await;
    let fetcher = Fetcher::new(fast_policy(3)).unwrap();

    let response = fetcher.get(&format!("http://{addr}/")).await.unwrap();

    // 401 is handed back as-is so the caller can tell bad credentials
    // apart from a dead server; zero retries were performed.
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn per_attempt_timeout_is_a_retryable_failure() {
    let app = Router::new().route(
        "/",
        get(|| async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            "too late"
        }),
    );
    let addr = spawn_server(app).await;
    let policy = RetryPolicy {
        timeout: Duration::from_millis(50),
        retries: 1,
        base_delay: Duration::from_millis(5),
        ..RetryPolicy::default()
    };
    let fetcher = Fetcher::new(policy).unwrap();

    let err = fetcher.get(&format!("http://{addr}/")).await.unwrap_err();
    assert!(matches!(err, FetchError::Timeout(_)));
}

#[tokio::test]
async fn connection_refused_exhausts_into_transport_error() {
    // Bind then immediately drop the listener so the port refuses.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let fetcher = Fetcher::new(fast_policy(1)).unwrap();
    let err = fetcher.get(&format!("http://{addr}/")).await.unwrap_err();
    assert!(matches!(err, FetchError::Transport(_)));
}

#[tokio::test]
async fn per_call_policy_overrides_the_default() {
    let (app, hits) = flaky(usize::MAX);
    let addr = spawn_server(app).await;
    let fetcher = Fetcher::new(fast_policy(5)).unwrap();

    // Zero-retry override: a single attempt, non-ok response returned.
    let no_retry = RetryPolicy {
        retries: 0,
        ..fast_policy(0)
    };
    let request = fetcher.client().get(format!("http://{addr}/"));
    let response = fetcher.execute_with(request, &no_retry).await.unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}
