//! Batch artifact refresh against a local stand-in for the render service.

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use axum::Router;
use axum::extract::{Path as UrlPath, RawQuery};
use axum::http::StatusCode;
use axum::routing::get;

use mcwl_backend::assets::{self, AssetCache, AssetKind};
use mcwl_backend::config::Config;
use mcwl_backend::fetch::{Fetcher, RetryPolicy};
use mcwl_store::AssetLedger;

/// Render service stand-in: head renders echo the uuid as the body, the
/// uuid "missing" answers 404, and every hit is counted.
fn mock_render() -> (Router, Arc<AtomicUsize>) {
    let hits = Arc::new(AtomicUsize::new(0));
    let head_hits = hits.clone();
    let body_hits = hits.clone();
    let app = Router::new()
        .route(
            "/renders/head/{uuid}",
            get(move |UrlPath(uuid): UrlPath<String>, RawQuery(query): RawQuery| {
                let hits = head_hits.clone();
                async move {
                    hits.fetch_add(1, Ordering::SeqCst);
                    // The avatar request carries the pixel size and overlay flag.
                    assert_eq!(query.as_deref(), Some("size=64&overlay"));
                    if uuid == "missing" {
                        (StatusCode::NOT_FOUND, String::new())
                    } else {
                        (StatusCode::OK, format!("head:{uuid}"))
                    }
                }
            }),
        )
        .route(
            "/renders/body/{uuid}",
            get(move |UrlPath(uuid): UrlPath<String>| {
                let hits = body_hits.clone();
                async move {
                    hits.fetch_add(1, Ordering::SeqCst);
                    (StatusCode::OK, format!("body:{uuid}"))
                }
            }),
        );
    (app, hits)
}

async fn spawn_server(app: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn test_config(addr: SocketAddr, data_dir: &Path) -> Config {
    Config {
        render_base_url: format!("http://{addr}"),
        data_dir: data_dir.to_path_buf(),
        retries: 0,
        request_timeout: Duration::from_secs(2),
        stagger_delay_min: Duration::from_millis(1),
        stagger_delay_max: Duration::from_millis(2),
        ..Config::default()
    }
}

fn fetcher(config: &Config) -> Fetcher {
    Fetcher::new(RetryPolicy::from_config(config)).unwrap()
}

fn ids(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

#[tokio::test]
async fn batch_downloads_all_stale_artifacts() {
    let (app, hits) = mock_render();
    let addr = spawn_server(app).await;
    let tmp = tempfile::tempdir().unwrap();
    let config = test_config(addr, tmp.path());
    let mut cache = AssetCache::open(AssetKind::Avatar, &config);
    let uuids = ids(&["id1", "id2", "id3"]);

    let available = cache.ensure_fresh(&fetcher(&config), &uuids).await;

    assert_eq!(available, vec![true, true, true]);
    assert_eq!(hits.load(Ordering::SeqCst), 3);
    for uuid in ["id1", "id2", "id3"] {
        let body = std::fs::read(cache.artifact_path(uuid)).unwrap();
        assert_eq!(body, format!("head:{uuid}").into_bytes());
    }

    // The ledger was persisted with today's date for every uuid.
    let ledger = AssetLedger::load(&tmp.path().join("avatar_cache.json")).unwrap();
    let today = chrono::Local::now().date_naive();
    assert!(ledger.is_current("id1", today));
    assert!(ledger.is_current("id3", today));
}

#[tokio::test]
async fn fresh_artifacts_are_not_refetched() {
    let (app, hits) = mock_render();
    let addr = spawn_server(app).await;
    let tmp = tempfile::tempdir().unwrap();
    let config = test_config(addr, tmp.path());
    let mut cache = AssetCache::open(AssetKind::Avatar, &config);
    let uuids = ids(&["id1", "id2"]);
    let fetcher = fetcher(&config);

    cache.ensure_fresh(&fetcher, &uuids).await;
    let after_first = hits.load(Ordering::SeqCst);

    // Everything is fresh now; the second batch issues no requests.
    let available = cache.ensure_fresh(&fetcher, &uuids).await;
    assert_eq!(available, vec![true, true]);
    assert_eq!(hits.load(Ordering::SeqCst), after_first);
}

#[tokio::test]
async fn deleted_artifact_triggers_redownload_despite_current_ledger() {
    let (app, hits) = mock_render();
    let addr = spawn_server(app).await;
    let tmp = tempfile::tempdir().unwrap();
    let config = test_config(addr, tmp.path());
    let mut cache = AssetCache::open(AssetKind::Avatar, &config);
    let uuids = ids(&["id1"]);
    let fetcher = fetcher(&config);

    cache.ensure_fresh(&fetcher, &uuids).await;
    std::fs::remove_file(cache.artifact_path("id1")).unwrap();

    let available = cache.ensure_fresh(&fetcher, &uuids).await;
    assert_eq!(available, vec![true]);
    assert_eq!(hits.load(Ordering::SeqCst), 2);
    assert!(cache.artifact_path("id1").exists());
}

#[tokio::test]
async fn failed_download_is_skipped_not_fatal() {
    let (app, _) = mock_render();
    let addr = spawn_server(app).await;
    let tmp = tempfile::tempdir().unwrap();
    let config = test_config(addr, tmp.path());
    let mut cache = AssetCache::open(AssetKind::Avatar, &config);
    let uuids = ids(&["id1", "missing", "id2"]);

    let available = cache.ensure_fresh(&fetcher(&config), &uuids).await;

    // The failed uuid is simply unavailable this cycle; flags keep input
    // order and the others are unaffected.
    assert_eq!(available, vec![true, false, true]);
    assert!(!cache.artifact_path("missing").exists());

    let ledger = AssetLedger::load(&tmp.path().join("avatar_cache.json")).unwrap();
    assert_eq!(ledger.last_refresh("missing"), None);
}

#[tokio::test]
async fn stale_artifact_is_replaced_in_place_without_temp_leftovers() {
    let (app, _) = mock_render();
    let addr = spawn_server(app).await;
    let tmp = tempfile::tempdir().unwrap();
    let config = test_config(addr, tmp.path());
    let mut cache = AssetCache::open(AssetKind::Avatar, &config);
    let uuids = ids(&["id1"]);

    // Yesterday's artifact is on disk; the batch must replace it whole.
    std::fs::write(cache.artifact_path("id1"), b"stale bytes").unwrap();

    let available = cache.ensure_fresh(&fetcher(&config), &uuids).await;

    assert_eq!(available, vec![true]);
    assert_eq!(
        std::fs::read(cache.artifact_path("id1")).unwrap(),
        b"head:id1"
    );
    // The write staged through a sibling temp file that is gone afterwards.
    assert!(!tmp.path().join("avatars/id1.tmp").exists());
}

#[tokio::test]
async fn background_refresh_is_best_effort() {
    let app = Router::new().route("/ok", get(|| async { "scenery" })).route(
        "/broken",
        get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "") }),
    );
    let addr = spawn_server(app).await;
    let tmp = tempfile::tempdir().unwrap();
    let config = test_config(addr, tmp.path());
    let fetcher = fetcher(&config);
    let path = tmp.path().join("background.jpg");

    assets::refresh_background(&fetcher, &format!("http://{addr}/ok"), &path).await;
    assert_eq!(std::fs::read(&path).unwrap(), b"scenery");

    // A failed refresh is swallowed and the previous image survives.
    assets::refresh_background(&fetcher, &format!("http://{addr}/broken"), &path).await;
    assert_eq!(std::fs::read(&path).unwrap(), b"scenery");
}

#[tokio::test]
async fn skins_use_the_body_render_endpoint() {
    let (app, _) = mock_render();
    let addr = spawn_server(app).await;
    let tmp = tempfile::tempdir().unwrap();
    let config = test_config(addr, tmp.path());
    let mut cache = AssetCache::open(AssetKind::Skin, &config);
    let uuids = ids(&["id1"]);

    let available = cache.ensure_fresh(&fetcher(&config), &uuids).await;

    assert_eq!(available, vec![true]);
    let body = std::fs::read(cache.artifact_path("id1")).unwrap();
    assert_eq!(body, b"body:id1");
    assert!(tmp.path().join("skin_cache.json").exists());
    assert!(tmp.path().join("skins/id1.png").exists());
}
