use std::time::Duration;
use voyocache::CacheSettings;
use voyocovers::{AssetError, CoverCache, CoverCacheConfigExt, CoverSettings};
use voyoid::SourceId;

const PNG_BYTES: &[u8] = b"\x89PNG\r\n\x1a\nfake";

fn create_test_cache(server_url: &str, capacity: Option<usize>) -> CoverCache {
    CoverCache::new(CoverSettings {
        cache: CacheSettings {
            ttl: Duration::from_secs(3600),
            capacity,
            sweep_interval: Duration::from_secs(60),
        },
        timeout: Duration::from_secs(2),
        url_template: format!("{}/vi/{{id}}/hqdefault.jpg", server_url),
    })
    .unwrap()
}

fn source(id: &str) -> SourceId {
    SourceId::parse(id).unwrap()
}

#[tokio::test]
async fn test_concurrent_requests_share_one_download() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/vi/dQw4w9WgXcQ/hqdefault.jpg")
        .with_status(200)
        .with_header("content-type", "image/png")
        .with_body(PNG_BYTES)
        .expect(1)
        .create_async()
        .await;

    let cache = std::sync::Arc::new(create_test_cache(&server.url(), Some(4)));
    let tasks: Vec<_> = (0..6)
        .map(|_| {
            let cache = cache.clone();
            tokio::spawn(async move { cache.get(&source("dQw4w9WgXcQ")).await })
        })
        .collect();

    for task in tasks {
        let art = task.await.unwrap().unwrap();
        assert_eq!(art.content_type, "image/png");
        assert_eq!(&art.bytes[..], PNG_BYTES);
    }

    // servi depuis le cache
    cache.get(&source("dQw4w9WgXcQ")).await.unwrap();
    mock.assert_async().await;
}

#[tokio::test]
async fn test_capacity_evicts_oldest_cover() {
    let mut server = mockito::Server::new_async().await;
    let _m = server
        .mock("GET", mockito::Matcher::Regex(r"^/vi/.+/hqdefault\.jpg$".to_string()))
        .with_status(200)
        .with_header("content-type", "image/jpeg")
        .with_body("jpeg")
        .create_async()
        .await;

    let cache = create_test_cache(&server.url(), Some(2));
    let ids = ["aaaaaaaaaaa", "bbbbbbbbbbb", "ccccccccccc"];
    for id in ids {
        cache.get(&source(id)).await.unwrap();
    }

    assert!(cache.peek(&source(ids[0])).is_none());
    assert!(cache.peek(&source(ids[1])).is_some());
    assert!(cache.peek(&source(ids[2])).is_some());
    assert_eq!(cache.stats().entries, 2);
}

#[tokio::test]
async fn test_failures_are_not_cached() {
    let mut server = mockito::Server::new_async().await;
    let missing = server
        .mock("GET", "/vi/dQw4w9WgXcQ/hqdefault.jpg")
        .with_status(404)
        .expect(2)
        .create_async()
        .await;
    let html = server
        .mock("GET", "/vi/xxxxxxxxxxx/hqdefault.jpg")
        .with_status(200)
        .with_header("content-type", "text/html; charset=utf-8")
        .with_body("<html></html>")
        .create_async()
        .await;

    let cache = create_test_cache(&server.url(), None);
    for _ in 0..2 {
        assert_eq!(cache.get(&source("dQw4w9WgXcQ")).await, Err(AssetError::NotFound));
    }
    assert!(matches!(
        cache.get(&source("xxxxxxxxxxx")).await,
        Err(AssetError::NotAnImage(_))
    ));
    assert_eq!(cache.stats().entries, 0);

    missing.assert_async().await;
    html.assert_async().await;
}

#[test]
fn test_settings_from_config() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("config.yaml"),
        "cover_cache:\n  capacity: 32\n  url_template: \"https://img.example/{id}.jpg\"\n",
    )
    .unwrap();
    let config = voyoconfig::Config::load_config(dir.path().to_str().unwrap()).unwrap();

    let settings = config.get_cover_settings();
    assert_eq!(settings.cache.capacity, Some(32));
    assert_eq!(settings.cache.ttl, Duration::from_secs(86400));
    assert_eq!(settings.url_template, "https://img.example/{id}.jpg");

    let cache = config.create_cover_cache().unwrap();
    assert_eq!(cache.cover_url(&source("dQw4w9WgXcQ")), "https://img.example/dQw4w9WgXcQ.jpg");

    config.set_covers_capacity(64).unwrap();
    assert_eq!(config.get_covers_capacity(), Some(64));
}
