use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use voyoextract::{MediaKind, QualityTier, StreamDescriptor};
use voyoid::SourceId;
use voyomirror::{MirrorConfigExt, MirrorPromoter, MirrorStore, PromotionOutcome};
use voyoutils::TaskSupervisor;

fn create_test_promoter(dir: &std::path::Path) -> (Arc<MirrorPromoter>, TaskSupervisor) {
    let supervisor = TaskSupervisor::new();
    let store = Arc::new(MirrorStore::new(dir).unwrap());
    let promoter = MirrorPromoter::new(store, supervisor.clone(), Duration::from_secs(10)).unwrap();
    (Arc::new(promoter), supervisor)
}

fn descriptor(url: String, kind: MediaKind) -> StreamDescriptor {
    StreamDescriptor {
        playable_url: url,
        audio_url: None,
        mime_type: "audio/webm; codecs=\"opus\"".to_string(),
        bitrate: 128_000,
        kind,
        quality: QualityTier::Standard,
        resolved_at: Utc::now(),
    }
}

fn source() -> SourceId {
    SourceId::parse("dQw4w9WgXcQ").unwrap()
}

#[tokio::test]
async fn test_first_resolution_is_promoted_once() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/audio")
        .with_status(200)
        .with_header("content-type", "audio/webm")
        .with_body("0123456789")
        .expect(1)
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    let (promoter, supervisor) = create_test_promoter(dir.path());
    let d = descriptor(format!("{}/audio", server.url()), MediaKind::Audio);

    assert!(promoter.promote(&source(), QualityTier::Standard, &d));
    assert!(!promoter.promote(&source(), QualityTier::Standard, &d));
    supervisor.drain().await;

    let file = promoter
        .store()
        .lookup(&source(), QualityTier::Standard)
        .await
        .unwrap();
    assert_eq!(file.size, 10);
    assert_eq!(file.extension, "webm");
    assert_eq!(file.path, dir.path().join("dQw4w9WgXcQ.standard.webm"));

    // réservation conservée après succès
    assert!(promoter.is_claimed(&source(), QualityTier::Standard));
    assert!(!promoter.promote(&source(), QualityTier::Standard, &d));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_existing_file_makes_promotion_a_noop() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/audio")
        .with_status(200)
        .with_body("fresh")
        .expect(0)
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("dQw4w9WgXcQ.standard.m4a"), b"already here").unwrap();
    let (promoter, _supervisor) = create_test_promoter(dir.path());

    let outcome = promoter
        .promote_now(
            &source(),
            QualityTier::Standard,
            &descriptor(format!("{}/audio", server.url()), MediaKind::Audio),
        )
        .await
        .unwrap();
    assert_eq!(outcome, PromotionOutcome::AlreadyMirrored);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_video_is_never_promoted() {
    let dir = tempfile::tempdir().unwrap();
    let (promoter, _supervisor) = create_test_promoter(dir.path());
    let d = descriptor("https://cdn.example/video".to_string(), MediaKind::Video);

    assert!(!promoter.promote(&source(), QualityTier::High, &d));
    assert_eq!(promoter.claimed_count(), 0);
}

#[tokio::test]
async fn test_failed_promotion_releases_claim() {
    let mut server = mockito::Server::new_async().await;
    let _m = server
        .mock("GET", "/audio")
        .with_status(500)
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    let (promoter, supervisor) = create_test_promoter(dir.path());
    let d = descriptor(format!("{}/audio", server.url()), MediaKind::Audio);

    assert!(promoter.promote(&source(), QualityTier::Low, &d));
    supervisor.drain().await;

    assert!(!promoter.is_claimed(&source(), QualityTier::Low));
    assert!(promoter.store().lookup(&source(), QualityTier::Low).await.is_none());
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

/// Serveur qui envoie l'en-tête et un début de corps puis ne répond plus
async fn stalling_server() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut request = [0u8; 1024];
                let _ = socket.read(&mut request).await;
                let head = "HTTP/1.1 200 OK\r\ncontent-type: audio/webm\r\ncontent-length: 1000\r\n\r\n";
                let _ = socket.write_all(head.as_bytes()).await;
                let _ = socket.write_all(b"0123").await;
                let _ = socket.flush().await;
                tokio::time::sleep(Duration::from_secs(30)).await;
            });
        }
    });
    format!("http://{}/audio", addr)
}

#[tokio::test]
async fn test_timed_out_promotion_leaves_no_part_file() {
    let url = stalling_server().await;
    let dir = tempfile::tempdir().unwrap();
    let supervisor = TaskSupervisor::new();
    let store = Arc::new(MirrorStore::new(dir.path()).unwrap());
    let promoter =
        MirrorPromoter::new(store.clone(), supervisor.clone(), Duration::from_millis(500)).unwrap();

    assert!(promoter.promote(&source(), QualityTier::Standard, &descriptor(url, MediaKind::Audio)));
    supervisor.drain().await;

    assert!(!store.part_path(&source(), QualityTier::Standard, "webm").exists());
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    assert!(!promoter.is_claimed(&source(), QualityTier::Standard));
}

#[tokio::test]
async fn test_consolidation_removes_part_files() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("dQw4w9WgXcQ.standard.webm.part"), b"partial").unwrap();
    std::fs::write(dir.path().join("aaaaaaaaaaa.low.mp3"), b"complete").unwrap();

    let store = MirrorStore::new(dir.path()).unwrap();
    assert_eq!(store.consolidate().await.unwrap(), 1);
    assert!(!dir.path().join("dQw4w9WgXcQ.standard.webm.part").exists());
    assert!(
        store
            .lookup(&SourceId::parse("aaaaaaaaaaa").unwrap(), QualityTier::Low)
            .await
            .is_some()
    );
}

#[test]
fn test_mirror_dir_from_config() {
    let dir = tempfile::tempdir().unwrap();
    let config = voyoconfig::Config::load_config(dir.path().to_str().unwrap()).unwrap();

    let mirror_dir = config.get_mirror_dir().unwrap();
    assert_eq!(std::path::Path::new(&mirror_dir), dir.path().join("mirror"));
    assert!(dir.path().join("mirror").is_dir());
    assert_eq!(config.get_mirror_download_timeout(), Duration::from_secs(300));
}
