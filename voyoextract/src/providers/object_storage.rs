//! Palier « stockage objet » : copies pré-encodées dans un bucket public

use crate::error::ProviderError;
use crate::model::{MediaKind, QualityTier, StreamDescriptor};
use crate::provider::Provider;
use crate::upstream::{ByteSource, build_client, fetch_range};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::CONTENT_LENGTH;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use voyoid::SourceId;

/// Métadonnées d'un objet présent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectMeta {
    pub size: Option<u64>,
}

/// Accès en lecture à un stockage objet
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// `Ok(None)` si l'objet n'existe pas
    async fn head_object(&self, key: &str) -> Result<Option<ObjectMeta>, ProviderError>;

    async fn get_object(&self, key: &str, range: Option<&str>) -> Result<ByteSource, ProviderError>;

    /// URL publique de l'objet
    fn object_url(&self, key: &str) -> String;
}

/// Bucket exposé en HTTP public (R2, S3 website...)
pub struct HttpObjectStorage {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl HttpObjectStorage {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ProviderError> {
        Ok(Self {
            client: build_client(timeout)?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
        })
    }
}

#[async_trait]
impl ObjectStorage for HttpObjectStorage {
    async fn head_object(&self, key: &str) -> Result<Option<ObjectMeta>, ProviderError> {
        let response = self
            .client
            .head(self.object_url(key))
            .timeout(self.timeout)
            .send()
            .await?;
        let status = response.status();

        if status.as_u16() == 404 || status.as_u16() == 403 {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(ProviderError::from_status_code(status.as_u16()));
        }

        let size = response
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok());
        Ok(Some(ObjectMeta { size }))
    }

    async fn get_object(&self, key: &str, range: Option<&str>) -> Result<ByteSource, ProviderError> {
        fetch_range(&self.client, &self.object_url(key), range).await
    }

    fn object_url(&self, key: &str) -> String {
        format!("{}/{}", self.base_url, key)
    }
}

/// Clés candidates, dans l'ordre d'essai
///
/// - `audio/{palier}/{id}.opus` : disposition actuelle
/// - `{palier}/{id}.mp3` : ancienne disposition
pub fn object_keys(source: &SourceId, quality: QualityTier) -> Vec<(String, &'static str)> {
    let dir = quality.storage_dir();
    vec![
        (format!("audio/{}/{}.opus", dir, source), "audio/ogg"),
        (format!("{}/{}.mp3", dir, source), "audio/mpeg"),
    ]
}

/// Premier palier : vérification d'existence dans le stockage objet
///
/// Seul l'audio y est stocké.
pub struct ObjectStorageProvider {
    storage: Arc<dyn ObjectStorage>,
}

impl ObjectStorageProvider {
    pub fn new(storage: Arc<dyn ObjectStorage>) -> Self {
        Self { storage }
    }
}

#[async_trait]
impl Provider for ObjectStorageProvider {
    fn name(&self) -> &str {
        "object-storage"
    }

    async fn resolve(
        &self,
        source: &SourceId,
        kind: MediaKind,
        quality: QualityTier,
    ) -> Result<StreamDescriptor, ProviderError> {
        if kind != MediaKind::Audio {
            return Err(ProviderError::NoCandidate);
        }

        let mut last_error = None;
        for (key, mime) in object_keys(source, quality) {
            match self.storage.head_object(&key).await {
                Ok(Some(_)) => {
                    debug!(key = %key, "Found object in storage");
                    return Ok(StreamDescriptor {
                        playable_url: self.storage.object_url(&key),
                        audio_url: None,
                        mime_type: mime.to_string(),
                        bitrate: 0,
                        kind,
                        quality,
                        resolved_at: Utc::now(),
                    });
                }
                Ok(None) => {}
                // une erreur sur une clé n'empêche pas d'essayer la suivante
                Err(e) => {
                    warn!(key = %key, "Object storage lookup failed: {}", e);
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or(ProviderError::NotFound))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_keys_layout() {
        let source = SourceId::parse("dQw4w9WgXcQ").unwrap();
        let keys: Vec<String> = object_keys(&source, QualityTier::Low)
            .into_iter()
            .map(|(k, _)| k)
            .collect();
        assert_eq!(keys, vec!["audio/64/dQw4w9WgXcQ.opus", "64/dQw4w9WgXcQ.mp3"]);
    }

    #[tokio::test]
    async fn test_head_and_resolve_against_bucket() {
        let mut server = mockito::Server::new_async().await;
        let _opus = server
            .mock("HEAD", "/audio/128/dQw4w9WgXcQ.opus")
            .with_status(404)
            .create_async()
            .await;
        let _mp3 = server
            .mock("HEAD", "/128/dQw4w9WgXcQ.mp3")
            .with_status(200)
            .create_async()
            .await;

        let storage = Arc::new(HttpObjectStorage::new(server.url(), Duration::from_secs(2)).unwrap());
        assert!(storage.head_object("128/dQw4w9WgXcQ.mp3").await.unwrap().is_some());
        assert!(storage.head_object("audio/128/dQw4w9WgXcQ.opus").await.unwrap().is_none());

        let provider = ObjectStorageProvider::new(storage);
        let source = SourceId::parse("dQw4w9WgXcQ").unwrap();
        let d = provider
            .resolve(&source, MediaKind::Audio, QualityTier::Standard)
            .await
            .unwrap();
        assert_eq!(d.playable_url, format!("{}/128/dQw4w9WgXcQ.mp3", server.url()));
        assert_eq!(d.mime_type, "audio/mpeg");
        assert_eq!(d.bitrate, 0);

        assert!(matches!(
            provider.resolve(&source, MediaKind::Video, QualityTier::Standard).await,
            Err(ProviderError::NoCandidate)
        ));
    }

    #[tokio::test]
    async fn test_server_error_on_primary_key_falls_through_to_legacy() {
        let mut server = mockito::Server::new_async().await;
        let _opus = server
            .mock("HEAD", "/audio/128/dQw4w9WgXcQ.opus")
            .with_status(500)
            .create_async()
            .await;
        let _mp3 = server
            .mock("HEAD", "/128/dQw4w9WgXcQ.mp3")
            .with_status(200)
            .create_async()
            .await;

        let storage = Arc::new(HttpObjectStorage::new(server.url(), Duration::from_secs(2)).unwrap());
        let provider = ObjectStorageProvider::new(storage);
        let source = SourceId::parse("dQw4w9WgXcQ").unwrap();
        let d = provider
            .resolve(&source, MediaKind::Audio, QualityTier::High)
            .await
            .unwrap();
        assert_eq!(d.playable_url, format!("{}/128/dQw4w9WgXcQ.mp3", server.url()));
    }

    #[tokio::test]
    async fn test_server_error_on_every_key_is_reported() {
        let mut server = mockito::Server::new_async().await;
        let heads = server
            .mock("HEAD", mockito::Matcher::Any)
            .with_status(503)
            .expect(2)
            .create_async()
            .await;

        let storage = Arc::new(HttpObjectStorage::new(server.url(), Duration::from_secs(2)).unwrap());
        let provider = ObjectStorageProvider::new(storage);
        let source = SourceId::parse("dQw4w9WgXcQ").unwrap();
        let err = provider
            .resolve(&source, MediaKind::Audio, QualityTier::Low)
            .await
            .unwrap_err();
        assert!(!matches!(err, ProviderError::NotFound));
        heads.assert_async().await;
    }

    #[tokio::test]
    async fn test_get_object_forwards_range() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/audio/64/dQw4w9WgXcQ.opus")
            .match_header("range", "bytes=0-3")
            .with_status(206)
            .with_header("content-range", "bytes 0-3/10")
            .with_body("abcd")
            .create_async()
            .await;

        let storage = HttpObjectStorage::new(server.url(), Duration::from_secs(2)).unwrap();
        let source = storage
            .get_object("audio/64/dQw4w9WgXcQ.opus", Some("bytes=0-3"))
            .await
            .unwrap();
        assert!(source.partial);
        assert_eq!(source.content_range.as_deref(), Some("bytes 0-3/10"));
    }
}
