//! Palier « API native » : endpoint `player` interne de la plateforme

use crate::error::ProviderError;
use crate::model::{MediaKind, QualityTier, StreamCandidate, StreamDescriptor, select_best_candidate};
use crate::provider::Provider;
use crate::upstream::build_client;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::debug;
use voyoid::SourceId;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlayerResponse {
    #[serde(default)]
    playability_status: Option<PlayabilityStatus>,
    #[serde(default)]
    streaming_data: Option<StreamingData>,
}

#[derive(Debug, Deserialize)]
struct PlayabilityStatus {
    #[serde(default)]
    status: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StreamingData {
    #[serde(default)]
    adaptive_formats: Vec<AdaptiveFormat>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AdaptiveFormat {
    /// Absente pour les formats chiffrés (`signatureCipher`), ignorés ici
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    mime_type: String,
    #[serde(default)]
    bitrate: u64,
}

/// Client de l'API `player`
pub struct NativeApiProvider {
    client: reqwest::Client,
    base_url: String,
    client_name: String,
    client_version: String,
    timeout: Duration,
}

impl NativeApiProvider {
    /// # Arguments
    ///
    /// * `base_url` - Origine de l'API (ex: `https://www.youtube.com`)
    /// * `client_name` / `client_version` - Identité du client annoncée
    /// * `timeout` - Délai de connexion et de lecture
    pub fn new(
        base_url: impl Into<String>,
        client_name: impl Into<String>,
        client_version: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        Ok(Self {
            client: build_client(timeout)?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client_name: client_name.into(),
            client_version: client_version.into(),
            timeout,
        })
    }

    /// Liste les formats adaptatifs directement lisibles
    pub async fn fetch_candidates(&self, source: &SourceId) -> Result<Vec<StreamCandidate>, ProviderError> {
        let body = json!({
            "videoId": source.as_str(),
            "context": {
                "client": {
                    "clientName": self.client_name,
                    "clientVersion": self.client_version,
                    "hl": "en",
                    "gl": "US",
                }
            },
            "contentCheckOk": true,
            "racyCheckOk": true,
        });

        let url = format!("{}/youtubei/v1/player?prettyPrint=false", self.base_url);
        let response = self
            .client
            .post(&url)
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::from_status_code(status.as_u16()));
        }

        let player: PlayerResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Malformed(e.to_string()))?;

        if let Some(playability) = &player.playability_status {
            if !playability.status.is_empty() && playability.status != "OK" {
                return Err(ProviderError::Unavailable(playability.status.clone()));
            }
        }

        let formats = player
            .streaming_data
            .ok_or_else(|| ProviderError::Malformed("missing streamingData".to_string()))?
            .adaptive_formats;

        Ok(formats
            .into_iter()
            .filter_map(|f| {
                f.url.map(|url| StreamCandidate {
                    url,
                    mime_type: f.mime_type,
                    bitrate: f.bitrate,
                })
            })
            .collect())
    }

    /// Meilleur flux audio disponible, `None` si aucun
    pub async fn get_best_audio_stream(&self, source: &SourceId) -> Option<StreamCandidate> {
        let candidates = self.fetch_candidates(source).await.ok()?;
        select_best_candidate(&candidates, MediaKind::Audio, QualityTier::High)
    }
}

#[async_trait]
impl Provider for NativeApiProvider {
    fn name(&self) -> &str {
        "native-api"
    }

    async fn resolve(
        &self,
        source: &SourceId,
        kind: MediaKind,
        quality: QualityTier,
    ) -> Result<StreamDescriptor, ProviderError> {
        let candidates = self.fetch_candidates(source).await?;
        debug!(count = candidates.len(), "Native API returned candidates");

        let best = select_best_candidate(&candidates, kind, quality).ok_or(ProviderError::NoCandidate)?;
        Ok(StreamDescriptor::from_candidate(best, kind, quality))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unplayable_content() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("POST", mockito::Matcher::Regex(r"^/youtubei/v1/player".to_string()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"playabilityStatus":{"status":"LOGIN_REQUIRED"}}"#)
            .create_async()
            .await;

        let provider = NativeApiProvider::new(server.url(), "IOS", "21.02.3", Duration::from_secs(2)).unwrap();
        let source = SourceId::parse("dQw4w9WgXcQ").unwrap();
        let err = provider
            .resolve(&source, MediaKind::Audio, QualityTier::High)
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Unavailable(_)));
        assert!(provider.get_best_audio_stream(&source).await.is_none());
    }

    #[tokio::test]
    async fn test_ciphered_formats_are_skipped() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("POST", mockito::Matcher::Regex(r"^/youtubei/v1/player".to_string()))
            .with_status(200)
            .with_body(
                r#"{"playabilityStatus":{"status":"OK"},"streamingData":{"adaptiveFormats":[
                    {"signatureCipher":"s=...","mimeType":"audio/webm; codecs=\"opus\"","bitrate":160000},
                    {"url":"https://cdn.example/a","mimeType":"audio/mp4; codecs=\"mp4a.40.2\"","bitrate":130000}
                ]}}"#,
            )
            .create_async()
            .await;

        let provider = NativeApiProvider::new(server.url(), "IOS", "21.02.3", Duration::from_secs(2)).unwrap();
        let source = SourceId::parse("dQw4w9WgXcQ").unwrap();
        let best = provider.get_best_audio_stream(&source).await.unwrap();
        assert_eq!(best.url, "https://cdn.example/a");
    }
}
