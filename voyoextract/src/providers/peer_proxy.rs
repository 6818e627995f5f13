//! Palier « proxys pairs » : instances compatibles Piped

use crate::error::ProviderError;
use crate::model::{MediaKind, QualityTier, StreamCandidate, StreamDescriptor, select_best_candidate};
use crate::provider::Provider;
use crate::upstream::build_client;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};
use voyoid::SourceId;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StreamsResponse {
    #[serde(default)]
    audio_streams: Vec<PeerStream>,
    #[serde(default)]
    video_streams: Vec<PeerStream>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PeerStream {
    url: String,
    #[serde(default)]
    mime_type: String,
    #[serde(default)]
    bitrate: u64,
    #[serde(default)]
    video_only: bool,
}

impl From<PeerStream> for StreamCandidate {
    fn from(s: PeerStream) -> Self {
        StreamCandidate {
            url: s.url,
            mime_type: s.mime_type,
            bitrate: s.bitrate,
        }
    }
}

/// Essaie chaque instance configurée dans l'ordre
///
/// Chaque tentative est bornée par `timeout` ; les échecs sont journalisés et
/// l'instance suivante est essayée.
pub struct PeerProxyProvider {
    client: reqwest::Client,
    endpoints: Vec<String>,
    timeout: Duration,
}

impl PeerProxyProvider {
    pub fn new(endpoints: Vec<String>, timeout: Duration) -> Result<Self, ProviderError> {
        Ok(Self {
            client: build_client(timeout)?,
            endpoints: endpoints
                .into_iter()
                .map(|e| e.trim_end_matches('/').to_string())
                .collect(),
            timeout,
        })
    }

    pub fn endpoints(&self) -> &[String] {
        &self.endpoints
    }

    /// Candidats proposés par une instance
    ///
    /// Pour la vidéo, seuls les flux multiplexés (avec audio) sont retenus.
    pub async fn fetch_candidate_streams(
        &self,
        endpoint: &str,
        source: &SourceId,
        kind: MediaKind,
    ) -> Result<Vec<StreamCandidate>, ProviderError> {
        let url = format!("{}/streams/{}", endpoint, source);
        let attempt = async {
            let response = self.client.get(&url).send().await?;
            let status = response.status();
            if !status.is_success() {
                return Err(ProviderError::from_status_code(status.as_u16()));
            }
            response
                .json::<StreamsResponse>()
                .await
                .map_err(|e| ProviderError::Malformed(e.to_string()))
        };

        let streams = tokio::time::timeout(self.timeout, attempt)
            .await
            .map_err(|_| ProviderError::Timeout(self.timeout))??;

        Ok(match kind {
            MediaKind::Audio => streams.audio_streams.into_iter().map(Into::into).collect(),
            MediaKind::Video => streams
                .video_streams
                .into_iter()
                .filter(|s| !s.video_only)
                .map(Into::into)
                .collect(),
        })
    }
}

#[async_trait]
impl Provider for PeerProxyProvider {
    fn name(&self) -> &str {
        "peer-proxy"
    }

    async fn resolve(
        &self,
        source: &SourceId,
        kind: MediaKind,
        quality: QualityTier,
    ) -> Result<StreamDescriptor, ProviderError> {
        if self.endpoints.is_empty() {
            return Err(ProviderError::Disabled);
        }

        for endpoint in &self.endpoints {
            match self.fetch_candidate_streams(endpoint, source, kind).await {
                Ok(candidates) => match select_best_candidate(&candidates, kind, quality) {
                    Some(best) => {
                        debug!(endpoint = %endpoint, "Peer proxy returned a usable stream");
                        return Ok(StreamDescriptor::from_candidate(best, kind, quality));
                    }
                    None => debug!(endpoint = %endpoint, "Peer proxy had no usable candidate"),
                },
                Err(e) => warn!(endpoint = %endpoint, "Peer proxy attempt failed: {}", e),
            }
        }

        Err(ProviderError::NoCandidate)
    }
}
