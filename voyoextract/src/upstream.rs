//! Lecture HTTP par plages
//!
//! Utilisé par le stockage objet (`getObject`) et par le proxy de diffusion.
//! Le corps n'est jamais chargé en mémoire : il est exposé comme un flux.

use crate::error::ProviderError;
use bytes::Bytes;
use futures::StreamExt;
use futures::stream::BoxStream;
use reqwest::header::{CONTENT_LENGTH, CONTENT_RANGE, CONTENT_TYPE, RANGE};
use std::time::Duration;

/// Réponse amont prête à être relayée
pub struct ByteSource {
    /// Vrai si l'amont a répondu avec un `Content-Range`
    pub partial: bool,
    pub content_length: Option<u64>,
    pub content_range: Option<String>,
    pub content_type: Option<String>,
    pub body: BoxStream<'static, Result<Bytes, ProviderError>>,
}

impl std::fmt::Debug for ByteSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ByteSource")
            .field("partial", &self.partial)
            .field("content_length", &self.content_length)
            .field("content_range", &self.content_range)
            .field("content_type", &self.content_type)
            .finish_non_exhaustive()
    }
}

/// Construit un client HTTP avec délais de connexion et de lecture
///
/// Pas de délai global : un flux long reste ouvert tant que l'amont produit.
/// Les appels ponctuels ajoutent leur propre `RequestBuilder::timeout`.
pub fn build_client(timeout: Duration) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .user_agent(concat!("voyo-media/", env!("CARGO_PKG_VERSION")))
        .connect_timeout(timeout)
        .read_timeout(timeout)
        .build()
}

/// Ouvre `url` en transmettant l'en-tête `Range` du client s'il existe
///
/// Seuls les statuts 200 et 206 sont acceptés.
pub async fn fetch_range(
    client: &reqwest::Client,
    url: &str,
    range: Option<&str>,
) -> Result<ByteSource, ProviderError> {
    let mut request = client.get(url);
    if let Some(range) = range {
        request = request.header(RANGE, range);
    }

    let response = request.send().await?;
    let status = response.status();
    if !(status.is_success()) {
        return Err(ProviderError::from_status_code(status.as_u16()));
    }

    let headers = response.headers();
    let header_str = |name| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };

    let content_range = header_str(CONTENT_RANGE);
    let content_type = header_str(CONTENT_TYPE);
    let content_length = header_str(CONTENT_LENGTH).and_then(|v| v.parse().ok());

    let body = response
        .bytes_stream()
        .map(|chunk| chunk.map_err(ProviderError::from))
        .boxed();

    Ok(ByteSource {
        partial: content_range.is_some(),
        content_length,
        content_range,
        content_type,
        body,
    })
}
