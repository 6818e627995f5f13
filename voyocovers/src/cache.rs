//! Cache mémoire des couvertures
//!
//! Les images sont immuables une fois récupérées : longue durée de vie,
//! capacité bornée avec éviction du plus ancien inséré. Les récupérations
//! concurrentes d'une même image partagent un seul appel amont.

use crate::error::AssetError;
use bytes::Bytes;
use reqwest::header::CONTENT_TYPE;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use voyocache::{CacheSettings, CacheStats, CoalescingCache};
use voyoid::SourceId;

/// Taille maximale acceptée pour une image
pub const MAX_COVER_BYTES: usize = 5 * 1024 * 1024;

/// Gabarit d'URL par défaut, `{id}` remplacé par l'identifiant natif
pub const DEFAULT_COVER_URL_TEMPLATE: &str = "https://i.ytimg.com/vi/{id}/hqdefault.jpg";

/// Image prête à servir
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoverArt {
    pub bytes: Bytes,
    pub content_type: String,
}

/// Réglages du cache de couvertures
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoverSettings {
    pub cache: CacheSettings,
    pub timeout: Duration,
    pub url_template: String,
}

impl Default for CoverSettings {
    fn default() -> Self {
        Self {
            cache: CacheSettings {
                ttl: Duration::from_secs(24 * 60 * 60),
                capacity: Some(512),
                sweep_interval: Duration::from_secs(900),
            },
            timeout: Duration::from_secs(10),
            url_template: DEFAULT_COVER_URL_TEMPLATE.to_string(),
        }
    }
}

pub struct CoverCache {
    client: reqwest::Client,
    cache: CoalescingCache<SourceId, CoverArt, AssetError>,
    settings: CoverSettings,
}

impl CoverCache {
    pub fn new(settings: CoverSettings) -> Result<Self, AssetError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("voyo-media/", env!("CARGO_PKG_VERSION")))
            .timeout(settings.timeout)
            .build()?;

        Ok(Self {
            client,
            cache: CoalescingCache::new(settings.cache.ttl, settings.cache.capacity),
            settings,
        })
    }

    pub fn settings(&self) -> &CoverSettings {
        &self.settings
    }

    /// URL amont de la couverture
    pub fn cover_url(&self, source: &SourceId) -> String {
        self.settings.url_template.replace("{id}", source.as_str())
    }

    /// Image en cache, sinon téléchargée puis mise en cache
    pub async fn get(&self, source: &SourceId) -> Result<CoverArt, AssetError> {
        let client = self.client.clone();
        let url = self.cover_url(source);
        self.cache
            .get_or_fetch(source.clone(), move || download_cover(client, url))
            .await
    }

    pub fn peek(&self, source: &SourceId) -> Option<CoverArt> {
        self.cache.peek(source)
    }

    pub fn sweep(&self) -> usize {
        self.cache.sweep()
    }

    pub fn stats(&self) -> CacheStats {
        self.cache.stats()
    }
}

async fn download_cover(client: reqwest::Client, url: String) -> Result<CoverArt, AssetError> {
    debug!(url = %url, "Fetching cover");
    let response = client.get(&url).send().await?;

    let status = response.status();
    if !status.is_success() {
        return Err(AssetError::from_status_code(status.as_u16()));
    }

    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.split(';').next().unwrap_or_default().trim().to_ascii_lowercase())
        .unwrap_or_else(|| "image/jpeg".to_string());
    if !content_type.starts_with("image/") {
        return Err(AssetError::NotAnImage(content_type));
    }

    if response.content_length().is_some_and(|len| len as usize > MAX_COVER_BYTES) {
        return Err(AssetError::TooLarge(MAX_COVER_BYTES));
    }
    let bytes = response.bytes().await?;
    if bytes.len() > MAX_COVER_BYTES {
        return Err(AssetError::TooLarge(MAX_COVER_BYTES));
    }

    Ok(CoverArt {
        bytes,
        content_type,
    })
}

/// Raccourci pour un cache partagé
pub fn new_cover_cache(settings: CoverSettings) -> Result<Arc<CoverCache>, AssetError> {
    Ok(Arc::new(CoverCache::new(settings)?))
}
