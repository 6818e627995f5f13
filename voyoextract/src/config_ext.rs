//! Construction des paliers et du cache de résolution depuis la configuration
//!
//! Sections lues : `extract.*` et `resolution_cache.*`.

use crate::pipeline::ExtractionPipeline;
use crate::provider::Provider;
use crate::providers::{
    CliProvider, HttpObjectStorage, NativeApiProvider, ObjectStorageProvider, PeerProxyProvider,
};
use crate::resolution::{DEFAULT_RESOLUTION_TTL, ResolutionCache};
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use voyocache::{CacheSettings, CacheSettingsExt};
use voyoconfig::Config;

/// Paramètres des quatre paliers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractSettings {
    pub object_storage_enabled: bool,
    pub object_storage_url: String,
    pub object_storage_timeout: Duration,

    pub native_api_enabled: bool,
    pub native_api_url: String,
    pub native_client_name: String,
    pub native_client_version: String,
    pub native_api_timeout: Duration,

    pub peer_proxies_enabled: bool,
    pub peer_endpoints: Vec<String>,
    pub peer_timeout: Duration,

    pub cli_enabled: bool,
    pub cli_program: String,
    pub cli_max_concurrent: usize,
    pub cli_deadline: Duration,
}

pub trait ExtractConfigExt {
    fn get_extract_settings(&self) -> ExtractSettings;

    /// Section `resolution_cache` ; TTL par défaut [`DEFAULT_RESOLUTION_TTL`], sans borne
    fn get_resolution_cache_settings(&self) -> CacheSettings;

    /// Pipeline ordonné : stockage objet, API native, proxys pairs, CLI
    ///
    /// Les paliers désactivés (ou sans URL) sont omis.
    fn create_extraction_pipeline(&self) -> Result<Arc<ExtractionPipeline>> {
        let s = self.get_extract_settings();
        let mut providers: Vec<Arc<dyn Provider>> = Vec::new();

        if s.object_storage_enabled && !s.object_storage_url.is_empty() {
            let storage = HttpObjectStorage::new(&s.object_storage_url, s.object_storage_timeout)?;
            providers.push(Arc::new(ObjectStorageProvider::new(Arc::new(storage))));
        }
        if s.native_api_enabled && !s.native_api_url.is_empty() {
            providers.push(Arc::new(NativeApiProvider::new(
                &s.native_api_url,
                &s.native_client_name,
                &s.native_client_version,
                s.native_api_timeout,
            )?));
        }
        if s.peer_proxies_enabled && !s.peer_endpoints.is_empty() {
            providers.push(Arc::new(PeerProxyProvider::new(
                s.peer_endpoints.clone(),
                s.peer_timeout,
            )?));
        }
        if s.cli_enabled && !s.cli_program.is_empty() {
            providers.push(Arc::new(CliProvider::new(
                &s.cli_program,
                s.cli_max_concurrent,
                s.cli_deadline,
            )));
        }

        let pipeline = ExtractionPipeline::with_providers(providers);
        info!(providers = ?pipeline.provider_names(), "Extraction pipeline configured");
        Ok(Arc::new(pipeline))
    }

    fn create_resolution_cache(&self) -> Result<ResolutionCache> {
        let ttl = self.get_resolution_cache_settings().ttl;
        Ok(ResolutionCache::new(self.create_extraction_pipeline()?, ttl))
    }
}

impl ExtractConfigExt for Config {
    fn get_extract_settings(&self) -> ExtractSettings {
        let secs = |path: &[&str], default: u64| self.get_secs(path, Duration::from_secs(default));

        ExtractSettings {
            object_storage_enabled: self.get_bool(&["extract", "object_storage", "enabled"], true),
            object_storage_url: self.get_string(&["extract", "object_storage", "base_url"], ""),
            object_storage_timeout: secs(&["extract", "object_storage", "timeout_secs"], 5),

            native_api_enabled: self.get_bool(&["extract", "native_api", "enabled"], true),
            native_api_url: self.get_string(
                &["extract", "native_api", "base_url"],
                "https://www.youtube.com",
            ),
            native_client_name: self.get_string(&["extract", "native_api", "client_name"], "IOS"),
            native_client_version: self.get_string(
                &["extract", "native_api", "client_version"],
                "21.02.3",
            ),
            native_api_timeout: secs(&["extract", "native_api", "timeout_secs"], 10),

            peer_proxies_enabled: self.get_bool(&["extract", "peer_proxies", "enabled"], true),
            peer_endpoints: self.get_string_list(&["extract", "peer_proxies", "endpoints"]),
            peer_timeout: secs(&["extract", "peer_proxies", "timeout_secs"], 8),

            cli_enabled: self.get_bool(&["extract", "cli", "enabled"], true),
            cli_program: self.get_string(&["extract", "cli", "program"], "yt-dlp"),
            cli_max_concurrent: self.get_usize(&["extract", "cli", "max_concurrent"], 2),
            cli_deadline: secs(&["extract", "cli", "deadline_secs"], 45),
        }
    }

    fn get_resolution_cache_settings(&self) -> CacheSettings {
        self.get_cache_settings(
            "resolution_cache",
            CacheSettings {
                ttl: DEFAULT_RESOLUTION_TTL,
                capacity: None,
                sweep_interval: Duration::from_secs(300),
            },
        )
    }
}
