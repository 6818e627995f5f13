//! Chaîne ordonnée des paliers d'extraction

use crate::error::ResolutionError;
use crate::model::{MediaKind, QualityTier, StreamDescriptor};
use crate::provider::Provider;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};
use voyoid::SourceId;

/// Essaie les providers dans l'ordre, le premier résultat bien formé gagne
///
/// Un provider qui échoue, ou qui rend un descripteur inutilisable, est
/// journalisé puis ignoré. Le détail des échecs n'est jamais remonté à
/// l'appelant.
pub struct ExtractionPipeline {
    providers: Vec<Arc<dyn Provider>>,
}

impl ExtractionPipeline {
    pub fn new() -> Self {
        Self {
            providers: Vec::new(),
        }
    }

    pub fn with_providers(providers: Vec<Arc<dyn Provider>>) -> Self {
        Self { providers }
    }

    /// Ajoute un palier en fin de chaîne
    pub fn push(&mut self, provider: Arc<dyn Provider>) {
        self.providers.push(provider);
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Noms des paliers, dans l'ordre d'essai
    pub fn provider_names(&self) -> Vec<String> {
        self.providers.iter().map(|p| p.name().to_string()).collect()
    }

    pub async fn resolve(
        &self,
        source: &SourceId,
        kind: MediaKind,
        quality: QualityTier,
    ) -> Result<StreamDescriptor, ResolutionError> {
        for provider in &self.providers {
            let started = Instant::now();
            match provider.resolve(source, kind, quality).await {
                Ok(descriptor) if descriptor.is_well_formed() => {
                    info!(
                        provider = provider.name(),
                        %source,
                        %kind,
                        quality = quality.as_str(),
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "Resolved stream"
                    );
                    return Ok(descriptor);
                }
                Ok(_) => {
                    warn!(provider = provider.name(), %source, "Provider returned an unusable descriptor");
                }
                Err(e) => {
                    debug!(provider = provider.name(), %source, "Provider failed: {}", e);
                }
            }
        }

        warn!(%source, %kind, "All providers exhausted");
        Err(ResolutionError::Exhausted)
    }
}

impl Default for ExtractionPipeline {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderError;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Fixed {
        name: &'static str,
        url: Option<&'static str>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Provider for Fixed {
        fn name(&self) -> &str {
            self.name
        }

        async fn resolve(
            &self,
            _source: &SourceId,
            kind: MediaKind,
            quality: QualityTier,
        ) -> Result<StreamDescriptor, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let url = self.url.ok_or(ProviderError::NotFound)?;
            Ok(StreamDescriptor {
                playable_url: url.to_string(),
                audio_url: None,
                mime_type: "audio/webm".to_string(),
                bitrate: 128_000,
                kind,
                quality,
                resolved_at: Utc::now(),
            })
        }
    }

    fn fixed(name: &'static str, url: Option<&'static str>) -> Arc<Fixed> {
        Arc::new(Fixed {
            name,
            url,
            calls: AtomicUsize::new(0),
        })
    }

    #[tokio::test]
    async fn test_first_success_wins() {
        let failing = fixed("failing", None);
        let malformed = fixed("malformed", Some("ftp://nope"));
        let good = fixed("good", Some("https://cdn.example/a"));
        let never = fixed("never", Some("https://cdn.example/b"));

        let pipeline = ExtractionPipeline::with_providers(vec![
            failing.clone(),
            malformed.clone(),
            good.clone(),
            never.clone(),
        ]);
        assert_eq!(pipeline.provider_names(), vec!["failing", "malformed", "good", "never"]);

        let source = SourceId::parse("dQw4w9WgXcQ").unwrap();
        let d = pipeline
            .resolve(&source, MediaKind::Audio, QualityTier::Standard)
            .await
            .unwrap();
        assert_eq!(d.playable_url, "https://cdn.example/a");
        assert_eq!(failing.calls.load(Ordering::SeqCst), 1);
        assert_eq!(malformed.calls.load(Ordering::SeqCst), 1);
        assert_eq!(never.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_empty_pipeline_is_exhausted() {
        let pipeline = ExtractionPipeline::new();
        assert!(pipeline.is_empty());
        let source = SourceId::parse("dQw4w9WgXcQ").unwrap();
        assert_eq!(
            pipeline.resolve(&source, MediaKind::Video, QualityTier::High).await,
            Err(ResolutionError::Exhausted)
        );
    }
}
