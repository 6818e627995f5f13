//! Cache de résolution
//!
//! Associe une [`ResolutionKey`] au dernier descripteur obtenu. Les
//! résolutions concurrentes d'une même clé n'invoquent le pipeline qu'une
//! fois.

use crate::error::ResolutionError;
use crate::model::{ResolutionKey, StreamDescriptor};
use crate::pipeline::ExtractionPipeline;
use std::sync::Arc;
use std::time::Duration;
use voyocache::{CacheStats, CoalescingCache};

/// Durée de vie d'une résolution
///
/// Les URLs des fournisseurs expirent au bout d'environ six heures ; on
/// garde une marge.
pub const DEFAULT_RESOLUTION_TTL: Duration = Duration::from_secs(4 * 60 * 60);

#[derive(Clone)]
pub struct ResolutionCache {
    cache: CoalescingCache<ResolutionKey, StreamDescriptor, ResolutionError>,
    pipeline: Arc<ExtractionPipeline>,
}

impl ResolutionCache {
    pub fn new(pipeline: Arc<ExtractionPipeline>, ttl: Duration) -> Self {
        Self {
            cache: CoalescingCache::new(ttl, None),
            pipeline,
        }
    }

    pub fn with_default_ttl(pipeline: Arc<ExtractionPipeline>) -> Self {
        Self::new(pipeline, DEFAULT_RESOLUTION_TTL)
    }

    /// Descripteur en cache, sinon résolution via le pipeline
    ///
    /// Les échecs ne sont pas mis en cache : l'appel suivant relance le
    /// pipeline.
    pub async fn resolve(&self, key: ResolutionKey) -> Result<StreamDescriptor, ResolutionError> {
        let pipeline = self.pipeline.clone();
        let (source, kind, quality) = (key.source.clone(), key.kind, key.quality);
        self.cache
            .get_or_fetch(key, move || async move {
                pipeline.resolve(&source, kind, quality).await
            })
            .await
    }

    /// Descripteur en cache, sans résolution
    pub fn peek(&self, key: &ResolutionKey) -> Option<StreamDescriptor> {
        self.cache.peek(key)
    }

    pub fn is_warm(&self, key: &ResolutionKey) -> bool {
        self.cache.contains(key)
    }

    pub fn is_in_flight(&self, key: &ResolutionKey) -> bool {
        self.cache.is_in_flight(key)
    }

    pub fn invalidate(&self, key: &ResolutionKey) -> Option<StreamDescriptor> {
        self.cache.invalidate(key)
    }

    pub fn sweep(&self) -> usize {
        self.cache.sweep()
    }

    pub fn stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn ttl(&self) -> Duration {
        self.cache.ttl()
    }

    pub fn pipeline(&self) -> &Arc<ExtractionPipeline> {
        &self.pipeline
    }
}
