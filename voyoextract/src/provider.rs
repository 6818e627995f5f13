use crate::error::ProviderError;
use crate::model::{MediaKind, QualityTier, StreamDescriptor};
use async_trait::async_trait;
use voyoid::SourceId;

/// Un palier de la chaîne d'extraction
///
/// Chaque implémentation borne ses propres appels dans le temps et convertit
/// tout échec en [`ProviderError`] ; le pipeline passe alors au palier suivant.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Nom court utilisé dans les logs (jamais exposé aux clients)
    fn name(&self) -> &str;

    async fn resolve(
        &self,
        source: &SourceId,
        kind: MediaKind,
        quality: QualityTier,
    ) -> Result<StreamDescriptor, ProviderError>;
}
