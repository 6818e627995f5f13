//! # voyoextract - Résolution des flux
//!
//! Transforme un [`SourceId`](voyoid::SourceId) en [`StreamDescriptor`]
//! jouable.
//!
//! ## Architecture
//!
//! - [`model`] : types du domaine (nature, palier de qualité, candidats, descripteur)
//! - [`provider`] : le trait [`Provider`] implémenté par chaque palier
//! - [`providers`] : stockage objet, API native, proxys pairs, outil CLI
//! - [`pipeline`] : la chaîne ordonnée de providers, premier succès gagnant
//! - [`resolution`] : le cache de résolution avec fusion des requêtes
//! - [`upstream`] : lecture HTTP par plages, partagée avec le proxy de diffusion
//!
//! ## Exemple
//!
//! ```rust,no_run
//! use voyoconfig::get_config;
//! use voyoextract::{ExtractConfigExt, MediaKind, QualityTier, ResolutionKey};
//! use voyoid::SourceId;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = get_config();
//! let cache = config.create_resolution_cache()?;
//! let key = ResolutionKey::new(SourceId::parse("dQw4w9WgXcQ")?, MediaKind::Audio, QualityTier::Standard);
//! let descriptor = cache.resolve(key).await?;
//! println!("{}", descriptor.mime_type);
//! # Ok(())
//! # }
//! ```

pub mod config_ext;
pub mod error;
pub mod model;
pub mod pipeline;
pub mod provider;
pub mod providers;
pub mod resolution;
pub mod upstream;

pub use config_ext::{ExtractConfigExt, ExtractSettings};
pub use error::{ProviderError, ResolutionError};
pub use model::{
    MediaKind, QualityTier, ResolutionKey, StreamCandidate, StreamDescriptor,
    select_best_candidate,
};
pub use pipeline::ExtractionPipeline;
pub use provider::Provider;
pub use resolution::{DEFAULT_RESOLUTION_TTL, ResolutionCache};
pub use upstream::{ByteSource, fetch_range};
