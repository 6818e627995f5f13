//! # voyocovers - Cache des couvertures
//!
//! Petit frère du cache de résolution pour les images : durée de vie longue
//! (24 h), capacité bornée, fusion des téléchargements concurrents.
//!
//! ## Utilisation
//!
//! ```rust,no_run
//! use voyoconfig::get_config;
//! use voyocovers::CoverCacheConfigExt;
//! use voyoid::SourceId;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let cache = get_config().create_cover_cache()?;
//! let art = cache.get(&SourceId::parse("dQw4w9WgXcQ")?).await?;
//! println!("{} ({} bytes)", art.content_type, art.bytes.len());
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod config_ext;
pub mod error;

pub use cache::{
    CoverArt, CoverCache, CoverSettings, DEFAULT_COVER_URL_TEMPLATE, MAX_COVER_BYTES,
    new_cover_cache,
};
pub use config_ext::CoverCacheConfigExt;
pub use error::AssetError;
