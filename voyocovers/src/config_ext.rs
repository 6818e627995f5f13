//! Extension pour construire le cache de couvertures depuis `voyoconfig`
//!
//! Section lue : `cover_cache` (`ttl_secs`, `capacity`, `timeout_secs`,
//! `url_template`, `sweep_interval_secs`).

use crate::cache::{CoverCache, CoverSettings};
use anyhow::Result;
use std::sync::Arc;
use voyocache::CacheSettingsExt;
use voyoconfig::Config;

const COVER_CACHE_SECTION: &str = "cover_cache";

/// Trait d'extension pour gérer le cache de couvertures dans voyoconfig
///
/// # Exemple
///
/// ```rust,ignore
/// use voyoconfig::get_config;
/// use voyocovers::CoverCacheConfigExt;
///
/// let cache = get_config().create_cover_cache()?;
/// let art = cache.get(&source).await?;
/// ```
pub trait CoverCacheConfigExt {
    fn get_cover_settings(&self) -> CoverSettings;

    /// Capacité maximale du cache (nombre d'images)
    fn get_covers_capacity(&self) -> Option<usize>;

    fn set_covers_capacity(&self, capacity: usize) -> Result<()>;

    fn create_cover_cache(&self) -> Result<Arc<CoverCache>>;
}

impl CoverCacheConfigExt for Config {
    fn get_cover_settings(&self) -> CoverSettings {
        let d = CoverSettings::default();
        CoverSettings {
            cache: self.get_cache_settings(COVER_CACHE_SECTION, d.cache),
            timeout: self.get_secs(&[COVER_CACHE_SECTION, "timeout_secs"], d.timeout),
            url_template: self.get_string(&[COVER_CACHE_SECTION, "url_template"], &d.url_template),
        }
    }

    fn get_covers_capacity(&self) -> Option<usize> {
        self.get_cache_capacity(COVER_CACHE_SECTION, CoverSettings::default().cache.capacity)
    }

    fn set_covers_capacity(&self, capacity: usize) -> Result<()> {
        self.set_cache_capacity(COVER_CACHE_SECTION, capacity)
    }

    fn create_cover_cache(&self) -> Result<Arc<CoverCache>> {
        Ok(Arc::new(CoverCache::new(self.get_cover_settings())?))
    }
}
