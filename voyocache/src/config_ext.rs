//! Paramètres des caches mémoire dans la configuration
//!
//! Chaque cache a sa section de premier niveau (`resolution_cache`,
//! `cover_cache`...) avec les clés `ttl_secs`, `capacity` et
//! `sweep_interval_secs`.

use anyhow::Result;
use serde_yaml::{Number, Value};
use std::time::Duration;
use voyoconfig::Config;

/// Réglages d'un cache
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheSettings {
    pub ttl: Duration,
    /// `None` : pas de borne
    pub capacity: Option<usize>,
    pub sweep_interval: Duration,
}

/// Trait d'extension pour lire les réglages de cache depuis `voyoconfig`
///
/// # Exemple
///
/// ```rust,ignore
/// use voyocache::CacheSettingsExt;
/// use voyoconfig::get_config;
///
/// let settings = get_config().get_cache_settings("cover_cache", defaults);
/// ```
pub trait CacheSettingsExt {
    /// # Arguments
    ///
    /// * `cache_type` - Section du cache (ex: "cover_cache")
    /// * `default` - Durée de vie si non configurée
    fn get_cache_ttl(&self, cache_type: &str, default: Duration) -> Duration;

    /// Capacité maximale ; 0 ou absence de clé donne `default`
    fn get_cache_capacity(&self, cache_type: &str, default: Option<usize>) -> Option<usize>;

    fn set_cache_capacity(&self, cache_type: &str, capacity: usize) -> Result<()>;

    fn get_cache_sweep_interval(&self, cache_type: &str, default: Duration) -> Duration;

    fn get_cache_settings(&self, cache_type: &str, default: CacheSettings) -> CacheSettings {
        CacheSettings {
            ttl: self.get_cache_ttl(cache_type, default.ttl),
            capacity: self.get_cache_capacity(cache_type, default.capacity),
            sweep_interval: self.get_cache_sweep_interval(cache_type, default.sweep_interval),
        }
    }
}

impl CacheSettingsExt for Config {
    fn get_cache_ttl(&self, cache_type: &str, default: Duration) -> Duration {
        self.get_secs(&[cache_type, "ttl_secs"], default)
    }

    fn get_cache_capacity(&self, cache_type: &str, default: Option<usize>) -> Option<usize> {
        match self.get_usize(&[cache_type, "capacity"], 0) {
            0 => default,
            n => Some(n),
        }
    }

    fn set_cache_capacity(&self, cache_type: &str, capacity: usize) -> Result<()> {
        self.set_value(&[cache_type, "capacity"], Value::Number(Number::from(capacity)))
    }

    fn get_cache_sweep_interval(&self, cache_type: &str, default: Duration) -> Duration {
        self.get_secs(&[cache_type, "sweep_interval_secs"], default)
    }
}
