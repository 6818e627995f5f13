//! # voyocache - Caches mémoire à durée de vie
//!
//! Briques communes au cache de résolution et au cache d'assets :
//!
//! - [`CacheEntry`] : valeur horodatée avec sa durée de vie
//! - [`TtlCache`] : table à expiration, bornée en option (éviction du plus
//!   ancien inséré)
//! - [`CoalescingCache`] : `TtlCache` + fusion des requêtes concurrentes sur
//!   une même clé (une seule exécution amont à la fois)
//! - [`CacheSettingsExt`] : lecture des réglages depuis la configuration
//!
//! Les horloges sont celles de `tokio::time`, ce qui permet de tester
//! l'expiration avec `tokio::time::pause()`.

mod coalescing;
mod config_ext;
mod entry;
mod ttl;

pub use coalescing::{CacheStats, CoalescingCache};
pub use config_ext::{CacheSettings, CacheSettingsExt};
pub use entry::CacheEntry;
pub use ttl::TtlCache;
