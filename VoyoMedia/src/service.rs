//! Orchestration d'une requête média
//!
//! Ordre de traitement d'une demande de lecture :
//!
//! 1. décodage de l'identifiant client (aucune E/S)
//! 2. classement de la requête pour la garde : servie depuis le miroir, un
//!    cache chaud ou une résolution déjà en vol, elle est `General` ;
//!    sinon elle déclencherait une extraction et elle est `Expensive`
//! 3. garde anti-abus, puis rejet d'un identifiant invalide
//! 4. miroir local (audio seulement), sinon cache de résolution
//! 5. promotion asynchrone vers le miroir après une résolution audio

use crate::error::ServiceError;
use crate::prefetch::{PrefetchScheduler, WarmState};
use anyhow::Result;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use voyocache::CacheStats;
use voyoconfig::Config;
use voyocovers::{CoverArt, CoverCache, CoverCacheConfigExt};
use voyoextract::{
    ExtractConfigExt, MediaKind, QualityTier, ResolutionCache, ResolutionError, ResolutionKey,
    StreamDescriptor,
};
use voyoguard::{AbuseGuard, GuardConfigExt, GuardStats, RequestClass};
use voyoid::{SourceId, resolve_client_id};
use voyomirror::{MirrorConfigExt, MirrorPromoter, MirroredFile};
use voyoutils::TaskSupervisor;

/// Délai de connexion et de lecture du client de diffusion
pub const DEFAULT_STREAM_TIMEOUT: Duration = Duration::from_secs(30);

/// Origine des octets d'un média
#[derive(Debug, Clone)]
pub enum MediaLocation {
    /// Fichier complet du miroir local
    Mirror(MirroredFile),
    /// Flux amont résolu
    Remote(StreamDescriptor),
}

impl MediaLocation {
    pub fn is_local(&self) -> bool {
        matches!(self, MediaLocation::Mirror(_))
    }
}

/// Média localisé, prêt à être décrit ou diffusé
#[derive(Debug, Clone)]
pub struct LocatedMedia {
    pub source: SourceId,
    pub kind: MediaKind,
    pub quality: QualityTier,
    pub location: MediaLocation,
}

/// Compteurs exposés par `GET /api/v1/status`
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ServiceStatus {
    #[schema(value_type = Object)]
    pub resolutions: CacheStats,
    #[schema(value_type = Object)]
    pub covers: CacheStats,
    pub warming: usize,
    pub warmed: usize,
    #[schema(value_type = Object)]
    pub guard: GuardStats,
    /// Promotions réservées (en cours ou terminées)
    pub mirror_claims: usize,
    pub background_tasks: usize,
}

/// Composants partagés par tous les handlers
///
/// Chaque composant est un objet possédé, injecté ici ; aucun état global.
#[derive(Clone)]
pub struct MediaService {
    guard: Arc<AbuseGuard>,
    resolutions: ResolutionCache,
    promoter: Arc<MirrorPromoter>,
    covers: Arc<CoverCache>,
    prefetch: PrefetchScheduler,
    supervisor: TaskSupervisor,
    stream_client: reqwest::Client,
}

impl MediaService {
    pub fn new(
        guard: Arc<AbuseGuard>,
        resolutions: ResolutionCache,
        promoter: Arc<MirrorPromoter>,
        covers: Arc<CoverCache>,
        supervisor: TaskSupervisor,
        stream_timeout: Duration,
    ) -> Result<Self> {
        let stream_client = voyoextract::upstream::build_client(stream_timeout)?;
        let prefetch = PrefetchScheduler::new(resolutions.clone(), supervisor.clone());
        Ok(Self {
            guard,
            resolutions,
            promoter,
            covers,
            prefetch,
            supervisor,
            stream_client,
        })
    }

    /// Construit tous les composants depuis la configuration
    pub fn from_config(config: &Config, supervisor: TaskSupervisor) -> Result<Self> {
        let guard = config.create_abuse_guard();
        let resolutions = config.create_resolution_cache()?;
        let promoter = config.create_mirror_promoter(supervisor.clone())?;
        let covers = config.create_cover_cache()?;
        let stream_timeout = config.get_secs(&["proxy", "timeout_secs"], DEFAULT_STREAM_TIMEOUT);

        info!(
            providers = ?resolutions.pipeline().provider_names(),
            mirror = %promoter.store().dir().display(),
            "Media service configured"
        );
        Self::new(guard, resolutions, promoter, covers, supervisor, stream_timeout)
    }

    pub fn guard(&self) -> &Arc<AbuseGuard> {
        &self.guard
    }

    pub fn resolutions(&self) -> &ResolutionCache {
        &self.resolutions
    }

    pub fn promoter(&self) -> &Arc<MirrorPromoter> {
        &self.promoter
    }

    pub fn prefetcher(&self) -> &PrefetchScheduler {
        &self.prefetch
    }

    pub fn supervisor(&self) -> &TaskSupervisor {
        &self.supervisor
    }

    pub fn stream_client(&self) -> &reqwest::Client {
        &self.stream_client
    }

    /// Une clé déjà résolue ou en cours de résolution ne coûte rien
    fn classify(&self, key: &ResolutionKey) -> RequestClass {
        if self.resolutions.is_warm(key) || self.resolutions.is_in_flight(key) {
            RequestClass::General
        } else {
            RequestClass::Expensive
        }
    }

    async fn mirrored(&self, key: &ResolutionKey) -> Option<MirroredFile> {
        if key.kind != MediaKind::Audio {
            return None;
        }
        self.promoter.store().lookup(&key.source, key.quality).await
    }

    /// Localise un média pour un client
    ///
    /// # Arguments
    ///
    /// * `client` - Clé du client pour la garde (adresse IP)
    /// * `raw_id` - `MediaId` ou identifiant natif brut
    pub async fn locate(
        &self,
        client: &str,
        raw_id: &str,
        kind: MediaKind,
        quality: QualityTier,
    ) -> Result<LocatedMedia, ServiceError> {
        let key = resolve_client_id(raw_id)
            .ok()
            .map(|source| ResolutionKey::new(source, kind, quality));

        let (key, mirrored) = match key {
            Some(key) => {
                let mirrored = self.mirrored(&key).await;
                let class = if mirrored.is_some() {
                    RequestClass::General
                } else {
                    self.classify(&key)
                };
                self.guard.check(client, class)?;
                (key, mirrored)
            }
            None => {
                self.guard.check(client, RequestClass::General)?;
                return Err(ServiceError::InvalidIdentifier);
            }
        };

        if let Some(file) = mirrored {
            debug!(source = %key.source, "Serving from local mirror");
            return Ok(LocatedMedia {
                source: key.source,
                kind,
                quality,
                location: MediaLocation::Mirror(file),
            });
        }

        let descriptor = self
            .resolutions
            .resolve(key.clone())
            .await
            .map_err(|e| match e {
                ResolutionError::Exhausted => {
                    warn!(source = %key.source, kind = kind.as_str(), "Resolution exhausted");
                    ServiceError::ResolutionExhausted
                }
                ResolutionError::Internal(msg) => {
                    warn!(source = %key.source, "Resolution failed: {}", msg);
                    ServiceError::Internal
                }
            })?;

        if kind == MediaKind::Audio {
            self.promoter.promote(&key.source, quality, &descriptor);
        }

        Ok(LocatedMedia {
            source: key.source,
            kind,
            quality,
            location: MediaLocation::Remote(descriptor),
        })
    }

    /// Couverture d'un média ; toujours `General`
    pub async fn cover(&self, client: &str, raw_id: &str) -> Result<CoverArt, ServiceError> {
        self.guard.check(client, RequestClass::General)?;
        let source = resolve_client_id(raw_id).map_err(|_| ServiceError::InvalidIdentifier)?;

        self.covers.get(&source).await.map_err(|e| {
            debug!(%source, "Cover unavailable: {}", e);
            ServiceError::CoverUnavailable
        })
    }

    /// Déclenche un préchargement et rend l'état immédiatement
    pub fn prefetch(
        &self,
        client: &str,
        raw_id: &str,
        kind: MediaKind,
        quality: QualityTier,
    ) -> Result<WarmState, ServiceError> {
        let Ok(source) = resolve_client_id(raw_id) else {
            self.guard.check(client, RequestClass::General)?;
            return Err(ServiceError::InvalidIdentifier);
        };
        let key = ResolutionKey::new(source, kind, quality);

        self.guard.check(client, self.classify(&key))?;
        Ok(self.prefetch.warm(key))
    }

    /// État de préchargement ; n'est jamais coûteux
    pub fn prefetch_state(
        &self,
        client: &str,
        raw_id: &str,
        kind: MediaKind,
        quality: QualityTier,
    ) -> Result<WarmState, ServiceError> {
        self.guard.check(client, RequestClass::General)?;
        let source = resolve_client_id(raw_id).map_err(|_| ServiceError::InvalidIdentifier)?;
        Ok(self.prefetch.state(&ResolutionKey::new(source, kind, quality)))
    }

    pub fn status(&self) -> ServiceStatus {
        let (warming, warmed) = self.prefetch.counts();
        ServiceStatus {
            resolutions: self.resolutions.stats(),
            covers: self.covers.stats(),
            warming,
            warmed,
            guard: self.guard.stats(),
            mirror_claims: self.promoter.claimed_count(),
            background_tasks: self.supervisor.active(),
        }
    }

    /// Lance les balayages périodiques et la consolidation du miroir
    pub fn start_maintenance(&self, config: &Config) {
        let resolution_sweep = config.get_resolution_cache_settings().sweep_interval;
        let cover_sweep = config.get_cover_settings().cache.sweep_interval;
        let guard_sweep = self.guard.settings().sweep_interval;

        let resolutions = self.resolutions.clone();
        let prefetch = self.prefetch.clone();
        self.supervisor
            .spawn_periodic("resolution sweep", resolution_sweep, move || {
                let removed = resolutions.sweep();
                let forgotten = prefetch.sweep();
                if removed + forgotten > 0 {
                    debug!(removed, forgotten, "Swept expired resolutions");
                }
            });

        let covers = self.covers.clone();
        self.supervisor.spawn_periodic("cover sweep", cover_sweep, move || {
            covers.sweep();
        });

        let guard = self.guard.clone();
        self.supervisor.spawn_periodic("guard sweep", guard_sweep, move || {
            guard.sweep();
        });

        let store = self.promoter.store().clone();
        self.supervisor.spawn("mirror consolidation", async move {
            let removed = store.consolidate().await?;
            if removed > 0 {
                info!(removed, "Removed interrupted mirror downloads");
            }
            Ok::<(), std::io::Error>(())
        });
    }
}
