//! Promotion d'une résolution réussie vers le miroir local
//!
//! Déclenchée au premier succès du pipeline pour un audio non encore copié.
//! Le téléchargement tourne en tâche supervisée : la requête déclenchante
//! n'attend jamais et n'est jamais affectée par un échec.

use crate::error::PromotionFailure;
use crate::store::{MirrorStore, extension_for_mime};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{info, warn};
use voyoextract::upstream::build_client;
use voyoextract::{MediaKind, ProviderError, QualityTier, StreamDescriptor, fetch_range};
use voyoid::SourceId;
use voyoutils::TaskSupervisor;

/// Issue d'une promotion menée à son terme
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromotionOutcome {
    Written,
    /// Une copie existait déjà
    AlreadyMirrored,
}

type ClaimKey = (SourceId, QualityTier);

pub struct MirrorPromoter {
    store: Arc<MirrorStore>,
    client: reqwest::Client,
    download_timeout: Duration,
    supervisor: TaskSupervisor,
    claimed: Arc<Mutex<HashSet<ClaimKey>>>,
}

fn relock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MirrorPromoter {
    /// # Arguments
    ///
    /// * `store` - Miroir de destination
    /// * `supervisor` - Propriétaire des tâches de téléchargement
    /// * `download_timeout` - Durée maximale d'un téléchargement complet
    pub fn new(
        store: Arc<MirrorStore>,
        supervisor: TaskSupervisor,
        download_timeout: Duration,
    ) -> Result<Self, ProviderError> {
        Ok(Self {
            store,
            client: build_client(Duration::from_secs(30))?,
            download_timeout,
            supervisor,
            claimed: Arc::new(Mutex::new(HashSet::new())),
        })
    }

    pub fn store(&self) -> &Arc<MirrorStore> {
        &self.store
    }

    /// Vrai si une promotion a été réservée pour ce couple
    pub fn is_claimed(&self, source: &SourceId, quality: QualityTier) -> bool {
        relock(&self.claimed).contains(&(source.clone(), quality))
    }

    /// Nombre de promotions réservées (en cours ou réussies)
    pub fn claimed_count(&self) -> usize {
        relock(&self.claimed).len()
    }

    /// Lance la promotion en tâche de fond
    ///
    /// Retourne `true` si une tâche a été lancée. Ne fait rien pour la vidéo
    /// ou si une promotion a déjà été réservée pour ce couple. Une promotion
    /// qui échoue libère sa réservation.
    pub fn promote(&self, source: &SourceId, quality: QualityTier, descriptor: &StreamDescriptor) -> bool {
        if descriptor.kind != MediaKind::Audio {
            return false;
        }

        let key = (source.clone(), quality);
        if !relock(&self.claimed).insert(key.clone()) {
            return false;
        }

        let store = self.store.clone();
        let client = self.client.clone();
        let claimed = self.claimed.clone();
        let timeout = self.download_timeout;
        let descriptor = descriptor.clone();
        let source = source.clone();

        self.supervisor.spawn(format!("mirror {}", source), async move {
            let result = match tokio::time::timeout(
                timeout,
                download_to_store(&store, &client, &source, quality, &descriptor),
            )
            .await
            {
                Ok(result) => result,
                Err(_) => {
                    // l'écriture interrompue laisse son `.part`
                    let extension = extension_for_mime(&descriptor.mime_type);
                    store.discard_part(&source, quality, extension).await;
                    Err(PromotionFailure::Timeout(timeout))
                }
            };

            match result {
                Ok(PromotionOutcome::Written) => {
                    info!(%source, quality = quality.as_str(), "Promoted to local mirror");
                    Ok(())
                }
                Ok(PromotionOutcome::AlreadyMirrored) => Ok(()),
                Err(e) => {
                    warn!(%source, quality = quality.as_str(), "Mirror promotion failed: {}", e);
                    relock(&claimed).remove(&key);
                    Err(e)
                }
            }
        });
        true
    }

    /// Exécute la promotion immédiatement, sans réservation
    pub async fn promote_now(
        &self,
        source: &SourceId,
        quality: QualityTier,
        descriptor: &StreamDescriptor,
    ) -> Result<PromotionOutcome, PromotionFailure> {
        download_to_store(&self.store, &self.client, source, quality, descriptor).await
    }
}

async fn download_to_store(
    store: &MirrorStore,
    client: &reqwest::Client,
    source: &SourceId,
    quality: QualityTier,
    descriptor: &StreamDescriptor,
) -> Result<PromotionOutcome, PromotionFailure> {
    if store.contains(source, quality).await {
        return Ok(PromotionOutcome::AlreadyMirrored);
    }

    let upstream = fetch_range(client, &descriptor.playable_url, None).await?;
    let extension = extension_for_mime(&descriptor.mime_type);

    let written = store
        .write_stream(source, quality, extension, upstream.content_length, upstream.body)
        .await?;

    Ok(if written {
        PromotionOutcome::Written
    } else {
        PromotionOutcome::AlreadyMirrored
    })
}
