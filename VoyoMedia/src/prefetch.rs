//! Préchargement des résolutions
//!
//! Un client qui annonce la piste suivante déclenche `warm` : la résolution
//! part en tâche de fond et remplit le cache de résolution avant la lecture.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;
use voyoextract::{ResolutionCache, ResolutionKey};
use voyoutils::TaskSupervisor;

/// État de préchargement d'une clé
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum WarmState {
    Warming,
    Warmed,
    /// Aucun préchargement en cours ni valide
    Idle,
}

#[derive(Clone)]
pub struct PrefetchScheduler {
    cache: ResolutionCache,
    supervisor: TaskSupervisor,
    states: Arc<Mutex<HashMap<ResolutionKey, WarmState>>>,
}

fn relock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl PrefetchScheduler {
    pub fn new(cache: ResolutionCache, supervisor: TaskSupervisor) -> Self {
        Self {
            cache,
            supervisor,
            states: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Lance le préchargement et rend la main immédiatement
    ///
    /// La clé passe à `Warming`, puis `Warmed` en cas de succès ; elle est
    /// oubliée en cas d'échec. Un préchargement déjà en cours n'est pas
    /// relancé.
    pub fn warm(&self, key: ResolutionKey) -> WarmState {
        if self.cache.is_warm(&key) {
            relock(&self.states).insert(key, WarmState::Warmed);
            return WarmState::Warmed;
        }

        {
            let mut states = relock(&self.states);
            if states.get(&key) == Some(&WarmState::Warming) {
                return WarmState::Warming;
            }
            states.insert(key.clone(), WarmState::Warming);
        }

        let cache = self.cache.clone();
        let states = self.states.clone();
        self.supervisor.spawn(format!("prefetch {}", key.source), async move {
            let result = cache.resolve(key.clone()).await;
            let mut states = relock(&states);
            match result {
                Ok(_) => {
                    debug!(source = %key.source, "Prefetch warmed");
                    states.insert(key, WarmState::Warmed);
                    Ok(())
                }
                Err(e) => {
                    states.remove(&key);
                    Err(e)
                }
            }
        });

        WarmState::Warming
    }

    /// État courant
    ///
    /// Une clé préchargée dont la résolution a expiré redevient `Idle`.
    pub fn state(&self, key: &ResolutionKey) -> WarmState {
        let mut states = relock(&self.states);
        match states.get(key).copied() {
            Some(WarmState::Warmed) if !self.cache.is_warm(key) => {
                states.remove(key);
                WarmState::Idle
            }
            Some(state) => state,
            None => WarmState::Idle,
        }
    }

    /// Oublie les clés préchargées dont la résolution a expiré
    pub fn sweep(&self) -> usize {
        let mut states = relock(&self.states);
        let expired: Vec<ResolutionKey> = states
            .iter()
            .filter(|(k, s)| **s == WarmState::Warmed && !self.cache.is_warm(k))
            .map(|(k, _)| k.clone())
            .collect();
        for key in &expired {
            states.remove(key);
        }
        expired.len()
    }

    /// Nombre de clés `(warming, warmed)`
    pub fn counts(&self) -> (usize, usize) {
        let states = relock(&self.states);
        let warming = states.values().filter(|s| **s == WarmState::Warming).count();
        (warming, states.len() - warming)
    }
}
