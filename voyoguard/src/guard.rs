use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, info};

/// Classe d'une requête vis-à-vis de la garde
///
/// Une requête servie depuis un cache (ou rattachée à une résolution déjà en
/// cours) est `General`, même si son chemin aurait pu être coûteux.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestClass {
    General,
    Expensive,
}

/// Plafond franchi
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Ceiling {
    General,
    ClientExpensive,
    GlobalExpensive,
}

/// Rejet de la garde
///
/// `retry_after` est le temps restant dans la fenêtre du plafond franchi.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Too many requests")]
pub struct RateLimited {
    pub ceiling: Ceiling,
    pub retry_after: Duration,
}

#[derive(Debug, Clone)]
pub struct GuardSettings {
    pub window: Duration,
    pub general_ceiling: u32,
    pub expensive_ceiling: u32,
    pub global_expensive_ceiling: u32,
    pub sweep_interval: Duration,
}

impl Default for GuardSettings {
    fn default() -> Self {
        Self {
            window: Duration::from_secs(60),
            general_ceiling: 120,
            expensive_ceiling: 10,
            global_expensive_ceiling: 300,
            sweep_interval: Duration::from_secs(300),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct GuardStats {
    pub tracked_clients: usize,
    pub global_expensive_count: u32,
}

#[derive(Debug)]
struct RateWindow {
    window_start: Instant,
    general_count: u32,
    expensive_count: u32,
}

impl RateWindow {
    fn new(now: Instant) -> Self {
        Self {
            window_start: now,
            general_count: 0,
            expensive_count: 0,
        }
    }

    fn roll(&mut self, now: Instant, window: Duration) {
        if now.duration_since(self.window_start) >= window {
            *self = Self::new(now);
        }
    }

    fn remaining(&self, now: Instant, window: Duration) -> Duration {
        window.saturating_sub(now.duration_since(self.window_start))
    }
}

struct GuardState {
    clients: HashMap<String, RateWindow>,
    global: RateWindow,
}

/// Limiteur partagé par tous les handlers
///
/// Tout l'état est derrière un seul `Mutex`, jamais tenu à travers un `await`.
pub struct AbuseGuard {
    settings: GuardSettings,
    state: Mutex<GuardState>,
}

impl AbuseGuard {
    pub fn new(settings: GuardSettings) -> Self {
        info!(
            window_secs = settings.window.as_secs(),
            general = settings.general_ceiling,
            expensive = settings.expensive_ceiling,
            global_expensive = settings.global_expensive_ceiling,
            "Abuse guard configured"
        );
        Self {
            settings,
            state: Mutex::new(GuardState {
                clients: HashMap::new(),
                global: RateWindow::new(Instant::now()),
            }),
        }
    }

    pub fn settings(&self) -> &GuardSettings {
        &self.settings
    }

    fn lock(&self) -> MutexGuard<'_, GuardState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Évalue puis comptabilise une requête
    ///
    /// Tous les plafonds sont vérifiés avant toute écriture : une requête
    /// coûteuse incrémente les compteurs client et global ensemble, ou aucun.
    pub fn check(&self, client: &str, class: RequestClass) -> Result<(), RateLimited> {
        let now = Instant::now();
        let window = self.settings.window;
        let mut guard = self.lock();
        let state = &mut *guard;

        state.global.roll(now, window);
        let entry = state
            .clients
            .entry(client.to_string())
            .or_insert_with(|| RateWindow::new(now));
        entry.roll(now, window);

        if entry.general_count >= self.settings.general_ceiling {
            return Err(self.reject(client, Ceiling::General, entry.remaining(now, window)));
        }

        if class == RequestClass::Expensive {
            if entry.expensive_count >= self.settings.expensive_ceiling {
                return Err(self.reject(
                    client,
                    Ceiling::ClientExpensive,
                    entry.remaining(now, window),
                ));
            }
            if state.global.expensive_count >= self.settings.global_expensive_ceiling {
                return Err(self.reject(
                    client,
                    Ceiling::GlobalExpensive,
                    state.global.remaining(now, window),
                ));
            }
        }

        entry.general_count += 1;
        if class == RequestClass::Expensive {
            entry.expensive_count += 1;
            state.global.expensive_count += 1;
        }

        Ok(())
    }

    fn reject(&self, client: &str, ceiling: Ceiling, retry_after: Duration) -> RateLimited {
        debug!(client, ?ceiling, retry_after_ms = retry_after.as_millis() as u64, "Request rate limited");
        RateLimited {
            ceiling,
            retry_after,
        }
    }

    /// Supprime les fenêtres client vieilles de plus de deux fenêtres
    ///
    /// Les clés à supprimer sont collectées avant toute suppression.
    /// Retourne le nombre d'entrées retirées.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let max_age = self.settings.window * 2;
        let mut state = self.lock();

        let stale: Vec<String> = state
            .clients
            .iter()
            .filter(|(_, w)| now.duration_since(w.window_start) > max_age)
            .map(|(k, _)| k.clone())
            .collect();

        for key in &stale {
            state.clients.remove(key);
        }

        if !stale.is_empty() {
            debug!(removed = stale.len(), "Swept stale rate windows");
        }
        stale.len()
    }

    pub fn stats(&self) -> GuardStats {
        let state = self.lock();
        GuardStats {
            tracked_clients: state.clients.len(),
            global_expensive_count: state.global.expensive_count,
        }
    }
}
