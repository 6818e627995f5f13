use crate::TtlCache;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use serde::Serialize;
use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::JoinError;
use tracing::{debug, trace};

type InFlight<V, E> = Shared<BoxFuture<'static, Result<V, E>>>;

/// Compteurs exposés par `/api/v1/status`
#[derive(Debug, Clone, Default, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub in_flight: usize,
    pub hits: u64,
    pub misses: u64,
    pub coalesced: u64,
}

struct Inner<K, V, E> {
    store: Mutex<TtlCache<K, V>>,
    in_flight: Mutex<HashMap<K, InFlight<V, E>>>,
    hits: AtomicU64,
    misses: AtomicU64,
    coalesced: AtomicU64,
}

struct InFlightSlot<K: Eq + Hash, V, E> {
    inner: Arc<Inner<K, V, E>>,
    key: K,
}

impl<K: Eq + Hash, V, E> Drop for InFlightSlot<K, V, E> {
    fn drop(&mut self) {
        relock(&self.inner.in_flight).remove(&self.key);
    }
}

/// Cache à expiration avec fusion des requêtes concurrentes
///
/// Pour une clé donnée, au plus une récupération amont est en cours. Elle
/// tourne dans une tâche tokio détachée : l'abandon d'un appelant (client
/// déconnecté) ne l'annule pas pour les autres. À l'issue de la tâche, un
/// succès est mis en cache, l'entrée en vol est retirée dans tous les cas et
/// le même résultat est rendu à chaque appelant. Les échecs ne sont jamais
/// mis en cache.
pub struct CoalescingCache<K, V, E> {
    inner: Arc<Inner<K, V, E>>,
}

impl<K, V, E> Clone for CoalescingCache<K, V, E> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

fn relock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<K, V, E> CoalescingCache<K, V, E>
where
    K: Clone + Eq + Hash + Send + Sync + std::fmt::Debug + 'static,
    V: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + From<JoinError> + 'static,
{
    /// # Arguments
    ///
    /// * `ttl` - Durée de vie des entrées
    /// * `capacity` - Nombre maximal d'entrées, `None` pour illimité
    pub fn new(ttl: Duration, capacity: Option<usize>) -> Self {
        Self {
            inner: Arc::new(Inner {
                store: Mutex::new(TtlCache::new(ttl, capacity)),
                in_flight: Mutex::new(HashMap::new()),
                hits: AtomicU64::new(0),
                misses: AtomicU64::new(0),
                coalesced: AtomicU64::new(0),
            }),
        }
    }

    pub fn ttl(&self) -> Duration {
        relock(&self.inner.store).ttl()
    }

    /// Retourne la valeur en cache ou la récupère via `fetch`
    ///
    /// `fetch` n'est appelée que si aucune entrée valide n'existe et
    /// qu'aucune récupération n'est déjà en cours pour `key`.
    pub async fn get_or_fetch<F, Fut>(&self, key: K, fetch: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
    {
        if let Some(value) = relock(&self.inner.store).get(&key) {
            self.inner.hits.fetch_add(1, Ordering::Relaxed);
            trace!(?key, "Cache hit");
            return Ok(value);
        }

        let shared = {
            let mut in_flight = relock(&self.inner.in_flight);

            // une tâche a pu se terminer entre les deux verrous
            if let Some(value) = relock(&self.inner.store).get(&key) {
                self.inner.hits.fetch_add(1, Ordering::Relaxed);
                return Ok(value);
            }

            if let Some(existing) = in_flight.get(&key) {
                self.inner.coalesced.fetch_add(1, Ordering::Relaxed);
                debug!(?key, "Attaching to in-flight fetch");
                existing.clone()
            } else {
                self.inner.misses.fetch_add(1, Ordering::Relaxed);
                debug!(?key, "Cache miss, starting fetch");
                let shared = self.spawn_fetch(key.clone(), fetch());
                in_flight.insert(key, shared.clone());
                shared
            }
        };

        shared.await
    }

    fn spawn_fetch<Fut>(&self, key: K, work: Fut) -> InFlight<V, E>
    where
        Fut: Future<Output = Result<V, E>> + Send + 'static,
    {
        let inner = self.inner.clone();
        let handle = tokio::spawn(async move {
            // retire l'entrée en vol même si `work` panique
            let slot = InFlightSlot {
                inner: inner.clone(),
                key: key.clone(),
            };
            let result = work.await;
            if let Ok(value) = &result {
                relock(&inner.store).insert(key, value.clone());
            }
            drop(slot);
            result
        });

        handle
            .map(|joined| match joined {
                Ok(result) => result,
                Err(e) => Err(E::from(e)),
            })
            .boxed()
            .shared()
    }

    /// Valeur en cache sans déclencher de récupération
    pub fn peek(&self, key: &K) -> Option<V> {
        relock(&self.inner.store).get(key)
    }

    /// Vrai si une entrée valide existe
    pub fn contains(&self, key: &K) -> bool {
        relock(&self.inner.store).contains(key)
    }

    /// Vrai si une récupération est en cours pour `key`
    pub fn is_in_flight(&self, key: &K) -> bool {
        relock(&self.inner.in_flight).contains_key(key)
    }

    /// Insère directement une valeur
    pub fn insert(&self, key: K, value: V) {
        relock(&self.inner.store).insert(key, value);
    }

    pub fn invalidate(&self, key: &K) -> Option<V> {
        relock(&self.inner.store).remove(key)
    }

    /// Retire les entrées expirées, retourne leur nombre
    pub fn sweep(&self) -> usize {
        let removed = relock(&self.inner.store).sweep_expired();
        if removed > 0 {
            debug!(removed, "Swept expired cache entries");
        }
        removed
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: relock(&self.inner.store).len(),
            in_flight: relock(&self.inner.in_flight).len(),
            hits: self.inner.hits.load(Ordering::Relaxed),
            misses: self.inner.misses.load(Ordering::Relaxed),
            coalesced: self.inner.coalesced.load(Ordering::Relaxed),
        }
    }
}
