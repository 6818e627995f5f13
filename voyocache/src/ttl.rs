use crate::CacheEntry;
use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;
use std::time::Duration;
use tokio::time::Instant;

struct Slot<V> {
    entry: CacheEntry<V>,
    seq: u64,
}

/// Table clé/valeur à expiration
///
/// - une entrée expirée n'est jamais retournée, même avant le balayage
/// - au-delà de `capacity`, l'entrée insérée le plus tôt est évincée
///   (ordre d'insertion, pas d'accès)
///
/// La structure n'est pas synchronisée : le propriétaire la place derrière
/// un `Mutex`.
pub struct TtlCache<K, V> {
    ttl: Duration,
    capacity: Option<usize>,
    entries: HashMap<K, Slot<V>>,
    order: BTreeMap<u64, K>,
    next_seq: u64,
}

impl<K, V> TtlCache<K, V>
where
    K: Clone + Eq + Hash,
    V: Clone,
{
    pub fn new(ttl: Duration, capacity: Option<usize>) -> Self {
        Self {
            ttl,
            capacity: capacity.map(|c| c.max(1)),
            entries: HashMap::new(),
            order: BTreeMap::new(),
            next_seq: 0,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    /// Valeur non expirée pour `key`
    ///
    /// Une entrée trouvée expirée est retirée au passage.
    pub fn get(&mut self, key: &K) -> Option<V> {
        let now = Instant::now();
        match self.entries.get(key) {
            Some(slot) if !slot.entry.is_expired_at(now) => Some(slot.entry.value.clone()),
            Some(_) => {
                self.remove(key);
                None
            }
            None => None,
        }
    }

    /// Vrai si une entrée non expirée existe
    pub fn contains(&self, key: &K) -> bool {
        let now = Instant::now();
        self.entries
            .get(key)
            .is_some_and(|slot| !slot.entry.is_expired_at(now))
    }

    /// Insère ou remplace `key`
    ///
    /// Retourne la clé évincée si la capacité a été dépassée.
    pub fn insert(&mut self, key: K, value: V) -> Option<K> {
        self.remove(&key);

        let seq = self.next_seq;
        self.next_seq += 1;
        self.order.insert(seq, key.clone());
        self.entries.insert(
            key,
            Slot {
                entry: CacheEntry::new(value, self.ttl),
                seq,
            },
        );

        match self.capacity {
            Some(cap) if self.entries.len() > cap => self.evict_oldest(),
            _ => None,
        }
    }

    fn evict_oldest(&mut self) -> Option<K> {
        let (_, key) = self.order.pop_first()?;
        self.entries.remove(&key);
        Some(key)
    }

    pub fn remove(&mut self, key: &K) -> Option<V> {
        let slot = self.entries.remove(key)?;
        self.order.remove(&slot.seq);
        Some(slot.entry.value)
    }

    /// Retire toutes les entrées expirées
    ///
    /// Les clés sont collectées avant toute suppression. Retourne le nombre
    /// d'entrées retirées.
    pub fn sweep_expired(&mut self) -> usize {
        let now = Instant::now();
        let expired: Vec<K> = self
            .entries
            .iter()
            .filter(|(_, slot)| slot.entry.is_expired_at(now))
            .map(|(k, _)| k.clone())
            .collect();

        for key in &expired {
            self.remove(key);
        }
        expired.len()
    }

    /// Nombre d'entrées stockées (expirées non balayées comprises)
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }
}
