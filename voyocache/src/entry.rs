use std::time::Duration;
use tokio::time::Instant;

/// Valeur mise en cache avec son instant d'insertion et sa durée de vie
#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    pub value: T,
    pub inserted_at: Instant,
    pub ttl: Duration,
}

impl<T> CacheEntry<T> {
    pub fn new(value: T, ttl: Duration) -> Self {
        Self {
            value,
            inserted_at: Instant::now(),
            ttl,
        }
    }

    pub fn expires_at(&self) -> Instant {
        self.inserted_at + self.ttl
    }

    /// Expirée dès que `now >= inserted_at + ttl`
    pub fn is_expired_at(&self, now: Instant) -> bool {
        now >= self.expires_at()
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Instant::now())
    }
}
