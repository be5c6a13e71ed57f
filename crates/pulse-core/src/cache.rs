use std::future::Future;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::time::Instant;

/// Single-slot, time-boxed memo for an upstream response.
///
/// Holds at most one value. A zero TTL disables the cache entirely: `get`
/// always misses and `insert` is a no-op. Concurrent misses may each call
/// the upstream; the last writer wins.
pub struct TtlCache<T> {
    ttl: Duration,
    slot: RwLock<Option<Entry<T>>>,
}

struct Entry<T> {
    value: T,
    stored_at: Instant,
}

impl<T: Clone> TtlCache<T> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            slot: RwLock::new(None),
        }
    }

    pub fn disabled() -> Self {
        Self::new(Duration::ZERO)
    }

    pub fn is_enabled(&self) -> bool {
        !self.ttl.is_zero()
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Return the cached value if it is younger than the TTL.
    pub async fn get(&self) -> Option<T> {
        if !self.is_enabled() {
            return None;
        }
        let guard = self.slot.read().await;
        guard
            .as_ref()
            .filter(|entry| entry.stored_at.elapsed() < self.ttl)
            .map(|entry| entry.value.clone())
    }

    pub async fn insert(&self, value: T) {
        if !self.is_enabled() {
            return;
        }
        *self.slot.write().await = Some(Entry {
            value,
            stored_at: Instant::now(),
        });
    }

    /// Serve from cache, or run `fetch` and remember a successful result.
    /// Errors are returned as-is and never cached.
    pub async fn get_or_try_fetch<F, Fut, E>(&self, fetch: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(hit) = self.get().await {
            tracing::debug!("response cache hit");
            return Ok(hit);
        }
        let value = fetch().await?;
        self.insert(value.clone()).await;
        Ok(value)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
