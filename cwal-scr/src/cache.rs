// ABOUTME: Caching decorator for any Fetch implementation.
// ABOUTME: Memoizes successful JSON responses per endpoint for a fixed time-to-live.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde_json::Value;
use tokio::time::Instant;

use crate::{ClientError, Fetch};

/// Default lifetime of a cached response.
pub const DEFAULT_TTL: Duration = Duration::from_secs(30);

struct CacheEntry {
    stored_at: Instant,
    value: Value,
}

/// Wraps a fetcher and answers repeated requests from memory while fresh.
/// Failed requests are never cached.
pub struct CachedFetch<F> {
    inner: F,
    ttl: Duration,
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl<F: Fetch> CachedFetch<F> {
    pub fn new(inner: F, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn inner(&self) -> &F {
        &self.inner
    }

    /// Drop every cached response.
    pub fn clear(&self) {
        self.entries().clear();
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, CacheEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lookup(&self, endpoint: &str) -> Option<Value> {
        let mut entries = self.entries();
        match entries.get(endpoint) {
            Some(entry) if entry.stored_at.elapsed() < self.ttl => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(endpoint);
                None
            }
            None => None,
        }
    }
}

impl<F: Fetch> Fetch for CachedFetch<F> {
    async fn get_json(&self, endpoint: &str) -> Result<Value, ClientError> {
        if let Some(value) = self.lookup(endpoint) {
            tracing::trace!("cache hit for {endpoint}");
            return Ok(value);
        }

        let value = self.inner.get_json(endpoint).await?;
        self.entries().insert(
            endpoint.to_string(),
            CacheEntry {
                stored_at: Instant::now(),
                value: value.clone(),
            },
        );
        Ok(value)
    }
}
