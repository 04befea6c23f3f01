//! Two-tier cache manager with single-flight semantics
//!
//! Lookup order: in-memory tier, then persistent tier (hits repopulate
//! memory on the way out), then the supplied computation. Concurrent
//! callers for the same key share one in-flight computation through a
//! mutex-guarded map of shared futures; only the map mutation happens
//! under the lock, the computation itself polls outside it.
//!
//! Failed computations and error-stage outcomes are never stored, so a
//! transient downstream failure cannot be memoized.

use crate::key::CacheKey;
use crate::memory::MemoryCache;
use crate::persistent::PersistentStore;
use futures::future::{BoxFuture, FutureExt, Shared};
use logsift_core::{ClassificationOutcome, Error, Result, Stage};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

type SharedOutcome = std::result::Result<ClassificationOutcome, Arc<Error>>;
type InFlight = Shared<BoxFuture<'static, SharedOutcome>>;

/// Memoizes router computations across two tiers
#[derive(Clone)]
pub struct CacheManager {
    inner: Arc<ManagerInner>,
}

struct ManagerInner {
    memory: MemoryCache,
    persistent: Option<Arc<dyn PersistentStore>>,
    ttl: Duration,
    in_flight: Mutex<HashMap<CacheKey, InFlight>>,
}

impl CacheManager {
    /// Create a manager over an in-memory tier and an optional
    /// persistent tier; `ttl` applies to entries written to either
    pub fn new(
        memory: MemoryCache,
        persistent: Option<Arc<dyn PersistentStore>>,
        ttl: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(ManagerInner {
                memory,
                persistent,
                ttl,
                in_flight: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Fetch the outcome for `key`, invoking `compute` at most once per
    /// distinct key even under concurrent requests.
    pub async fn get_or_compute<F, Fut>(&self, key: CacheKey, compute: F) -> Result<ClassificationOutcome>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<ClassificationOutcome>> + Send + 'static,
    {
        if let Some(hit) = self.inner.memory.get(&key) {
            debug!(key = %key, "memory cache hit");
            return Ok(hit);
        }

        let shared = {
            let mut in_flight = self.inner.in_flight.lock();

            // A finished leader may have populated memory between the
            // lock-free check above and acquiring the map lock.
            if let Some(hit) = self.inner.memory.get(&key) {
                return Ok(hit);
            }

            if let Some(existing) = in_flight.get(&key) {
                debug!(key = %key, "joining in-flight computation");
                existing.clone()
            } else {
                let inner = Arc::clone(&self.inner);
                let flight_key = key.clone();
                let future: BoxFuture<'static, SharedOutcome> = async move {
                    let result = inner.lookup_or_compute(&flight_key, compute).await;
                    inner.in_flight.lock().remove(&flight_key);
                    result.map_err(Arc::new)
                }
                .boxed();
                let shared = future.shared();
                in_flight.insert(key.clone(), shared.clone());
                // Drive the computation on its own task: a caller that
                // gives up (deadline, drop) must not strand a half-run
                // future in the map, where it would block later retries.
                tokio::spawn(shared.clone());
                shared
            }
        };

        shared.await.map_err(Error::SharedCompute)
    }

    /// Entries currently held by the in-memory tier
    pub fn memory_len(&self) -> usize {
        self.inner.memory.len()
    }

    /// Drop the in-memory tier's contents (test isolation; the
    /// persistent tier is left untouched)
    pub fn clear_memory(&self) {
        self.inner.memory.clear();
    }
}

impl ManagerInner {
    async fn lookup_or_compute<F, Fut>(&self, key: &CacheKey, compute: F) -> Result<ClassificationOutcome>
    where
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<ClassificationOutcome>> + Send,
    {
        // Persistent tier: errors degrade to a miss, never fail the request
        if let Some(store) = &self.persistent {
            match store.get(key) {
                Ok(Some(outcome)) => {
                    debug!(key = %key, "persistent cache hit");
                    self.memory
                        .insert_with_ttl(key.clone(), outcome.clone(), self.ttl);
                    return Ok(outcome);
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(key = %key, error = %e, "persistent tier unavailable, treating as miss");
                }
            }
        }

        let outcome = compute().await?;

        if outcome.stage == Stage::Error {
            debug!(key = %key, "error-stage outcome not cached");
            return Ok(outcome);
        }

        self.memory
            .insert_with_ttl(key.clone(), outcome.clone(), self.ttl);
        if let Some(store) = &self.persistent {
            if let Err(e) = store.set(key, &outcome, self.ttl) {
                warn!(key = %key, error = %e, "failed to write persistent tier");
            }
        }

        Ok(outcome)
    }
}
