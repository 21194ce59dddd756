// cache.rs - Reference-counted resource cache with load coalescing
//
// Each key is in one of two states: Loading (a pending marker other callers
// block on) or Ready (a shared value plus its handle count). Lock order is
// always `slots` before a pending load's `outcome`.

use cadence_core::HashKey;
use fnv::FnvHashMap;
use parking_lot::{Condvar, Mutex};
use std::error::Error;
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;
use std::time::{Duration, Instant};

type LoadOutcome<T> = Result<Arc<T>, CacheError>;

#[derive(Debug, Clone, thiserror::Error)]
pub enum CacheError {
    #[error("failed to load resource {key}: {source}")]
    LoadFailed {
        key: HashKey,
        #[source]
        source: Arc<dyn Error + Send + Sync>,
    },

    #[error("load of resource {key} was cancelled")]
    Cancelled { key: HashKey },

    #[error("timed out waiting for resource {key}")]
    Timeout { key: HashKey },
}

impl CacheError {
    pub fn key(&self) -> HashKey {
        match self {
            CacheError::LoadFailed { key, .. }
            | CacheError::Cancelled { key }
            | CacheError::Timeout { key } => *key,
        }
    }
}

struct Pending<T> {
    outcome: Mutex<Option<LoadOutcome<T>>>,
    ready: Condvar,
}

enum Slot<T> {
    Loading {
        pending: Arc<Pending<T>>,
        /// Callers blocked on `pending`; each gets a count when it resolves.
        waiters: usize,
    },
    Ready {
        value: Arc<T>,
        refs: usize,
    },
}

struct Shared<T> {
    slots: Mutex<FnvHashMap<HashKey, Slot<T>>>,
}

impl<T> Shared<T> {
    fn retain(&self, key: HashKey, value: &Arc<T>) {
        let mut slots = self.slots.lock();
        if let Some(Slot::Ready { value: held, refs }) = slots.get_mut(&key) {
            if Arc::ptr_eq(held, value) {
                *refs += 1;
            }
        }
    }

    fn release(&self, key: HashKey, value: &Arc<T>) {
        let mut slots = self.slots.lock();
        let evict = match slots.get_mut(&key) {
            Some(Slot::Ready { value: held, refs }) if Arc::ptr_eq(held, value) => {
                *refs -= 1;
                *refs == 0
            }
            _ => false,
        };
        if evict {
            slots.remove(&key);
            tracing::debug!(%key, "resource evicted");
        }
    }
}

/// Thread-safe cache of shared resources.
///
/// Cloning the cache is cheap; all clones see the same entries.
pub struct ResourceCache<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for ResourceCache<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> Default for ResourceCache<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ResourceCache<T> {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                slots: Mutex::new(FnvHashMap::default()),
            }),
        }
    }

    /// Get the resource for `key`, running `loader` if it is not resident.
    ///
    /// If another caller is already loading `key`, this blocks until that
    /// load resolves and shares its result instead of loading again. On
    /// failure nothing is cached, so the next call retries.
    pub fn acquire<F, E>(&self, key: HashKey, loader: F) -> Result<ResourceHandle<T>, CacheError>
    where
        F: FnOnce() -> Result<T, E>,
        E: Into<Box<dyn Error + Send + Sync>>,
    {
        self.acquire_inner(key, loader, None)
    }

    /// Like [`acquire`](Self::acquire), but gives up with
    /// [`CacheError::Timeout`] if a load started by another caller has not
    /// resolved within `timeout`. A loader run by this call is never interrupted.
    pub fn acquire_timeout<F, E>(
        &self,
        key: HashKey,
        loader: F,
        timeout: Duration,
    ) -> Result<ResourceHandle<T>, CacheError>
    where
        F: FnOnce() -> Result<T, E>,
        E: Into<Box<dyn Error + Send + Sync>>,
    {
        self.acquire_inner(key, loader, Some(timeout))
    }

    /// Handle to an already resident resource, without loading.
    pub fn get(&self, key: HashKey) -> Option<ResourceHandle<T>> {
        let mut slots = self.shared.slots.lock();
        match slots.get_mut(&key) {
            Some(Slot::Ready { value, refs }) => {
                *refs += 1;
                Some(self.handle(key, Arc::clone(value)))
            }
            _ => None,
        }
    }

    /// Give a handle back. Same as dropping it.
    pub fn release(&self, handle: ResourceHandle<T>) {
        drop(handle);
    }

    /// Fail every in-flight load with [`CacheError::Cancelled`].
    ///
    /// Waiters wake immediately; results that loaders produce afterwards
    /// are discarded. Returns the number of loads cancelled.
    pub fn cancel_pending(&self) -> usize {
        let mut slots = self.shared.slots.lock();
        let loading: Vec<HashKey> = slots
            .iter()
            .filter(|(_, slot)| matches!(slot, Slot::Loading { .. }))
            .map(|(key, _)| *key)
            .collect();

        for key in &loading {
            if let Some(Slot::Loading { pending, waiters }) = slots.remove(key) {
                *pending.outcome.lock() = Some(Err(CacheError::Cancelled { key: *key }));
                pending.ready.notify_all();
                tracing::debug!(%key, waiters, "load cancelled");
            }
        }
        if !loading.is_empty() {
            tracing::info!(cancelled = loading.len(), "cancelled pending loads");
        }
        loading.len()
    }

    /// Number of resident resources.
    pub fn len(&self) -> usize {
        self.shared
            .slots
            .lock()
            .values()
            .filter(|slot| matches!(slot, Slot::Ready { .. }))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, key: HashKey) -> bool {
        matches!(self.shared.slots.lock().get(&key), Some(Slot::Ready { .. }))
    }

    pub fn is_loading(&self, key: HashKey) -> bool {
        matches!(self.shared.slots.lock().get(&key), Some(Slot::Loading { .. }))
    }

    /// Outstanding handles for `key`; 0 when not resident.
    pub fn ref_count(&self, key: HashKey) -> usize {
        match self.shared.slots.lock().get(&key) {
            Some(Slot::Ready { refs, .. }) => *refs,
            _ => 0,
        }
    }

    fn handle(&self, key: HashKey, value: Arc<T>) -> ResourceHandle<T> {
        ResourceHandle {
            key,
            value,
            shared: Arc::clone(&self.shared),
        }
    }

    fn acquire_inner<F, E>(
        &self,
        key: HashKey,
        loader: F,
        timeout: Option<Duration>,
    ) -> Result<ResourceHandle<T>, CacheError>
    where
        F: FnOnce() -> Result<T, E>,
        E: Into<Box<dyn Error + Send + Sync>>,
    {
        let pending = {
            let mut slots = self.shared.slots.lock();
            let pending = match slots.get_mut(&key) {
                Some(Slot::Ready { value, refs }) => {
                    *refs += 1;
                    return Ok(self.handle(key, Arc::clone(value)));
                }
                Some(Slot::Loading { pending, waiters }) => {
                    *waiters += 1;
                    let pending = Arc::clone(pending);
                    drop(slots);
                    tracing::trace!(%key, "waiting on in-flight load");
                    return self.wait(key, pending, timeout);
                }
                None => {
                    let pending = Arc::new(Pending {
                        outcome: Mutex::new(None),
                        ready: Condvar::new(),
                    });
                    slots.insert(
                        key,
                        Slot::Loading {
                            pending: Arc::clone(&pending),
                            waiters: 0,
                        },
                    );
                    pending
                }
            };
            pending
        };

        let mut guard = LoadGuard {
            cache: self,
            key,
            pending: &pending,
            finished: false,
        };
        let started = Instant::now();
        let result = loader().map(Arc::new).map_err(|err| {
            let source: Box<dyn Error + Send + Sync> = err.into();
            CacheError::LoadFailed {
                key,
                source: Arc::from(source),
            }
        });
        guard.finished = true;

        match &result {
            Ok(_) => tracing::debug!(
                %key,
                elapsed_us = started.elapsed().as_micros() as u64,
                "resource loaded"
            ),
            Err(err) => tracing::warn!(%key, error = %err, "resource load failed"),
        }
        self.complete(key, &pending, result)
    }

    /// Publish a load result to the cache and to every waiter.
    fn complete(
        &self,
        key: HashKey,
        pending: &Arc<Pending<T>>,
        result: LoadOutcome<T>,
    ) -> Result<ResourceHandle<T>, CacheError> {
        let mut slots = self.shared.slots.lock();
        let mut outcome = pending.outcome.lock();
        if outcome.is_some() {
            tracing::debug!(%key, "discarding result of cancelled load");
            return Err(CacheError::Cancelled { key });
        }

        let waiters = match slots.get(&key) {
            Some(Slot::Loading {
                pending: held,
                waiters,
            }) if Arc::ptr_eq(held, pending) => *waiters,
            _ => 0,
        };
        match &result {
            Ok(value) => {
                slots.insert(
                    key,
                    Slot::Ready {
                        value: Arc::clone(value),
                        refs: waiters + 1,
                    },
                );
            }
            Err(_) => {
                slots.remove(&key);
            }
        }

        *outcome = Some(result.clone());
        pending.ready.notify_all();
        result.map(|value| self.handle(key, value))
    }

    fn wait(
        &self,
        key: HashKey,
        pending: Arc<Pending<T>>,
        timeout: Option<Duration>,
    ) -> Result<ResourceHandle<T>, CacheError> {
        let deadline = timeout.map(|timeout| Instant::now() + timeout);
        {
            let mut outcome = pending.outcome.lock();
            loop {
                if let Some(result) = outcome.as_ref() {
                    return result.clone().map(|value| self.handle(key, value));
                }
                match deadline {
                    None => pending.ready.wait(&mut outcome),
                    Some(deadline) => {
                        if pending.ready.wait_until(&mut outcome, deadline).timed_out() {
                            break;
                        }
                    }
                }
            }
        }

        // The load may have resolved between the timeout and taking `slots`;
        // if it did, this caller was already counted.
        let mut slots = self.shared.slots.lock();
        let outcome = pending.outcome.lock();
        if let Some(result) = outcome.as_ref() {
            return result.clone().map(|value| self.handle(key, value));
        }
        if let Some(Slot::Loading { pending: held, waiters }) = slots.get_mut(&key) {
            if Arc::ptr_eq(held, &pending) {
                *waiters -= 1;
            }
        }
        tracing::warn!(%key, "timed out waiting for resource");
        Err(CacheError::Timeout { key })
    }
}

/// Resolves the pending marker if the loader unwinds, so waiters never hang.
struct LoadGuard<'a, T> {
    cache: &'a ResourceCache<T>,
    key: HashKey,
    pending: &'a Arc<Pending<T>>,
    finished: bool,
}

impl<T> Drop for LoadGuard<'_, T> {
    fn drop(&mut self) {
        if !self.finished {
            tracing::error!(key = %self.key, "resource loader panicked");
            let source: Box<dyn Error + Send + Sync> = "loader panicked".into();
            let _ = self.cache.complete(
                self.key,
                self.pending,
                Err(CacheError::LoadFailed {
                    key: self.key,
                    source: Arc::from(source),
                }),
            );
        }
    }
}

/// Counted reference to a cached resource.
///
/// Cloning takes another count; dropping gives it back, and the last drop
/// evicts the entry.
pub struct ResourceHandle<T> {
    key: HashKey,
    value: Arc<T>,
    shared: Arc<Shared<T>>,
}

impl<T> ResourceHandle<T> {
    pub fn key(&self) -> HashKey {
        self.key
    }

    /// True if both handles refer to the same loaded value.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.value, &other.value)
    }
}

impl<T> Deref for ResourceHandle<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}

impl<T> Clone for ResourceHandle<T> {
    fn clone(&self) -> Self {
        self.shared.retain(self.key, &self.value);
        Self {
            key: self.key,
            value: Arc::clone(&self.value),
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> Drop for ResourceHandle<T> {
    fn drop(&mut self) {
        self.shared.release(self.key, &self.value);
    }
}

impl<T> fmt::Debug for ResourceHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceHandle")
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}
