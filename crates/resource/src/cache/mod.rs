//! Coalescing asset cache
//!
//! [`ResourceCache`] loads each key at most once at a time. Requests that
//! arrive while a load is pending are queued behind it and all receive the
//! same [`AssetHandle`] when it completes. Loaded keys are then served
//! synchronously until released or cleared. Failures are never cached.

mod handle;
mod loader;

pub use handle::AssetHandle;
pub use loader::Loader;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::oneshot;

use crate::config::CacheConfig;
use crate::error::{Error, Result, validate_key};
use crate::pool::{InstanceFactory, Poolable};

type Continuation<A> = Box<dyn FnOnce(Result<AssetHandle<A>>) + Send>;

// ---------------------------------------------------------------------------
// Entry state
// ---------------------------------------------------------------------------

enum Slot<A> {
    Pending {
        ticket: u64,
        continuations: Vec<Continuation<A>>,
    },
    Loaded(AssetHandle<A>),
}

/// Observable state of a cache key.
///
/// A failed load leaves no entry behind, so a key that is neither pending
/// nor loaded reports `None` from [`ResourceCache::state`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    /// A load has been issued and has not completed
    Pending,
    /// The asset is cached
    Loaded,
}

/// Counters describing cache traffic since construction
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Requests answered from a loaded entry
    pub hits: u64,
    /// Loads handed to the loader
    pub loads_issued: u64,
    /// Requests queued behind a pending load
    pub coalesced: u64,
    /// Loads that completed with an error
    pub failures: u64,
    /// Successful loads discarded because the key was already loaded
    pub duplicates: u64,
    /// Successful loads discarded because their entry was cleared
    pub orphaned: u64,
    /// Entries released explicitly or by `clear`
    pub released: u64,
    /// Keys currently loaded
    pub loaded: usize,
    /// Keys currently pending
    pub pending: usize,
}

enum Admission<A> {
    Hit(AssetHandle<A>, Continuation<A>),
    Queued,
    Issue(u64),
}

enum Completion<A> {
    Fulfilled {
        continuations: Vec<Continuation<A>>,
        superseded: bool,
    },
    Failed(Vec<Continuation<A>>),
    Duplicate,
    Stale,
    Orphaned,
}

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

struct CacheInner<L: Loader> {
    loader: L,
    config: CacheConfig,
    entries: Mutex<HashMap<String, Slot<L::Asset>>>,
    next_ticket: AtomicU64,
    stats: Mutex<CacheStats>,
}

impl<L: Loader> CacheInner<L> {
    fn record(&self, update: impl FnOnce(&mut CacheStats)) {
        update(&mut self.stats.lock());
    }

    fn complete(&self, key: &str, ticket: u64, outcome: Result<L::Asset>) {
        match outcome {
            Ok(asset) => self.complete_success(key, ticket, AssetHandle::new(asset)),
            Err(error) => self.complete_failure(key, ticket, error),
        }
    }

    fn complete_success(&self, key: &str, ticket: u64, handle: AssetHandle<L::Asset>) {
        let completion = {
            let mut entries = self.entries.lock();
            match entries.remove(key) {
                Some(Slot::Pending {
                    ticket: pending,
                    continuations,
                }) => {
                    entries.insert(key.to_owned(), Slot::Loaded(handle.clone()));
                    Completion::Fulfilled {
                        continuations,
                        superseded: pending != ticket,
                    }
                }
                Some(loaded @ Slot::Loaded(_)) => {
                    entries.insert(key.to_owned(), loaded);
                    Completion::Duplicate
                }
                None => Completion::Orphaned,
            }
        };

        match completion {
            Completion::Fulfilled {
                continuations,
                superseded,
            } => {
                tracing::debug!(
                    key,
                    ticket,
                    waiters = continuations.len(),
                    superseded,
                    "Asset loaded"
                );
                for continuation in continuations {
                    continuation(Ok(handle.clone()));
                }
            }
            Completion::Duplicate => {
                self.record(|s| s.duplicates += 1);
                if self.config.warn_on_duplicate {
                    tracing::warn!(key, ticket, "Asset already loaded; releasing duplicate");
                } else {
                    tracing::debug!(key, ticket, "Asset already loaded; releasing duplicate");
                }
                self.loader.release(key, handle);
            }
            Completion::Orphaned => {
                self.record(|s| s.orphaned += 1);
                tracing::debug!(key, ticket, "Load completed after its entry was cleared");
                self.loader.release(key, handle);
            }
            Completion::Failed(_) | Completion::Stale => {}
        }
    }

    fn complete_failure(&self, key: &str, ticket: u64, error: Error) {
        self.record(|s| s.failures += 1);
        let completion = {
            let mut entries = self.entries.lock();
            match entries.remove(key) {
                Some(Slot::Pending {
                    ticket: pending,
                    continuations,
                }) if pending == ticket => Completion::Failed(continuations),
                Some(other) => {
                    entries.insert(key.to_owned(), other);
                    Completion::Stale
                }
                None => Completion::Orphaned,
            }
        };

        match completion {
            Completion::Failed(continuations) => {
                tracing::warn!(
                    key,
                    ticket,
                    waiters = continuations.len(),
                    error = %error,
                    "Asset load failed"
                );
                for continuation in continuations {
                    continuation(Err(error.clone()));
                }
            }
            _ => {
                tracing::warn!(key, ticket, error = %error, "Superseded asset load failed");
            }
        }
    }
}

// ---------------------------------------------------------------------------
// ResourceCache
// ---------------------------------------------------------------------------

/// Keyed cache of asynchronously loaded assets.
///
/// Cloning the cache is cheap; clones share the same table. Loads are driven
/// on the Tokio runtime current at the time of the request.
pub struct ResourceCache<L: Loader> {
    inner: Arc<CacheInner<L>>,
}

impl<L: Loader> Clone for ResourceCache<L> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<L: Loader> fmt::Debug for ResourceCache<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceCache")
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

impl<L: Loader> ResourceCache<L> {
    /// Create an empty cache over `loader`
    pub fn new(loader: L) -> Self {
        Self::with_config(loader, CacheConfig::default())
    }

    /// Create an empty cache with explicit settings
    pub fn with_config(loader: L, config: CacheConfig) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                loader,
                config,
                entries: Mutex::new(HashMap::new()),
                next_ticket: AtomicU64::new(1),
                stats: Mutex::new(CacheStats::default()),
            }),
        }
    }

    /// The loader backing this cache
    pub fn loader(&self) -> &L {
        &self.inner.loader
    }

    /// Request `key`, invoking `callback` once with the result.
    ///
    /// A loaded key invokes the callback immediately on the caller's path. A
    /// pending key queues the callback behind the in-flight load. Otherwise a
    /// new load is issued. Loader failures reach the callback as `None`.
    pub fn load_async<F>(&self, key: &str, callback: F) -> Result<()>
    where
        F: FnOnce(Option<AssetHandle<L::Asset>>) + Send + 'static,
    {
        validate_key(key).inspect_err(|e| tracing::warn!(key, error = %e, "Rejected load"))?;
        self.admit(
            key,
            Box::new(move |result: Result<AssetHandle<L::Asset>>| callback(result.ok())),
        );
        Ok(())
    }

    /// Request `key` and await the shared handle.
    ///
    /// Fails with `LoadFailed` when the loader fails and with `Cancelled` when
    /// the pending entry is cleared before the load completes.
    pub async fn load(&self, key: &str) -> Result<AssetHandle<L::Asset>> {
        let receiver = self.subscribe(key);
        receiver
            .await
            .unwrap_or_else(|_| Err(Error::cancelled(key)))
    }

    /// Resolve `label` through the loader and request every key it names.
    ///
    /// `callback` fires once with one result per key, in key order. An
    /// unknown or empty label yields an empty list.
    pub fn load_all_async<F>(&self, label: &str, callback: F)
    where
        F: FnOnce(Vec<Option<AssetHandle<L::Asset>>>) + Send + 'static,
    {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!(label, "No async runtime available to resolve label");
            callback(Vec::new());
            return;
        };
        let cache = self.clone();
        let label = label.to_owned();
        drop(runtime.spawn(async move {
            let results = cache.load_all(&label).await;
            callback(results);
        }));
    }

    /// Resolve `label` and await every asset it names, in key order
    pub async fn load_all(&self, label: &str) -> Vec<Option<AssetHandle<L::Asset>>> {
        let keys = match self.inner.loader.locate(label).await {
            Ok(keys) if !keys.is_empty() => keys,
            Ok(_) => {
                tracing::warn!(label, "No assets found for label");
                return Vec::new();
            }
            Err(error) => {
                tracing::warn!(label, error = %error, "Failed to resolve label");
                return Vec::new();
            }
        };

        // Issue every load before awaiting any of them.
        let receivers: Vec<_> = keys.iter().map(|key| self.subscribe(key)).collect();
        let mut results = Vec::with_capacity(receivers.len());
        for receiver in receivers {
            results.push(receiver.await.ok().and_then(Result::ok));
        }
        results
    }

    /// Load the prefab under `key` and create one instance from it.
    ///
    /// The instance is not tracked by any pool.
    pub fn instantiate_async<T, F>(
        &self,
        key: &str,
        parent: Option<T::Parent>,
        callback: F,
    ) -> Result<()>
    where
        T: Poolable,
        L::Asset: InstanceFactory<T>,
        F: FnOnce(Option<T>) + Send + 'static,
    {
        self.load_async(key, move |prefab| {
            callback(prefab.map(|prefab| {
                let instance = <L::Asset as InstanceFactory<T>>::create(&prefab);
                instance.set_parent(parent.as_ref());
                instance
            }));
        })
    }

    /// Load the prefab under `key` and await one instance created from it
    pub async fn instantiate<T>(&self, key: &str, parent: Option<&T::Parent>) -> Result<T>
    where
        T: Poolable,
        L::Asset: InstanceFactory<T>,
    {
        let prefab = self.load(key).await?;
        let instance = <L::Asset as InstanceFactory<T>>::create(&prefab);
        instance.set_parent(parent);
        Ok(instance)
    }

    /// Remove `key` from the cache and hand its handle back to the loader.
    ///
    /// Only loaded keys can be released; anything else is `NotFound`.
    pub fn release(&self, key: &str) -> Result<()> {
        let released = {
            let mut entries = self.inner.entries.lock();
            match entries.remove(key) {
                Some(Slot::Loaded(handle)) => Some(handle),
                Some(pending) => {
                    entries.insert(key.to_owned(), pending);
                    None
                }
                None => None,
            }
        };

        match released {
            Some(handle) => {
                self.inner.record(|s| s.released += 1);
                tracing::debug!(key, "Released asset");
                self.inner.loader.release(key, handle);
                Ok(())
            }
            None => {
                tracing::warn!(key, "Cannot release an asset that is not loaded");
                Err(Error::not_found(key))
            }
        }
    }

    /// Release every loaded asset and invalidate every pending entry.
    ///
    /// Continuations queued on pending entries are dropped without being
    /// invoked. Their loads still complete, and their results are released
    /// instead of being cached.
    pub fn clear(&self) {
        let drained: Vec<_> = self.inner.entries.lock().drain().collect();
        let mut released = 0_u64;
        let mut invalidated = 0_usize;
        for (key, slot) in drained {
            match slot {
                Slot::Loaded(handle) => {
                    released += 1;
                    self.inner.loader.release(&key, handle);
                }
                Slot::Pending { continuations, .. } => invalidated += continuations.len(),
            }
        }
        self.inner.record(|s| s.released += released);
        tracing::debug!(released, invalidated, "Cleared asset cache");
    }

    /// The cached handle for `key`, if loaded
    pub fn get(&self, key: &str) -> Option<AssetHandle<L::Asset>> {
        match self.inner.entries.lock().get(key) {
            Some(Slot::Loaded(handle)) => Some(handle.clone()),
            _ => None,
        }
    }

    /// Whether `key` is loaded
    pub fn is_loaded(&self, key: &str) -> bool {
        self.state(key) == Some(LoadState::Loaded)
    }

    /// Current state of `key`
    pub fn state(&self, key: &str) -> Option<LoadState> {
        self.inner.entries.lock().get(key).map(|slot| match slot {
            Slot::Pending { .. } => LoadState::Pending,
            Slot::Loaded(_) => LoadState::Loaded,
        })
    }

    /// Number of loaded keys
    pub fn len(&self) -> usize {
        self.inner
            .entries
            .lock()
            .values()
            .filter(|slot| matches!(slot, Slot::Loaded(_)))
            .count()
    }

    /// Whether no key is loaded
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of keys with a load in flight
    pub fn pending_count(&self) -> usize {
        self.inner
            .entries
            .lock()
            .values()
            .filter(|slot| matches!(slot, Slot::Pending { .. }))
            .count()
    }

    /// Snapshot of the traffic counters
    pub fn stats(&self) -> CacheStats {
        let (loaded, pending) = {
            let entries = self.inner.entries.lock();
            let loaded = entries
                .values()
                .filter(|slot| matches!(slot, Slot::Loaded(_)))
                .count();
            (loaded, entries.len() - loaded)
        };
        CacheStats {
            loaded,
            pending,
            ..self.inner.stats.lock().clone()
        }
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn subscribe(&self, key: &str) -> oneshot::Receiver<Result<AssetHandle<L::Asset>>> {
        let (sender, receiver) = oneshot::channel();
        match validate_key(key) {
            Ok(()) => self.admit(
                key,
                Box::new(move |result: Result<AssetHandle<L::Asset>>| {
                    let _ = sender.send(result);
                }),
            ),
            Err(error) => {
                tracing::warn!(key, error = %error, "Rejected load");
                let _ = sender.send(Err(error));
            }
        }
        receiver
    }

    fn admit(&self, key: &str, continuation: Continuation<L::Asset>) {
        let admission = {
            let mut entries = self.inner.entries.lock();
            match entries.get_mut(key) {
                Some(Slot::Loaded(handle)) => Admission::Hit(handle.clone(), continuation),
                Some(Slot::Pending { continuations, .. }) => {
                    continuations.push(continuation);
                    Admission::Queued
                }
                None => {
                    let ticket = self.inner.next_ticket.fetch_add(1, Ordering::Relaxed);
                    entries.insert(
                        key.to_owned(),
                        Slot::Pending {
                            ticket,
                            continuations: vec![continuation],
                        },
                    );
                    Admission::Issue(ticket)
                }
            }
        };

        match admission {
            Admission::Hit(handle, continuation) => {
                self.inner.record(|s| s.hits += 1);
                continuation(Ok(handle));
            }
            Admission::Queued => {
                self.inner.record(|s| s.coalesced += 1);
                tracing::trace!(key, "Queued behind pending load");
            }
            Admission::Issue(ticket) => self.issue(key, ticket),
        }
    }

    fn issue(&self, key: &str, ticket: u64) {
        self.inner.record(|s| s.loads_issued += 1);
        tracing::debug!(key, ticket, "Issuing asset load");

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            self.inner.complete(
                key,
                ticket,
                Err(Error::load_failed(key, "no async runtime available")),
            );
            return;
        };

        let inner = Arc::clone(&self.inner);
        let key = key.to_owned();
        drop(runtime.spawn(async move {
            let outcome = inner.loader.load(&key).await;
            inner.complete(&key, ticket, outcome);
        }));
    }
}
