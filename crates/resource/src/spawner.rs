//! Spawning pooled instances from cached prefabs

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::cache::{Loader, ResourceCache};
use crate::error::Result;
use crate::pool::{InstanceFactory, Poolable, Pooled};
use crate::registry::{Disposition, PoolRegistry};

/// Hands out pooled instances by prefab key.
///
/// The first spawn of a key loads its prefab through the cache and registers
/// a pool built from it with the registry's default preload; later spawns
/// reuse that pool.
pub struct Spawner<L: Loader> {
    cache: ResourceCache<L>,
    registry: Arc<Mutex<PoolRegistry>>,
}

impl<L: Loader> Clone for Spawner<L> {
    fn clone(&self) -> Self {
        Self {
            cache: self.cache.clone(),
            registry: Arc::clone(&self.registry),
        }
    }
}

impl<L: Loader> Spawner<L> {
    /// Create a spawner over a shared cache and registry
    pub fn new(cache: ResourceCache<L>, registry: Arc<Mutex<PoolRegistry>>) -> Self {
        Self { cache, registry }
    }

    /// The prefab cache
    pub fn cache(&self) -> &ResourceCache<L> {
        &self.cache
    }

    /// The pool registry
    pub fn registry(&self) -> &Arc<Mutex<PoolRegistry>> {
        &self.registry
    }

    /// Hand out an instance of the prefab under `key`
    pub async fn spawn<T>(&self, key: &str, parent: Option<&T::Parent>) -> Result<Pooled<T>>
    where
        T: Poolable,
        L::Asset: InstanceFactory<T>,
    {
        {
            let mut registry = self.registry.lock();
            if registry.has_pool(key) {
                return registry.get(key, parent);
            }
        }

        let prefab = self.cache.load(key).await?;

        let mut registry = self.registry.lock();
        // Another spawn of the same key may have registered the pool meanwhile.
        if !registry.has_pool(key) {
            let preload = registry.config().default_preload;
            registry.create_pool::<T, _>(key, Some(prefab), preload)?;
        }
        registry.get(key, parent)
    }

    /// Give an instance back to its pool, destroying it if the pool is gone
    pub fn despawn<T: Poolable>(&self, pooled: Pooled<T>) -> Result<Disposition> {
        self.registry.lock().despawn(pooled)
    }
}

impl<L: Loader> fmt::Debug for Spawner<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Spawner")
            .field("cache", &self.cache)
            .field("pools", &self.registry.lock().keys())
            .finish()
    }
}
