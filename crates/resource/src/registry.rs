//! Keyed registry of heterogeneous object pools

use std::any::{Any, type_name};
use std::collections::HashMap;
use std::fmt;

use crate::config::PoolConfig;
use crate::error::{Error, Result, validate_key};
use crate::pool::{InstanceFactory, ObjectPool, PoolStats, Poolable, Pooled};

// ---------------------------------------------------------------------------
// Type-erased pool wrapper
// ---------------------------------------------------------------------------

/// Type-erased pool interface so the registry can store pools of different
/// instance types in a single map.
trait AnyPool: Send {
    /// Name of the pooled instance type
    fn type_name(&self) -> &'static str;

    fn stats(&self) -> PoolStats;

    fn return_all(&mut self);

    fn clear(&mut self);

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Poolable> AnyPool for ObjectPool<T> {
    fn type_name(&self) -> &'static str {
        type_name::<T>()
    }

    fn stats(&self) -> PoolStats {
        Self::stats(self)
    }

    fn return_all(&mut self) {
        Self::return_all(self);
    }

    fn clear(&mut self) {
        Self::clear(self);
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// What [`PoolRegistry::despawn`] did with an instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Returned to its pool for reuse
    Recycled,
    /// No pool accepted it, so it was destroyed
    Destroyed,
}

// ---------------------------------------------------------------------------
// PoolRegistry
// ---------------------------------------------------------------------------

/// Owns every pool, keyed by caller-supplied strings.
///
/// Removing a pool (or clearing the registry, or dropping it) disposes the
/// pool: all of its instances are released and its root is destroyed.
#[derive(Default)]
pub struct PoolRegistry {
    pools: HashMap<String, Box<dyn AnyPool>>,
    config: PoolConfig,
}

impl PoolRegistry {
    /// Create an empty registry with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty registry
    pub fn with_config(config: PoolConfig) -> Self {
        Self {
            pools: HashMap::new(),
            config,
        }
    }

    /// Registry settings
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Register a pool under `key`, preloading `preload` instances.
    ///
    /// Nothing is modified when the key is empty (`InvalidKey`), the factory
    /// is absent (`MissingFactory`), or the key is taken (`AlreadyExists`).
    pub fn create_pool<T, F>(
        &mut self,
        key: &str,
        factory: Option<F>,
        preload: usize,
    ) -> Result<()>
    where
        T: Poolable,
        F: InstanceFactory<T> + 'static,
    {
        validate_key(key).inspect_err(|e| tracing::warn!(key, error = %e, "Rejected pool"))?;
        let Some(factory) = factory else {
            tracing::warn!(key, "Cannot create a pool without a factory");
            return Err(Error::missing_factory(key));
        };
        if self.pools.contains_key(key) {
            tracing::warn!(key, "Pool already registered");
            return Err(Error::already_exists(key));
        }

        let pool =
            ObjectPool::<T>::with_max_inactive(key, factory, preload, self.config.max_inactive);
        self.pools.insert(key.to_owned(), Box::new(pool));
        tracing::debug!(key, instance_type = type_name::<T>(), preload, "Registered pool");
        Ok(())
    }

    /// Hand out an instance from the pool registered under `key`
    pub fn get<T: Poolable>(
        &mut self,
        key: &str,
        parent: Option<&T::Parent>,
    ) -> Result<Pooled<T>> {
        let pool = self
            .typed_mut::<T>(key)
            .inspect_err(|e| tracing::warn!(key, error = %e, "Cannot get instance"))?;
        Ok(pool.get(parent))
    }

    /// Hand out an instance, registering a pool from `factory` first if none
    /// exists and auto-creation is enabled.
    ///
    /// Auto-created pools preload `default_preload` instances.
    pub fn get_or_create<T, F>(
        &mut self,
        key: &str,
        parent: Option<&T::Parent>,
        factory: F,
    ) -> Result<Pooled<T>>
    where
        T: Poolable,
        F: InstanceFactory<T> + 'static,
    {
        if self.config.auto_create && !self.pools.contains_key(key) {
            let preload = self.config.default_preload;
            self.create_pool::<T, F>(key, Some(factory), preload)?;
        }
        self.get(key, parent)
    }

    /// Return an instance to the pool recorded on it
    pub fn return_instance<T: Poolable>(&mut self, pooled: &Pooled<T>) -> Result<()> {
        let key = pooled.pool_key();
        let pool = self
            .typed_mut::<T>(key)
            .inspect_err(|e| tracing::warn!(key, error = %e, "Cannot return instance"))?;
        pool.return_instance(pooled)
    }

    /// Return an instance to its pool, destroying it if its pool is gone.
    ///
    /// An instance whose pool exists but does not hold it as active is left
    /// alone and reported as `InvalidMembership`.
    pub fn despawn<T: Poolable>(&mut self, pooled: Pooled<T>) -> Result<Disposition> {
        match self.return_instance(&pooled) {
            Ok(()) => Ok(Disposition::Recycled),
            Err(Error::NotFound { .. } | Error::TypeMismatch { .. }) => {
                tracing::debug!(
                    pool = pooled.pool_key(),
                    instance = %pooled.id(),
                    "Destroying orphaned instance"
                );
                let instance = pooled.into_inner();
                instance.on_release();
                instance.destroy();
                Ok(Disposition::Destroyed)
            }
            Err(error) => Err(error),
        }
    }

    /// Return every active instance of the pool under `key`
    pub fn return_all(&mut self, key: &str) -> Result<()> {
        self.erased_mut(key)?.return_all();
        Ok(())
    }

    /// Destroy every instance of the pool under `key`, keeping the pool
    pub fn clear_pool(&mut self, key: &str) -> Result<()> {
        self.erased_mut(key)?.clear();
        Ok(())
    }

    /// Dispose the pool under `key`
    pub fn remove_pool(&mut self, key: &str) -> Result<()> {
        let Some(pool) = self.pools.remove(key) else {
            tracing::warn!(key, "Cannot remove unregistered pool");
            return Err(Error::not_found(key));
        };
        drop(pool);
        tracing::debug!(key, "Removed pool");
        Ok(())
    }

    /// Dispose every pool
    pub fn clear(&mut self) {
        let count = self.pools.len();
        self.pools.clear();
        tracing::debug!(count, "Cleared pool registry");
    }

    /// Whether a pool is registered under `key`
    pub fn has_pool(&self, key: &str) -> bool {
        self.pools.contains_key(key)
    }

    /// Statistics of the pool under `key`
    pub fn stats(&self, key: &str) -> Option<PoolStats> {
        self.pools.get(key).map(|pool| pool.stats())
    }

    /// Number of registered pools
    pub fn len(&self) -> usize {
        self.pools.len()
    }

    /// Whether no pool is registered
    pub fn is_empty(&self) -> bool {
        self.pools.is_empty()
    }

    /// Registered keys, sorted
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.pools.keys().cloned().collect();
        keys.sort_unstable();
        keys
    }

    /// Typed access to the pool under `key`
    pub fn pool_mut<T: Poolable>(&mut self, key: &str) -> Result<&mut ObjectPool<T>> {
        self.typed_mut(key)
    }

    fn erased_mut(&mut self, key: &str) -> Result<&mut Box<dyn AnyPool>> {
        self.pools.get_mut(key).ok_or_else(|| {
            tracing::warn!(key, "Pool not registered");
            Error::not_found(key)
        })
    }

    fn typed_mut<T: Poolable>(&mut self, key: &str) -> Result<&mut ObjectPool<T>> {
        let pool = self
            .pools
            .get_mut(key)
            .ok_or_else(|| Error::not_found(key))?;
        let actual = pool.type_name();
        pool.as_any_mut()
            .downcast_mut::<ObjectPool<T>>()
            .ok_or_else(|| Error::TypeMismatch {
                key: key.to_owned(),
                expected: type_name::<T>(),
                actual,
            })
    }
}

impl fmt::Debug for PoolRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolRegistry")
            .field("pools", &self.keys())
            .field("config", &self.config)
            .finish()
    }
}
