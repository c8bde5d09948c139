//! Object pools for reusable instances
//!
//! An [`ObjectPool`] keeps every instance it created in exactly one of two
//! sets: active (handed out) or inactive (parked for reuse, most recently
//! returned first). Instances are tracked by [`InstanceId`], so a stale or
//! foreign [`Pooled`] handle can never corrupt either set.

mod factory;
mod poolable;

pub use factory::InstanceFactory;
pub use poolable::Poolable;

use std::collections::HashMap;
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use crate::error::{Error, Result};

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// Unique identity of an instance created by a pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId(Uuid);

impl InstanceId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// An instance handed out by a pool.
///
/// Carries the instance's identity and the key of the pool that owns it, and
/// dereferences to the instance itself. Give it back with
/// [`ObjectPool::return_instance`] or through the registry.
#[derive(Clone)]
pub struct Pooled<T> {
    id: InstanceId,
    pool_key: Arc<str>,
    instance: T,
}

impl<T> Pooled<T> {
    /// Identity of the instance
    pub fn id(&self) -> InstanceId {
        self.id
    }

    /// Key of the owning pool
    pub fn pool_key(&self) -> &str {
        &self.pool_key
    }

    /// The instance
    pub fn instance(&self) -> &T {
        &self.instance
    }

    pub(crate) fn into_inner(self) -> T {
        self.instance
    }
}

impl<T> Deref for Pooled<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.instance
    }
}

impl<T: fmt::Debug> fmt::Debug for Pooled<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pooled")
            .field("id", &self.id)
            .field("pool_key", &self.pool_key)
            .field("instance", &self.instance)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

/// Pool statistics
#[derive(Clone, Default, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    /// Instances currently handed out
    pub active: usize,
    /// Instances parked for reuse
    pub inactive: usize,
    /// Instances created by the factory
    pub created: u64,
    /// Instances destroyed by the pool
    pub destroyed: u64,
    /// Successful `get` calls
    pub total_gets: u64,
    /// Successful returns
    pub total_returns: u64,
    /// Externally destroyed instances skipped on `get`
    pub stale_skipped: u64,
}

impl fmt::Debug for PoolStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolStats")
            .field("active", &self.active)
            .field("inactive", &self.inactive)
            .field("created", &self.created)
            .field("destroyed", &self.destroyed)
            .field("gets", &self.total_gets)
            .field("returns", &self.total_returns)
            .field("stale", &self.stale_skipped)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// ObjectPool
// ---------------------------------------------------------------------------

/// Pool of recyclable instances of `T`.
///
/// ```
/// use cellar_resource::pool::{ObjectPool, Poolable};
///
/// #[derive(Clone)]
/// struct Spark;
///
/// impl Poolable for Spark {
///     type Parent = ();
/// }
///
/// let mut pool: ObjectPool<Spark> = ObjectPool::new("spark", || Spark, 2);
/// assert_eq!(pool.inactive_count(), 2);
///
/// let spark = pool.get(None);
/// assert_eq!(pool.active_count(), 1);
///
/// pool.return_instance(&spark).unwrap();
/// assert_eq!(pool.inactive_count(), 2);
/// ```
///
/// Dropping the pool disposes it: every instance is released and the root
/// container is destroyed.
pub struct ObjectPool<T: Poolable> {
    key: Arc<str>,
    factory: Box<dyn InstanceFactory<T>>,
    root: Option<T::Parent>,
    active: HashMap<InstanceId, T>,
    inactive: Vec<(InstanceId, T)>,
    max_inactive: Option<usize>,
    stats: PoolStats,
}

impl<T: Poolable> ObjectPool<T> {
    /// Create a pool and preload `preload` inactive instances
    pub fn new<F>(key: impl Into<Arc<str>>, factory: F, preload: usize) -> Self
    where
        F: InstanceFactory<T> + 'static,
    {
        Self::with_max_inactive(key, factory, preload, None)
    }

    /// Create a pool that retains at most `max_inactive` returned instances.
    ///
    /// Preloaded instances are not subject to the cap.
    pub fn with_max_inactive<F>(
        key: impl Into<Arc<str>>,
        factory: F,
        preload: usize,
        max_inactive: Option<usize>,
    ) -> Self
    where
        F: InstanceFactory<T> + 'static,
    {
        let key: Arc<str> = key.into();
        let root = factory.create_root(&key);
        let mut pool = Self {
            key,
            factory: Box::new(factory),
            root,
            active: HashMap::new(),
            inactive: Vec::with_capacity(preload),
            max_inactive,
            stats: PoolStats::default(),
        };

        for _ in 0..preload {
            let (id, instance) = pool.create();
            pool.deactivate(&instance);
            pool.inactive.push((id, instance));
        }

        tracing::debug!(pool = %pool.key, preload, "Created object pool");
        pool
    }

    /// Key this pool is registered under
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The container inactive instances are parented under
    pub fn root(&self) -> Option<&T::Parent> {
        self.root.as_ref()
    }

    /// Hand out an instance, reusing the most recently returned live one
    pub fn get(&mut self, parent: Option<&T::Parent>) -> Pooled<T> {
        let (id, instance) = loop {
            match self.inactive.pop() {
                Some((id, instance)) if instance.is_alive() => break (id, instance),
                Some((id, _)) => {
                    self.stats.stale_skipped += 1;
                    tracing::trace!(pool = %self.key, instance = %id, "Skipped destroyed instance");
                }
                None => break self.create(),
            }
        };

        instance.set_parent(parent);
        instance.set_active(true);
        instance.on_get_from_pool();
        self.active.insert(id, instance.clone());
        self.stats.total_gets += 1;

        Pooled {
            id,
            pool_key: Arc::clone(&self.key),
            instance,
        }
    }

    /// Take an active instance back.
    ///
    /// Fails with `InvalidMembership` when the instance is not in this pool's
    /// active set, including when it was already returned.
    pub fn return_instance(&mut self, pooled: &Pooled<T>) -> Result<()> {
        let Some(instance) = self.active.remove(&pooled.id) else {
            tracing::warn!(
                pool = %self.key,
                instance = %pooled.id,
                "Returned instance is not active in this pool"
            );
            return Err(Error::invalid_membership(&*self.key, pooled.id));
        };

        self.stats.total_returns += 1;
        self.park(pooled.id, instance);
        Ok(())
    }

    /// Return every active instance
    pub fn return_all(&mut self) {
        let active: Vec<_> = self.active.drain().collect();
        let count = active.len();
        for (id, instance) in active {
            self.stats.total_returns += 1;
            self.park(id, instance);
        }
        tracing::debug!(pool = %self.key, count, "Returned all active instances");
    }

    /// Destroy every instance in both sets; the pool stays usable
    pub fn clear(&mut self) {
        for instance in self.active.values() {
            instance.on_release();
        }
        for (_, instance) in &self.inactive {
            instance.on_release();
        }

        let active: Vec<_> = self.active.drain().collect();
        let inactive = std::mem::take(&mut self.inactive);
        let count = active.len() + inactive.len();
        for (_, instance) in active.into_iter().chain(inactive) {
            instance.destroy();
        }
        self.stats.destroyed += count as u64;

        tracing::debug!(pool = %self.key, count, "Cleared object pool");
    }

    /// Clear the pool and destroy its root container
    pub fn dispose(self) {
        drop(self);
    }

    /// Whether `pooled` is currently handed out by this pool
    pub fn is_active(&self, pooled: &Pooled<T>) -> bool {
        self.active.contains_key(&pooled.id)
    }

    /// Instances currently handed out
    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    /// Instances parked for reuse
    pub fn inactive_count(&self) -> usize {
        self.inactive.len()
    }

    /// Instances created over the pool's lifetime
    pub fn creation_count(&self) -> u64 {
        self.stats.created
    }

    /// Get pool statistics
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            active: self.active.len(),
            inactive: self.inactive.len(),
            ..self.stats.clone()
        }
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn create(&mut self) -> (InstanceId, T) {
        let id = InstanceId::new();
        let instance = self.factory.create();
        instance.set_parent(self.root.as_ref());
        instance.on_create();
        self.stats.created += 1;
        tracing::trace!(pool = %self.key, instance = %id, "Created pooled instance");
        (id, instance)
    }

    fn deactivate(&self, instance: &T) {
        instance.on_return_to_pool();
        instance.set_active(false);
        instance.set_parent(self.root.as_ref());
    }

    fn park(&mut self, id: InstanceId, instance: T) {
        self.deactivate(&instance);
        if self
            .max_inactive
            .is_some_and(|max| self.inactive.len() >= max)
        {
            instance.on_release();
            instance.destroy();
            self.stats.destroyed += 1;
            tracing::trace!(
                pool = %self.key,
                instance = %id,
                "Inactive set full; destroyed instance"
            );
            return;
        }
        self.inactive.push((id, instance));
    }
}

impl<T: Poolable> Drop for ObjectPool<T> {
    fn drop(&mut self) {
        if !self.active.is_empty() || !self.inactive.is_empty() {
            self.clear();
        }
        if let Some(root) = self.root.take() {
            self.factory.destroy_root(root);
        }
        tracing::debug!(pool = %self.key, "Disposed object pool");
    }
}

impl<T: Poolable> fmt::Debug for ObjectPool<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectPool")
            .field("key", &self.key)
            .field("stats", &self.stats())
            .field("max_inactive", &self.max_inactive)
            .finish_non_exhaustive()
    }
}
