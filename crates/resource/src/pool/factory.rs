//! Instance factories

use super::Poolable;
use crate::cache::AssetHandle;

/// Produces fresh instances for a pool.
///
/// Every call to `create` must return a distinct, independently destroyable
/// instance. Closures `Fn() -> T` are factories, and so is a loaded prefab
/// handle whose asset is one.
pub trait InstanceFactory<T: Poolable>: Send + Sync {
    /// Create a new instance
    fn create(&self) -> T;

    /// Create the container that inactive instances are parented under
    fn create_root(&self, key: &str) -> Option<T::Parent> {
        let _ = key;
        None
    }

    /// Destroy a container made by `create_root`
    fn destroy_root(&self, root: T::Parent) {
        let _ = root;
    }
}

impl<T, F> InstanceFactory<T> for F
where
    T: Poolable,
    F: Fn() -> T + Send + Sync,
{
    fn create(&self) -> T {
        self()
    }
}

impl<T, A> InstanceFactory<T> for AssetHandle<A>
where
    T: Poolable,
    A: InstanceFactory<T>,
{
    fn create(&self) -> T {
        <A as InstanceFactory<T>>::create(self)
    }

    fn create_root(&self, key: &str) -> Option<T::Parent> {
        <A as InstanceFactory<T>>::create_root(self, key)
    }

    fn destroy_root(&self, root: T::Parent) {
        <A as InstanceFactory<T>>::destroy_root(self, root);
    }
}
