//! # Cellar Resource
//!
//! Asset caching and object pooling for real-time clients.
//!
//! - [`ResourceCache`] loads keyed assets through a [`Loader`], coalescing
//!   concurrent requests for the same key onto a single load.
//! - [`ObjectPool`] recycles instances of a [`Poolable`] type through
//!   active/inactive sets with lifecycle hooks.
//! - [`PoolRegistry`] owns pools of different instance types by key.
//! - [`Spawner`] ties the two together: prefabs come from the cache, and
//!   instances come from pools built from those prefabs.

pub mod cache;
pub mod config;
pub mod error;
pub mod pool;
pub mod registry;
pub mod spawner;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use cache::{AssetHandle, CacheStats, LoadState, Loader, ResourceCache};
pub use config::{CacheConfig, PoolConfig, RuntimeConfig};
pub use error::{Error, Result};
pub use pool::{InstanceFactory, InstanceId, ObjectPool, PoolStats, Poolable, Pooled};
pub use registry::{Disposition, PoolRegistry};
pub use spawner::Spawner;
