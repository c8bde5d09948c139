//! The loader seam between the cache and the host's asset backend

use std::future::Future;

use super::AssetHandle;
use crate::error::Result;

/// Backend that performs the actual asynchronous asset loads.
///
/// The cache guarantees that `load` is invoked at most once per key while a
/// load for that key is pending, and again only after the previous result
/// failed, was released, or was cleared. Each returned future must resolve
/// exactly once.
///
/// ```rust,ignore
/// struct Disk { root: PathBuf }
///
/// impl Loader for Disk {
///     type Asset = Vec<u8>;
///
///     async fn load(&self, key: &str) -> Result<Vec<u8>> {
///         tokio::fs::read(self.root.join(key))
///             .await
///             .map_err(|e| Error::load_failed(key, e.to_string()))
///     }
/// }
/// ```
pub trait Loader: Send + Sync + 'static {
    /// The loaded asset type
    type Asset: Send + Sync + 'static;

    /// Load the asset stored under `key`
    fn load(&self, key: &str) -> impl Future<Output = Result<Self::Asset>> + Send;

    /// Resolve a label to the keys it groups, in load order.
    ///
    /// Loaders without label support resolve every label to nothing.
    fn locate(&self, label: &str) -> impl Future<Output = Result<Vec<String>>> + Send {
        let _ = label;
        async { Ok(Vec::new()) }
    }

    /// Hand back the cache's handle for an asset that left the cache.
    ///
    /// Called on `release`, on `clear`, and for duplicate or orphaned load
    /// results. Callers may still hold clones of the handle.
    fn release(&self, key: &str, asset: AssetHandle<Self::Asset>) {
        let _ = (key, asset);
    }
}
