//! Shared handle to a loaded asset

use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

/// A reference-counted handle to a loaded asset.
///
/// Every requester of the same key receives a clone of the same handle;
/// cloning only bumps the reference count. The cache keeps one clone for as
/// long as the key stays loaded.
pub struct AssetHandle<A>(Arc<A>);

impl<A> AssetHandle<A> {
    /// Wrap a freshly loaded asset
    pub fn new(asset: A) -> Self {
        Self(Arc::new(asset))
    }

    /// Whether two handles point at the same loaded asset
    #[must_use]
    pub fn ptr_eq(this: &Self, other: &Self) -> bool {
        Arc::ptr_eq(&this.0, &other.0)
    }

    /// Number of live handles to this asset, including the cache's own
    #[must_use]
    pub fn handle_count(this: &Self) -> usize {
        Arc::strong_count(&this.0)
    }
}

impl<A> Clone for AssetHandle<A> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<A> Deref for AssetHandle<A> {
    type Target = A;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<A: fmt::Debug> fmt::Debug for AssetHandle<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("AssetHandle").field(&*self.0).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_the_asset() {
        let handle = AssetHandle::new(String::from("sword"));
        let other = handle.clone();
        assert!(AssetHandle::ptr_eq(&handle, &other));
        assert_eq!(AssetHandle::handle_count(&handle), 2);
        assert_eq!(other.as_str(), "sword");
    }

    #[test]
    fn separate_loads_are_distinct() {
        let a = AssetHandle::new(1_u32);
        let b = AssetHandle::new(1_u32);
        assert!(!AssetHandle::ptr_eq(&a, &b));
    }
}
