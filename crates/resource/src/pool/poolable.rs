//! Capability trait for pooled instances

/// An instance that can be recycled through an [`ObjectPool`].
///
/// Instances are handles to host objects (scene nodes, emitters, widgets), so
/// the pool clones them freely and every hook takes `&self`. All hooks default
/// to no-ops.
///
/// | Transition | Hooks, in order |
/// |---|---|
/// | created | `on_create` |
/// | handed out | `set_parent`, `set_active(true)`, `on_get_from_pool` |
/// | returned | `on_return_to_pool`, `set_active(false)`, `set_parent(root)` |
/// | released | `on_release`, `destroy` |
///
/// # Example
/// ```
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicBool, Ordering};
///
/// use cellar_resource::pool::Poolable;
///
/// #[derive(Clone)]
/// struct Projectile {
///     visible: Arc<AtomicBool>,
/// }
///
/// impl Poolable for Projectile {
///     type Parent = String;
///
///     fn set_active(&self, active: bool) {
///         self.visible.store(active, Ordering::Relaxed);
///     }
/// }
/// ```
///
/// [`ObjectPool`]: super::ObjectPool
pub trait Poolable: Clone + Send + Sync + 'static {
    /// The container instances are parented under
    type Parent: Clone + Send + Sync + 'static;

    /// Called once, right after the factory created the instance
    fn on_create(&self) {}

    /// Called every time the instance is handed out
    fn on_get_from_pool(&self) {}

    /// Called every time the instance is returned
    fn on_return_to_pool(&self) {}

    /// Called once, before the instance is destroyed
    fn on_release(&self) {}

    /// Whether the underlying object still exists.
    ///
    /// Instances destroyed behind the pool's back are skipped and dropped
    /// when they surface from the inactive stack.
    fn is_alive(&self) -> bool {
        true
    }

    /// Show or hide the instance
    fn set_active(&self, active: bool) {
        let _ = active;
    }

    /// Move the instance under `parent`, or to the top level when `None`
    fn set_parent(&self, parent: Option<&Self::Parent>) {
        let _ = parent;
    }

    /// Destroy the underlying object
    fn destroy(self) {}
}
