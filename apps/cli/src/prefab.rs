//! In-memory prefabs and sprites driven by `cellar simulate`

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use cellar_resource::{AssetHandle, Error, InstanceFactory, Loader, Poolable};

/// A scene object handle; clones refer to the same object
#[derive(Debug, Clone)]
pub struct Sprite {
    state: Arc<SpriteState>,
}

#[derive(Debug)]
struct SpriteState {
    id: u64,
    prefab: String,
    alive: AtomicBool,
    visible: AtomicBool,
    parent: parking_lot::Mutex<Option<String>>,
}

impl Sprite {
    pub fn id(&self) -> u64 {
        self.state.id
    }

    pub fn prefab(&self) -> &str {
        &self.state.prefab
    }

    pub fn parent(&self) -> Option<String> {
        self.state.parent.lock().clone()
    }
}

impl Poolable for Sprite {
    type Parent = String;

    fn is_alive(&self) -> bool {
        self.state.alive.load(Ordering::Relaxed)
    }

    fn set_active(&self, active: bool) {
        self.state.visible.store(active, Ordering::Relaxed);
    }

    fn set_parent(&self, parent: Option<&String>) {
        *self.state.parent.lock() = parent.cloned();
    }

    fn destroy(self) {
        self.state.alive.store(false, Ordering::Relaxed);
        tracing::trace!(sprite = self.id(), prefab = self.prefab(), "Destroyed sprite");
    }
}

/// A loaded prefab; every sprite it creates gets a fresh id
#[derive(Debug)]
pub struct Prefab {
    name: String,
    next_id: Arc<AtomicU64>,
}

impl InstanceFactory<Sprite> for Prefab {
    fn create(&self) -> Sprite {
        Sprite {
            state: Arc::new(SpriteState {
                id: self.next_id.fetch_add(1, Ordering::Relaxed) + 1,
                prefab: self.name.clone(),
                alive: AtomicBool::new(true),
                visible: AtomicBool::new(false),
                parent: parking_lot::Mutex::new(None),
            }),
        }
    }

    fn create_root(&self, key: &str) -> Option<String> {
        Some(format!("Pool_{key}"))
    }
}

/// Loader that serves any key in its catalogue after a fixed latency
#[derive(Debug)]
pub struct ScriptedLoader {
    catalogue: Vec<String>,
    latency: Duration,
    next_id: Arc<AtomicU64>,
}

impl ScriptedLoader {
    pub fn new(catalogue: Vec<String>, latency: Duration) -> Self {
        Self {
            catalogue,
            latency,
            next_id: Arc::new(AtomicU64::new(0)),
        }
    }
}

impl Loader for ScriptedLoader {
    type Asset = Prefab;

    fn load(&self, key: &str) -> impl Future<Output = cellar_resource::Result<Prefab>> + Send {
        let known = self.catalogue.iter().any(|name| name == key);
        let prefab = Prefab {
            name: key.to_owned(),
            next_id: Arc::clone(&self.next_id),
        };
        let latency = self.latency;
        async move {
            tokio::time::sleep(latency).await;
            if known {
                Ok(prefab)
            } else {
                Err(Error::load_failed(&prefab.name, "not in catalogue"))
            }
        }
    }

    fn release(&self, key: &str, asset: AssetHandle<Prefab>) {
        tracing::debug!(key, prefab = %asset.name, "Released prefab");
    }
}
