//! Fixtures for exercising caches and pools in tests
//!
//! - [`ManualLoader`]: an in-memory [`Loader`] whose completions can be held
//!   back and whose issued loads and releases are recorded.
//! - [`Probe`] / [`ProbeFactory`]: a [`Poolable`] that journals every hook it
//!   receives, with shared counters in a [`HookLedger`].

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

use parking_lot::Mutex;
use tokio::sync::watch;

use crate::cache::{AssetHandle, Loader};
use crate::error::{Error, Result};
use crate::pool::{InstanceFactory, Poolable};

// ---------------------------------------------------------------------------
// ManualLoader
// ---------------------------------------------------------------------------

/// Scripted in-memory loader.
///
/// Loads resolve against the registered assets; unknown keys fail. While the
/// loader is paused, issued loads wait until [`ManualLoader::open`] is called.
pub struct ManualLoader<A> {
    assets: Mutex<HashMap<String, A>>,
    labels: Mutex<HashMap<String, Vec<String>>>,
    issued: Mutex<Vec<String>>,
    released: Mutex<Vec<String>>,
    gate: watch::Sender<bool>,
}

impl<A> ManualLoader<A> {
    /// An open loader with no assets
    pub fn new() -> Self {
        let (gate, _) = watch::channel(true);
        Self {
            assets: Mutex::new(HashMap::new()),
            labels: Mutex::new(HashMap::new()),
            issued: Mutex::new(Vec::new()),
            released: Mutex::new(Vec::new()),
            gate,
        }
    }

    /// Register an asset under `key`
    pub fn with_asset(self, key: &str, asset: A) -> Self {
        self.insert_asset(key, asset);
        self
    }

    /// Register a label resolving to `keys`
    pub fn with_label(self, label: &str, keys: &[&str]) -> Self {
        self.labels.lock().insert(
            label.to_owned(),
            keys.iter().map(|key| (*key).to_owned()).collect(),
        );
        self
    }

    /// Start with completions held back
    pub fn paused(self) -> Self {
        self.pause();
        self
    }

    /// Hold back completions of loads
    pub fn pause(&self) {
        self.gate.send_replace(false);
    }

    /// Let held-back and future loads complete
    pub fn open(&self) {
        self.gate.send_replace(true);
    }

    /// Register or replace an asset
    pub fn insert_asset(&self, key: &str, asset: A) {
        self.assets.lock().insert(key.to_owned(), asset);
    }

    /// Forget an asset so later loads of `key` fail
    pub fn remove_asset(&self, key: &str) {
        self.assets.lock().remove(key);
    }

    /// Every key passed to `load`, in issue order
    pub fn issued(&self) -> Vec<String> {
        self.issued.lock().clone()
    }

    /// Number of loads issued for `key`
    pub fn issued_count(&self, key: &str) -> usize {
        self.issued.lock().iter().filter(|k| *k == key).count()
    }

    /// Every key whose handle was released back, in release order
    pub fn released(&self) -> Vec<String> {
        self.released.lock().clone()
    }

    /// Number of handles released back for `key`
    pub fn released_count(&self, key: &str) -> usize {
        self.released.lock().iter().filter(|k| *k == key).count()
    }
}

impl<A> Default for ManualLoader<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A> fmt::Debug for ManualLoader<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManualLoader")
            .field("open", &*self.gate.borrow())
            .field("issued", &self.issued.lock().len())
            .field("released", &self.released.lock().len())
            .finish_non_exhaustive()
    }
}

impl<A> Loader for ManualLoader<A>
where
    A: Clone + Send + Sync + 'static,
{
    type Asset = A;

    fn load(&self, key: &str) -> impl Future<Output = Result<A>> + Send {
        self.issued.lock().push(key.to_owned());
        let mut gate = self.gate.subscribe();
        async move {
            let _ = gate.wait_for(|open| *open).await;
            self.assets
                .lock()
                .get(key)
                .cloned()
                .ok_or_else(|| Error::load_failed(key, "no such asset"))
        }
    }

    fn locate(&self, label: &str) -> impl Future<Output = Result<Vec<String>>> + Send {
        let keys = self
            .labels
            .lock()
            .get(label)
            .cloned()
            .ok_or_else(|| Error::not_found(label));
        async move { keys }
    }

    fn release(&self, key: &str, asset: AssetHandle<A>) {
        drop(asset);
        self.released.lock().push(key.to_owned());
    }
}

// ---------------------------------------------------------------------------
// Probe
// ---------------------------------------------------------------------------

/// Counters shared by every probe made by one factory
#[derive(Debug, Default)]
pub struct HookLedger {
    created: AtomicUsize,
    gets: AtomicUsize,
    returns: AtomicUsize,
    releases: AtomicUsize,
    destroyed: AtomicUsize,
    roots_created: AtomicUsize,
    roots_destroyed: AtomicUsize,
}

impl HookLedger {
    /// Factory `create` calls
    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    /// `on_get_from_pool` calls
    pub fn gets(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    /// `on_return_to_pool` calls
    pub fn returns(&self) -> usize {
        self.returns.load(Ordering::SeqCst)
    }

    /// `on_release` calls
    pub fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }

    /// `destroy` calls
    pub fn destroyed(&self) -> usize {
        self.destroyed.load(Ordering::SeqCst)
    }

    /// Root containers created
    pub fn roots_created(&self) -> usize {
        self.roots_created.load(Ordering::SeqCst)
    }

    /// Root containers destroyed
    pub fn roots_destroyed(&self) -> usize {
        self.roots_destroyed.load(Ordering::SeqCst)
    }

    fn bump(counter: &AtomicUsize) {
        counter.fetch_add(1, Ordering::SeqCst);
    }
}

struct ProbeState {
    serial: u64,
    ledger: Arc<HookLedger>,
    alive: AtomicBool,
    active: AtomicBool,
    parent: Mutex<Option<String>>,
    journal: Mutex<Vec<String>>,
}

/// A poolable handle that journals every hook it receives.
///
/// Clones share state, like handles to the same scene object.
#[derive(Clone)]
pub struct Probe {
    state: Arc<ProbeState>,
}

impl Probe {
    fn new(serial: u64, ledger: Arc<HookLedger>) -> Self {
        HookLedger::bump(&ledger.created);
        Self {
            state: Arc::new(ProbeState {
                serial,
                ledger,
                alive: AtomicBool::new(true),
                active: AtomicBool::new(false),
                parent: Mutex::new(None),
                journal: Mutex::new(vec!["create".to_owned()]),
            }),
        }
    }

    /// Creation order within the factory, starting at 1
    pub fn serial(&self) -> u64 {
        self.state.serial
    }

    /// Whether the probe is currently shown
    pub fn is_active(&self) -> bool {
        self.state.active.load(Ordering::SeqCst)
    }

    /// Current parent container
    pub fn parent(&self) -> Option<String> {
        self.state.parent.lock().clone()
    }

    /// Every hook received so far, in order
    pub fn journal(&self) -> Vec<String> {
        self.state.journal.lock().clone()
    }

    /// Destroy the probe behind the pool's back
    pub fn kill(&self) {
        self.state.alive.store(false, Ordering::SeqCst);
    }

    fn note(&self, entry: impl Into<String>) {
        self.state.journal.lock().push(entry.into());
    }
}

impl PartialEq for Probe {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.state, &other.state)
    }
}

impl Eq for Probe {}

impl fmt::Debug for Probe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Probe")
            .field("serial", &self.state.serial)
            .field("alive", &self.is_alive())
            .field("active", &self.is_active())
            .field("parent", &self.parent())
            .finish()
    }
}

impl Poolable for Probe {
    type Parent = String;

    fn on_create(&self) {
        self.note("on_create");
    }

    fn on_get_from_pool(&self) {
        HookLedger::bump(&self.state.ledger.gets);
        self.note("on_get");
    }

    fn on_return_to_pool(&self) {
        HookLedger::bump(&self.state.ledger.returns);
        self.note("on_return");
    }

    fn on_release(&self) {
        HookLedger::bump(&self.state.ledger.releases);
        self.note("on_release");
    }

    fn is_alive(&self) -> bool {
        self.state.alive.load(Ordering::SeqCst)
    }

    fn set_active(&self, active: bool) {
        self.state.active.store(active, Ordering::SeqCst);
        self.note(if active { "active" } else { "inactive" });
    }

    fn set_parent(&self, parent: Option<&String>) {
        *self.state.parent.lock() = parent.cloned();
        self.note(format!("parent:{}", parent.map_or("-", String::as_str)));
    }

    fn destroy(self) {
        HookLedger::bump(&self.state.ledger.destroyed);
        self.state.alive.store(false, Ordering::SeqCst);
        self.note("destroy");
    }
}

/// Factory (and prefab asset) producing [`Probe`]s.
///
/// Roots are named `Pool_<key>`. Clones share the ledger and serial counter.
#[derive(Clone, Default)]
pub struct ProbeFactory {
    ledger: Arc<HookLedger>,
    next_serial: Arc<AtomicU64>,
}

impl ProbeFactory {
    /// A factory with a fresh ledger
    pub fn new() -> Self {
        Self::default()
    }

    /// The ledger shared by every probe this factory makes
    pub fn ledger(&self) -> Arc<HookLedger> {
        Arc::clone(&self.ledger)
    }
}

impl fmt::Debug for ProbeFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProbeFactory")
            .field("created", &self.ledger.created())
            .finish_non_exhaustive()
    }
}

impl InstanceFactory<Probe> for ProbeFactory {
    fn create(&self) -> Probe {
        let serial = self.next_serial.fetch_add(1, Ordering::SeqCst) + 1;
        Probe::new(serial, self.ledger())
    }

    fn create_root(&self, key: &str) -> Option<String> {
        HookLedger::bump(&self.ledger.roots_created);
        Some(format!("Pool_{key}"))
    }

    fn destroy_root(&self, _root: String) {
        HookLedger::bump(&self.ledger.roots_destroyed);
    }
}
