//! Spawner integration tests: prefabs from the cache, instances from pools.

use std::sync::Arc;

use cellar_resource::testing::{ManualLoader, Probe, ProbeFactory};
use cellar_resource::{
    Disposition, Error, PoolConfig, PoolRegistry, Poolable, ResourceCache, RuntimeConfig,
    Spawner,
};
use parking_lot::Mutex;
use pretty_assertions::assert_eq;

fn spawner(config: PoolConfig) -> (Spawner<ManualLoader<ProbeFactory>>, ProbeFactory) {
    let prefab = ProbeFactory::new();
    let loader = ManualLoader::new().with_asset("bullet.prefab", prefab.clone());
    let registry = Arc::new(Mutex::new(PoolRegistry::with_config(config)));
    (Spawner::new(ResourceCache::new(loader), registry), prefab)
}

#[tokio::test]
async fn first_spawn_loads_the_prefab_and_registers_a_pool() {
    let (spawner, prefab) = spawner(PoolConfig::default());
    let arena = String::from("Arena");

    let probe = spawner
        .spawn::<Probe>("bullet.prefab", Some(&arena))
        .await
        .unwrap();

    assert_eq!(probe.pool_key(), "bullet.prefab");
    assert_eq!(probe.parent().as_deref(), Some("Arena"));
    assert!(spawner.registry().lock().has_pool("bullet.prefab"));
    assert!(spawner.cache().is_loaded("bullet.prefab"));
    assert_eq!(prefab.ledger().roots_created(), 1);
}

#[tokio::test]
async fn later_spawns_reuse_the_pool_without_reloading() {
    let (spawner, prefab) = spawner(PoolConfig::default());

    let first = spawner.spawn::<Probe>("bullet.prefab", None).await.unwrap();
    assert_eq!(spawner.despawn(first).unwrap(), Disposition::Recycled);
    let second = spawner.spawn::<Probe>("bullet.prefab", None).await.unwrap();

    assert_eq!(spawner.cache().loader().issued_count("bullet.prefab"), 1);
    assert_eq!(prefab.ledger().created(), 1);
    assert_eq!(second.serial(), 1);
}

#[tokio::test]
async fn concurrent_first_spawns_share_one_pool() {
    let (spawner, prefab) = spawner(PoolConfig::default());
    spawner.cache().loader().pause();

    let a = spawner.clone();
    let b = spawner.clone();
    let tasks = (
        tokio::spawn(async move { a.spawn::<Probe>("bullet.prefab", None).await }),
        tokio::spawn(async move { b.spawn::<Probe>("bullet.prefab", None).await }),
    );
    tokio::task::yield_now().await;
    spawner.cache().loader().open();

    let first = tasks.0.await.unwrap().unwrap();
    let second = tasks.1.await.unwrap().unwrap();
    assert_ne!(first.id(), second.id());
    assert_eq!(spawner.registry().lock().len(), 1);
    assert_eq!(spawner.cache().loader().issued_count("bullet.prefab"), 1);
    assert_eq!(prefab.ledger().roots_created(), 1);
}

#[tokio::test]
async fn new_pools_preload_from_configuration() {
    let config = RuntimeConfig::from_toml_str("[pool]\ndefault_preload = 4\n").unwrap();
    let (spawner, prefab) = spawner(config.pool);

    spawner.spawn::<Probe>("bullet.prefab", None).await.unwrap();

    let stats = spawner.registry().lock().stats("bullet.prefab").unwrap();
    assert_eq!((stats.active, stats.inactive), (1, 3));
    assert_eq!(prefab.ledger().created(), 4);
}

#[tokio::test]
async fn spawn_of_unknown_prefab_fails_without_a_pool() {
    let (spawner, _) = spawner(PoolConfig::default());

    let err = spawner
        .spawn::<Probe>("missing.prefab", None)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::LoadFailed { ref key, .. } if key == "missing.prefab"));
    assert!(!spawner.registry().lock().has_pool("missing.prefab"));
}

#[tokio::test]
async fn despawn_after_pool_removal_destroys() {
    let (spawner, prefab) = spawner(PoolConfig::default());
    let probe = spawner.spawn::<Probe>("bullet.prefab", None).await.unwrap();
    let observer = probe.instance().clone();

    spawner.registry().lock().remove_pool("bullet.prefab").unwrap();
    assert_eq!(spawner.despawn(probe).unwrap(), Disposition::Destroyed);
    assert!(!observer.is_alive());
    assert_eq!(prefab.ledger().roots_destroyed(), 1);
}
