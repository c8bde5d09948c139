//! Object pool lifecycle tests.
//!
//! Preload, get/return cycles, membership checks and hook counts on clear.

use std::sync::Arc;

use cellar_resource::testing::{HookLedger, Probe, ProbeFactory};
use cellar_resource::{Error, ObjectPool, Poolable};
use pretty_assertions::assert_eq;

fn bullet_pool(preload: usize) -> (ObjectPool<Probe>, Arc<HookLedger>) {
    let factory = ProbeFactory::new();
    let ledger = factory.ledger();
    (ObjectPool::new("bullet", factory, preload), ledger)
}

#[test]
fn preload_fills_the_inactive_set() {
    for preload in [0, 1, 5] {
        let (pool, ledger) = bullet_pool(preload);
        assert_eq!(pool.inactive_count(), preload);
        assert_eq!(pool.active_count(), 0);
        assert_eq!(ledger.created(), preload);
        assert_eq!(ledger.gets(), 0);
    }
}

#[test]
fn get_then_return_restores_counts_and_reuses_instance() {
    let (mut pool, ledger) = bullet_pool(2);

    let pooled = pool.get(None);
    assert_eq!((pool.active_count(), pool.inactive_count()), (1, 1));
    pool.return_instance(&pooled).unwrap();
    assert_eq!((pool.active_count(), pool.inactive_count()), (0, 2));

    let again = pool.get(None);
    assert_eq!(again.id(), pooled.id());
    assert_eq!(*again, *pooled);
    assert_eq!(ledger.created(), 2);
}

#[test]
fn double_return_reports_invalid_membership() {
    let (mut pool, _) = bullet_pool(0);
    let pooled = pool.get(None);

    assert_eq!(pool.return_instance(&pooled), Ok(()));
    let err = pool.return_instance(&pooled).unwrap_err();
    assert_eq!(err, Error::invalid_membership("bullet", pooled.id()));
    assert_eq!(pool.inactive_count(), 1);
}

#[test]
fn fourth_get_creates_exactly_one_instance() {
    let (mut pool, ledger) = bullet_pool(3);

    let held: Vec<_> = (0..3).map(|_| pool.get(None)).collect();
    assert_eq!(pool.inactive_count(), 0);
    assert_eq!(pool.active_count(), 3);
    assert_eq!(ledger.created(), 3);

    let fourth = pool.get(None);
    assert_eq!(ledger.created(), 4);
    assert_eq!(pool.active_count(), 4);
    assert_eq!(pool.creation_count(), 4);
    assert!(held.iter().all(|p| p.id() != fourth.id()));
}

#[test]
fn clear_releases_active_and_inactive_instances() {
    let (mut pool, ledger) = bullet_pool(5);
    let a = pool.get(None);
    let b = pool.get(None);
    assert_eq!((pool.active_count(), pool.inactive_count()), (2, 3));

    pool.clear();

    assert_eq!((pool.active_count(), pool.inactive_count()), (0, 0));
    assert_eq!(ledger.releases(), 5);
    assert_eq!(ledger.destroyed(), 5);
    assert!(!a.is_alive() && !b.is_alive());

    // Still usable, and the old handles are no longer members.
    assert!(matches!(
        pool.return_instance(&a),
        Err(Error::InvalidMembership { .. })
    ));
    let fresh = pool.get(None);
    assert!(fresh.is_alive());
    assert_eq!(ledger.created(), 6);
}

#[test]
fn release_hook_runs_before_destroy() {
    let (mut pool, _) = bullet_pool(0);
    let pooled = pool.get(None);
    pool.clear();

    let journal = pooled.journal();
    let tail: Vec<&str> = journal.iter().rev().take(2).rev().map(String::as_str).collect();
    assert_eq!(tail, vec!["on_release", "destroy"]);
}

#[test]
fn dispose_destroys_the_root() {
    let (pool, ledger) = bullet_pool(1);
    assert_eq!(ledger.roots_created(), 1);
    pool.dispose();
    assert_eq!(ledger.roots_destroyed(), 1);
    assert_eq!(ledger.releases(), 1);
}

#[test]
fn hooks_fire_once_per_transition() {
    let (mut pool, ledger) = bullet_pool(0);
    for _ in 0..4 {
        let pooled = pool.get(None);
        pool.return_instance(&pooled).unwrap();
    }
    assert_eq!(ledger.created(), 1);
    assert_eq!(ledger.gets(), 4);
    assert_eq!(ledger.returns(), 4);
    assert_eq!(ledger.releases(), 0);

    let stats = pool.stats();
    assert_eq!(stats.total_gets, 4);
    assert_eq!(stats.total_returns, 4);
    assert_eq!(stats.created, 1);
    assert_eq!(stats.destroyed, 0);
}

#[test]
fn pooled_records_its_pool() {
    let (mut pool, _) = bullet_pool(0);
    let parent = String::from("Arena");
    let pooled = pool.get(Some(&parent));
    assert_eq!(pooled.pool_key(), "bullet");
    assert!(pool.is_active(&pooled));
    assert_eq!(pooled.instance().parent().as_deref(), Some("Arena"));
}
