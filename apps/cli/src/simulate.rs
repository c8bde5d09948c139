//! `cellar simulate`: spawn rounds against a scripted loader

use std::collections::BTreeMap;
use std::iter;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use cellar_resource::{
    CacheStats, PoolRegistry, PoolStats, ResourceCache, RuntimeConfig, Spawner,
};
use parking_lot::Mutex;
use serde::Serialize;

use crate::prefab::{ScriptedLoader, Sprite};

/// Spawn rounds run per simulation; the second round exercises reuse
const ROUNDS: usize = 2;

/// What to simulate
#[derive(Debug, Clone)]
pub struct Options {
    pub spawns: usize,
    pub prefabs: Vec<String>,
    pub latency: Duration,
}

/// Statistics printed at the end of a simulation
#[derive(Debug, Serialize)]
pub struct Report {
    pub config: RuntimeConfig,
    pub rounds: usize,
    pub cache: CacheStats,
    pub pools: BTreeMap<String, PoolStats>,
}

pub async fn run(config: &RuntimeConfig, options: &Options) -> Result<Report> {
    let loader = ScriptedLoader::new(options.prefabs.clone(), options.latency);
    let cache = ResourceCache::with_config(loader, config.cache.clone());
    let registry = Arc::new(Mutex::new(PoolRegistry::with_config(config.pool.clone())));
    let spawner = Spawner::new(cache, registry);
    let stage = String::from("Stage");

    for round in 1..=ROUNDS {
        let requests = options
            .prefabs
            .iter()
            .flat_map(|key| iter::repeat_n(key, options.spawns))
            .map(|key| spawner.spawn::<Sprite>(key, Some(&stage)));
        let sprites = futures::future::try_join_all(requests)
            .await
            .with_context(|| format!("spawn round {round}"))?;
        tracing::info!(round, spawned = sprites.len(), "Spawned sprites");

        for sprite in sprites {
            tracing::trace!(instance = %sprite.id(), parent = ?sprite.parent(), "Despawning sprite");
            spawner
                .despawn(sprite)
                .with_context(|| format!("despawn in round {round}"))?;
        }
    }

    let pools = {
        let registry = spawner.registry().lock();
        registry
            .keys()
            .into_iter()
            .filter_map(|key| registry.stats(&key).map(|stats| (key, stats)))
            .collect()
    };

    Ok(Report {
        config: config.clone(),
        rounds: ROUNDS,
        cache: spawner.cache().stats(),
        pools,
    })
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn options(spawns: usize) -> Options {
        Options {
            spawns,
            prefabs: vec!["bullet".to_owned(), "spark".to_owned()],
            latency: Duration::ZERO,
        }
    }

    #[tokio::test]
    async fn concurrent_spawns_share_one_load_per_prefab() {
        let report = run(&RuntimeConfig::default(), &options(3)).await.unwrap();

        assert_eq!(report.cache.loads_issued, 2);
        assert_eq!(report.cache.coalesced, 4);
        assert_eq!(report.cache.loaded, 2);

        let bullet = &report.pools["bullet"];
        assert_eq!(bullet.created, 3);
        assert_eq!(bullet.total_gets, 6);
        assert_eq!(bullet.total_returns, 6);
        assert_eq!((bullet.active, bullet.inactive), (0, 3));
    }

    #[tokio::test]
    async fn inactive_cap_destroys_surplus_returns() {
        let mut config = RuntimeConfig::default();
        config.pool.max_inactive = Some(1);

        let report = run(&config, &options(3)).await.unwrap();
        let spark = &report.pools["spark"];
        assert_eq!(spark.created, 5);
        assert_eq!(spark.destroyed, 4);
        assert_eq!(spark.inactive, 1);
    }

    #[tokio::test]
    async fn report_serialises_as_json() {
        let report = run(&RuntimeConfig::default(), &options(1)).await.unwrap();
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["rounds"], 2);
        assert_eq!(json["pools"]["spark"]["created"], 1);
        assert_eq!(json["config"]["pool"]["auto_create"], true);
    }
}
