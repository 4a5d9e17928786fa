//! Runs the purger against a real Redis server in a container.

use anyhow::Result;
use common::config::{ReconcileConfig, StoreConfig};
use purger::{
    AccessMode, KeyValueStore, MatchCondition, Orchestrator, RecordingReporter, RedisStore,
};
use std::sync::Arc;
use std::time::Duration;
use testcontainers_modules::{
    redis::{REDIS_PORT, Redis},
    testcontainers::{ContainerAsync, runners::AsyncRunner},
};

struct RedisTestContext {
    _container: ContainerAsync<Redis>,
    config: StoreConfig,
}

impl RedisTestContext {
    async fn new() -> Result<Self> {
        let container = Redis::default().start().await?;
        let port = container.get_host_port_ipv4(REDIS_PORT).await?;

        let config = StoreConfig {
            addr: format!("127.0.0.1:{port}"),
            tls: false,
            connect_timeout: Duration::from_secs(5),
            read_timeout: Duration::from_secs(5),
            ..StoreConfig::default()
        };

        Ok(Self {
            _container: container,
            config,
        })
    }

    async fn seed(&self, commands: &[&[&str]]) -> Result<()> {
        let client = redis::Client::open(self.config.url())?;
        let mut connection = client.get_multiplexed_async_connection().await?;
        for command in commands {
            let mut cmd = redis::cmd(command[0]);
            for arg in &command[1..] {
                cmd.arg(*arg);
            }
            let () = cmd.query_async(&mut connection).await?;
        }
        Ok(())
    }

    async fn set_raw(&self, key: &[u8], value: &str) -> Result<()> {
        let client = redis::Client::open(self.config.url())?;
        let mut connection = client.get_multiplexed_async_connection().await?;
        let () = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .query_async(&mut connection)
            .await?;
        Ok(())
    }
}

fn reconcile_config() -> ReconcileConfig {
    ReconcileConfig {
        enabled: true,
        min_clean_passes: 3,
        pass_interval_ms: 10,
        max_passes: Some(100),
    }
}

#[tokio::test]
#[ignore = "requires docker"]
async fn test_list_and_purge_flat_values() -> Result<()> {
    let ctx = RedisTestContext::new().await?;
    ctx.seed(&[
        &["SET", "a", "null"],
        &["SET", "b", "nullish"],
        &["SET", "c", "null"],
    ])
    .await?;
    ctx.set_raw(b"c\xff\xfe", "null").await?;

    let store = Arc::new(RedisStore::connect(&ctx.config).await?);
    let orchestrator = Orchestrator::new(store.clone(), 1, reconcile_config());
    let condition = MatchCondition::new(AccessMode::Flat, "null");

    let mut reporter = RecordingReporter::new();
    let listed = orchestrator.list(&condition, &mut reporter).await?;
    assert_eq!(listed.matched_count, 3);
    assert_eq!(listed.total_bytes, 12);

    let mut reporter = RecordingReporter::new();
    let purged = orchestrator.purge(&condition, true, &mut reporter).await?;
    assert_eq!(purged.deleted_count, 3);
    assert_eq!(reporter.passes.len(), 3);

    assert!(!store.exists(b"a").await?);
    assert!(store.exists(b"b").await?);
    assert!(!store.exists(b"c").await?);
    assert!(!store.exists(b"c\xff\xfe").await?);
    assert_eq!(store.key_count().await?, 1);
    Ok(())
}

#[tokio::test]
#[ignore = "requires docker"]
async fn test_purge_hash_values() -> Result<()> {
    let ctx = RedisTestContext::new().await?;
    ctx.seed(&[
        &["HSET", "session:1", "payload", "null null", "owner", "x"],
        &["HSET", "session:2", "payload", "null"],
        &["SET", "plain", "null null"],
    ])
    .await?;

    let store = Arc::new(RedisStore::connect(&ctx.config).await?);
    let orchestrator = Orchestrator::new(store.clone(), 10, reconcile_config());
    let condition = MatchCondition::new(AccessMode::FieldMap, "null").with_min_occurrences(2);
    let mut reporter = RecordingReporter::new();

    let summary = orchestrator.purge(&condition, false, &mut reporter).await?;

    assert_eq!(summary.deleted_count, 1);
    assert_eq!(reporter.lines, vec!["DELETE session:1 (size = 22)"]);
    assert!(store.exists(b"session:2").await?);
    assert!(store.exists(b"plain").await?);
    Ok(())
}
