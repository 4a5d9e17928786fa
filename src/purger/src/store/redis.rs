use async_trait::async_trait;
use common::config::StoreConfig;
use ::redis::aio::MultiplexedConnection;
use ::redis::{AsyncConnectionConfig, Client, Value};

use super::{KeyValueStore, ScanPage, StoreResult};

/// Redis (or protocol-compatible) backend over a single multiplexed
/// connection. Every call is bounded by the configured response timeout.
#[derive(Clone)]
pub struct RedisStore {
    connection: MultiplexedConnection,
    description: String,
}

impl RedisStore {
    pub async fn connect(config: &StoreConfig) -> StoreResult<Self> {
        let client = Client::open(config.url())?;
        let connection_config = AsyncConnectionConfig::new()
            .set_connection_timeout(config.connect_timeout)
            .set_response_timeout(config.read_timeout);

        let connection = client
            .get_multiplexed_async_connection_with_config(&connection_config)
            .await?;

        tracing::debug!(addr = %config.addr, tls = config.tls, "Connected to store");

        Ok(Self {
            connection,
            description: format!("redis[{} tls={}]", config.addr, config.tls),
        })
    }
}

#[async_trait]
impl KeyValueStore for RedisStore {
    async fn scan(&self, cursor: u64, count: usize) -> StoreResult<ScanPage> {
        let mut connection = self.connection.clone();
        let reply: Value = ::redis::cmd("SCAN")
            .arg(cursor)
            .arg("COUNT")
            .arg(count)
            .query_async(&mut connection)
            .await?;
        parse_scan_reply(&reply)
    }

    async fn get(&self, key: &[u8]) -> StoreResult<Option<Vec<u8>>> {
        let mut connection = self.connection.clone();
        let value: Option<Vec<u8>> = ::redis::cmd("GET")
            .arg(key)
            .query_async(&mut connection)
            .await?;
        Ok(value)
    }

    async fn hash_fields(&self, key: &[u8]) -> StoreResult<Vec<(Vec<u8>, Vec<u8>)>> {
        let mut connection = self.connection.clone();
        let fields: Vec<(Vec<u8>, Vec<u8>)> = ::redis::cmd("HGETALL")
            .arg(key)
            .query_async(&mut connection)
            .await?;
        Ok(fields)
    }

    async fn delete(&self, key: &[u8]) -> StoreResult<bool> {
        let mut connection = self.connection.clone();
        let removed: i64 = ::redis::cmd("DEL")
            .arg(key)
            .query_async(&mut connection)
            .await?;
        Ok(removed > 0)
    }

    async fn exists(&self, key: &[u8]) -> StoreResult<bool> {
        let mut connection = self.connection.clone();
        let found: i64 = ::redis::cmd("EXISTS")
            .arg(key)
            .query_async(&mut connection)
            .await?;
        Ok(found > 0)
    }

    async fn key_count(&self) -> StoreResult<u64> {
        let mut connection = self.connection.clone();
        let count: u64 = ::redis::cmd("DBSIZE").query_async(&mut connection).await?;
        Ok(count)
    }

    fn describe(&self) -> String {
        self.description.clone()
    }
}

/// Decode a `SCAN` reply. Keys stay raw bytes so a key that is not valid
/// UTF-8 cannot fail the page it arrived in.
fn parse_scan_reply(reply: &Value) -> StoreResult<ScanPage> {
    let (cursor, keys): (u64, Vec<Vec<u8>>) = ::redis::from_redis_value(reply)?;
    Ok(ScanPage { cursor, keys })
}
