//! Redis-backed [`KvStore`](crate::KvStore).

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tracing::{debug, info, warn};

use crate::error::KvError;
use crate::KvStore;

/// *Check-and-release*: delete the lock key iff its value still matches the
/// caller's token. `KEYS[1]` = lock key, `ARGV[1]` = token.
pub const CHECK_AND_RELEASE: &str = r#"
local got = redis.call("get", KEYS[1])
if (not got or got ~= ARGV[1]) then
    return 0
else
    return redis.call("del", KEYS[1])
end
"#;

/// *Check-and-renew*: extend the lock key's TTL iff its value still matches
/// the caller's token. `KEYS[1]` = lock key, `ARGV[1]` = token,
/// `ARGV[2]` = new TTL in seconds.
pub const CHECK_AND_RENEW: &str = r#"
local got = redis.call("get", KEYS[1])
if (not got or got ~= ARGV[1]) then
    return 0
else
    return redis.call("expire", KEYS[1], ARGV[2])
end
"#;

/// Connection-pool knobs for [`RedisKvStore`].
#[derive(Debug, Clone)]
pub struct RedisOptions {
    /// Idle connections are recycled after this many seconds.
    pub idle_timeout_secs: u64,
    /// Upper bound on concurrently open connections.
    pub max_connections: u32,
}

impl Default for RedisOptions {
    fn default() -> Self {
        Self {
            idle_timeout_secs: 10,
            max_connections: 100,
        }
    }
}

/// A [`KvStore`] backed by a real Redis (or Redis-compatible) server.
pub struct RedisKvStore {
    conn: ConnectionManager,
    #[allow(dead_code)]
    opts: RedisOptions,
}

impl RedisKvStore {
    /// Connect to `addr` (e.g. `redis://127.0.0.1:6379`) using the given options.
    pub async fn connect(addr: &str, opts: RedisOptions) -> Result<Self, KvError> {
        debug!(%addr, max_connections = opts.max_connections, "connecting to redis");
        let client = redis::Client::open(addr).map_err(KvError::from)?;
        let conn = client.get_connection_manager().await.map_err(|err| {
            warn!(%addr, %err, "failed to establish redis connection");
            KvError::from(err)
        })?;
        info!(%addr, "redis connection established");
        Ok(Self { conn, opts })
    }

    fn require_non_empty(key: &str) -> Result<(), KvError> {
        if key.is_empty() {
            return Err(KvError::InvalidArgument(
                "redis key can't be empty".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl KvStore for RedisKvStore {
    async fn get(&self, key: &str) -> Result<Option<String>, KvError> {
        Self::require_non_empty(key)?;
        let mut conn = self.conn.clone();
        let value: Option<String> = conn.get(key).await.map_err(KvError::from)?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), KvError> {
        Self::require_non_empty(key)?;
        let mut conn = self.conn.clone();
        let _: () = conn.set(key, value).await.map_err(KvError::from)?;
        Ok(())
    }

    async fn set_nx(&self, key: &str, value: &str) -> Result<bool, KvError> {
        Self::require_non_empty(key)?;
        let mut conn = self.conn.clone();
        let set: bool = conn.set_nx(key, value).await.map_err(KvError::from)?;
        Ok(set)
    }

    async fn set_nx_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<bool, KvError> {
        Self::require_non_empty(key)?;
        let mut conn = self.conn.clone();
        let opts = redis::SetOptions::default()
            .conditional_set(redis::ExistenceCheck::NX)
            .with_expiration(redis::SetExpiry::EX(ttl_secs as usize));
        let reply: redis::Value = conn.set_options(key, value, opts).await.map_err(KvError::from)?;
        Ok(!matches!(reply, redis::Value::Nil))
    }

    async fn del(&self, key: &str) -> Result<(), KvError> {
        Self::require_non_empty(key)?;
        let mut conn = self.conn.clone();
        let _: () = conn.del(key).await.map_err(KvError::from)?;
        Ok(())
    }

    async fn eval_int(&self, script: &str, keys: &[&str], args: &[&str]) -> Result<i64, KvError> {
        let mut conn = self.conn.clone();
        let mut invocation = redis::Script::new(script).prepare_invoke();
        for key in keys {
            invocation.key(*key);
        }
        for arg in args {
            invocation.arg(*arg);
        }
        let result: i64 = invocation
            .invoke_async(&mut conn)
            .await
            .map_err(KvError::from)?;
        Ok(result)
    }
}
