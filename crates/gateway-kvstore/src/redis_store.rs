//! Redis-backed `KVStore`.
//!
//! Connection handling follows the pattern the example pack reaches for
//! whenever it needs a resilient async Redis client: `redis::aio::
//! ConnectionManager`, which transparently reconnects, wrapped behind our
//! own bounded-backoff retry for the deadline semantics `spec.md` §4.1
//! requires.

use crate::backoff::retry_until_deadline;
use crate::store::{ApproveOutcome, KVStore};
use async_trait::async_trait;
use gateway_core::GatewayError;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::collections::HashMap;
use std::time::Duration;
use tracing::warn;

/// Lua script implementing `approve_capacity`. Keeps the read-check-write
/// inside one atomic server-side step so concurrent gateway replicas can't
/// race past the cap (`spec.md` §4.1, "Atomicity policy").
const APPROVE_SCRIPT: &str = r#"
local hash_key = KEYS[1]
local stream_field = ARGV[1]
local capacity_field = ARGV[2]
local amount = tonumber(ARGV[3])
local cap = tonumber(ARGV[4])

if redis.call('HEXISTS', hash_key, capacity_field) == 1 then
    local current = tonumber(redis.call('HGET', hash_key, stream_field) or '0')
    return {1, current}
end

local current = tonumber(redis.call('HGET', hash_key, stream_field) or '0')
local candidate = current + amount
if candidate > cap then
    return {0, current}
end

redis.call('HINCRBY', hash_key, stream_field, amount)
redis.call('HSET', hash_key, capacity_field, amount)
return {1, candidate}
"#;

/// Lua script implementing `rollback_capacity`.
const ROLLBACK_SCRIPT: &str = r#"
local hash_key = KEYS[1]
local stream_field = ARGV[1]
local capacity_field = ARGV[2]

local amount = redis.call('HGET', hash_key, capacity_field)
if not amount then
    return nil
end
amount = tonumber(amount)

redis.call('HDEL', hash_key, capacity_field)
redis.call('HINCRBY', hash_key, stream_field, -amount)
return amount
"#;

pub struct RedisStore {
    conn: ConnectionManager,
    call_deadline: Duration,
}

impl RedisStore {
    /// Connects using a `redis://[:password@]host:port` URL. `call_deadline`
    /// bounds the total time any one operation may spend retrying.
    pub async fn connect(url: &str, call_deadline: Duration) -> anyhow::Result<Self> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self {
            conn,
            call_deadline,
        })
    }

    fn transport_err(e: redis::RedisError) -> GatewayError {
        GatewayError::Transport(e.to_string())
    }
}

#[async_trait]
impl KVStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>, GatewayError> {
        let mut conn = self.conn.clone();
        retry_until_deadline(self.call_deadline, || {
            let mut conn = conn.clone();
            let key = key.to_owned();
            async move { conn.get(&key).await.map_err(Self::transport_err) }
        })
        .await
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), GatewayError> {
        let mut conn = self.conn.clone();
        retry_until_deadline(self.call_deadline, || {
            let mut conn = conn.clone();
            let (key, value) = (key.to_owned(), value.to_owned());
            async move { conn.set(&key, &value).await.map_err(Self::transport_err) }
        })
        .await
    }

    async fn del(&self, key: &str) -> Result<(), GatewayError> {
        let mut conn = self.conn.clone();
        retry_until_deadline(self.call_deadline, || {
            let mut conn = conn.clone();
            let key = key.to_owned();
            async move { conn.del(&key).await.map_err(Self::transport_err) }
        })
        .await
    }

    async fn hget(&self, key: &str, field: &str) -> Result<Option<String>, GatewayError> {
        let mut conn = self.conn.clone();
        retry_until_deadline(self.call_deadline, || {
            let mut conn = conn.clone();
            let (key, field) = (key.to_owned(), field.to_owned());
            async move { conn.hget(&key, &field).await.map_err(Self::transport_err) }
        })
        .await
    }

    async fn hset(&self, key: &str, field: &str, value: &str) -> Result<(), GatewayError> {
        let mut conn = self.conn.clone();
        retry_until_deadline(self.call_deadline, || {
            let mut conn = conn.clone();
            let (key, field, value) = (key.to_owned(), field.to_owned(), value.to_owned());
            async move {
                conn.hset(&key, &field, &value)
                    .await
                    .map_err(Self::transport_err)
            }
        })
        .await
    }

    async fn hdel(&self, key: &str, field: &str) -> Result<(), GatewayError> {
        let mut conn = self.conn.clone();
        retry_until_deadline(self.call_deadline, || {
            let mut conn = conn.clone();
            let (key, field) = (key.to_owned(), field.to_owned());
            async move { conn.hdel(&key, &field).await.map_err(Self::transport_err) }
        })
        .await
    }

    async fn hgetall(&self, key: &str) -> Result<HashMap<String, String>, GatewayError> {
        let mut conn = self.conn.clone();
        retry_until_deadline(self.call_deadline, || {
            let mut conn = conn.clone();
            let key = key.to_owned();
            async move { conn.hgetall(&key).await.map_err(Self::transport_err) }
        })
        .await
    }

    async fn sadd(&self, key: &str, member: &str) -> Result<(), GatewayError> {
        let mut conn = self.conn.clone();
        retry_until_deadline(self.call_deadline, || {
            let mut conn = conn.clone();
            let (key, member) = (key.to_owned(), member.to_owned());
            async move { conn.sadd(&key, &member).await.map_err(Self::transport_err) }
        })
        .await
    }

    async fn srem(&self, key: &str, member: &str) -> Result<(), GatewayError> {
        let mut conn = self.conn.clone();
        retry_until_deadline(self.call_deadline, || {
            let mut conn = conn.clone();
            let (key, member) = (key.to_owned(), member.to_owned());
            async move { conn.srem(&key, &member).await.map_err(Self::transport_err) }
        })
        .await
    }

    async fn sismember(&self, key: &str, member: &str) -> Result<bool, GatewayError> {
        let mut conn = self.conn.clone();
        retry_until_deadline(self.call_deadline, || {
            let mut conn = conn.clone();
            let (key, member) = (key.to_owned(), member.to_owned());
            async move {
                conn.sismember(&key, &member)
                    .await
                    .map_err(Self::transport_err)
            }
        })
        .await
    }

    async fn smembers(&self, key: &str) -> Result<Vec<String>, GatewayError> {
        let mut conn = self.conn.clone();
        retry_until_deadline(self.call_deadline, || {
            let mut conn = conn.clone();
            let key = key.to_owned();
            async move { conn.smembers(&key).await.map_err(Self::transport_err) }
        })
        .await
    }

    async fn incr(&self, key: &str, delta: i64) -> Result<i64, GatewayError> {
        let mut conn = self.conn.clone();
        retry_until_deadline(self.call_deadline, || {
            let mut conn = conn.clone();
            let key = key.to_owned();
            async move { conn.incr(&key, delta).await.map_err(Self::transport_err) }
        })
        .await
    }

    async fn approve_capacity(
        &self,
        hash_key: &str,
        stream_field: &str,
        capacity_field: &str,
        amount: u64,
        cap: u64,
    ) -> Result<ApproveOutcome, GatewayError> {
        let mut conn = self.conn.clone();
        let script = redis::Script::new(APPROVE_SCRIPT);
        let (approved, current): (i64, u64) = retry_until_deadline(self.call_deadline, || {
            let mut conn = conn.clone();
            let script = script.clone();
            let hash_key = hash_key.to_owned();
            let (stream_field, capacity_field) =
                (stream_field.to_owned(), capacity_field.to_owned());
            async move {
                script
                    .key(hash_key)
                    .arg(stream_field)
                    .arg(capacity_field)
                    .arg(amount)
                    .arg(cap)
                    .invoke_async(&mut conn)
                    .await
                    .map_err(Self::transport_err)
            }
        })
        .await?;

        if approved != 1 {
            warn!(hash_key, amount, cap, current, "quota approval denied");
        }
        Ok(ApproveOutcome {
            approved: approved == 1,
            current,
        })
    }

    async fn rollback_capacity(
        &self,
        hash_key: &str,
        stream_field: &str,
        capacity_field: &str,
    ) -> Result<Option<u64>, GatewayError> {
        let mut conn = self.conn.clone();
        let script = redis::Script::new(ROLLBACK_SCRIPT);
        retry_until_deadline(self.call_deadline, || {
            let mut conn = conn.clone();
            let script = script.clone();
            let hash_key = hash_key.to_owned();
            let (stream_field, capacity_field) =
                (stream_field.to_owned(), capacity_field.to_owned());
            async move {
                script
                    .key(hash_key)
                    .arg(stream_field)
                    .arg(capacity_field)
                    .invoke_async(&mut conn)
                    .await
                    .map_err(Self::transport_err)
            }
        })
        .await
    }
}
