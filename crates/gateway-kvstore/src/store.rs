//! The `KVStore` contract (`spec.md` §2): the only abstraction the gateway's
//! other components depend on for persistence.

use async_trait::async_trait;
use gateway_core::GatewayError;
use std::collections::HashMap;

/// Outcome of an atomic approve (`spec.md` §4.1, `ApproveRequest`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApproveOutcome {
    pub approved: bool,
    pub current: u64,
}

/// String GET/SET, hash field operations, set membership, atomic counters,
/// and scripted atomic multi-key updates, over a shared external store.
#[async_trait]
pub trait KVStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, GatewayError>;
    async fn set(&self, key: &str, value: &str) -> Result<(), GatewayError>;
    async fn del(&self, key: &str) -> Result<(), GatewayError>;

    async fn hget(&self, key: &str, field: &str) -> Result<Option<String>, GatewayError>;
    async fn hset(&self, key: &str, field: &str, value: &str) -> Result<(), GatewayError>;
    async fn hdel(&self, key: &str, field: &str) -> Result<(), GatewayError>;
    async fn hgetall(&self, key: &str) -> Result<HashMap<String, String>, GatewayError>;

    async fn sadd(&self, key: &str, member: &str) -> Result<(), GatewayError>;
    async fn srem(&self, key: &str, member: &str) -> Result<(), GatewayError>;
    async fn sismember(&self, key: &str, member: &str) -> Result<bool, GatewayError>;
    async fn smembers(&self, key: &str) -> Result<Vec<String>, GatewayError>;

    async fn incr(&self, key: &str, delta: i64) -> Result<i64, GatewayError>;

    /// Atomic reservation: increments `stream_field` on `hash_key` by `amount`
    /// and sets `capacity_field` to `amount` **iff** the new total is `<=
    /// cap`; otherwise the hash is left untouched. Idempotent on retry: if
    /// `capacity_field` is already present the call succeeds without
    /// mutating `stream_field` again, per `spec.md` §4.1's idempotence
    /// requirement keyed on the volume name.
    async fn approve_capacity(
        &self,
        hash_key: &str,
        stream_field: &str,
        capacity_field: &str,
        amount: u64,
        cap: u64,
    ) -> Result<ApproveOutcome, GatewayError>;

    /// Atomic rollback: if `capacity_field` is present on `hash_key`, removes
    /// it and decrements `stream_field` by the value it held, returning that
    /// value. Returns `Ok(None)` if `capacity_field` is absent (nothing to
    /// roll back — `spec.md` §4.1's `DeleteRequest` "refuses if absent").
    async fn rollback_capacity(
        &self,
        hash_key: &str,
        stream_field: &str,
        capacity_field: &str,
    ) -> Result<Option<u64>, GatewayError>;
}
