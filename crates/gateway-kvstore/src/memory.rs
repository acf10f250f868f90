//! An in-process `KVStore` used by tests across the workspace (and by the
//! quota-ledger property tests in particular, which drive many concurrent
//! Approve/Publish/Rollback sequences without a live Redis).

use crate::store::{ApproveOutcome, KVStore};
use async_trait::async_trait;
use gateway_core::GatewayError;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

#[derive(Default)]
struct Data {
    strings: HashMap<String, String>,
    hashes: HashMap<String, HashMap<String, String>>,
    sets: HashMap<String, HashSet<String>>,
}

/// Guarded by a single mutex: correct but not meant for production scale,
/// mirroring how the teacher's own test doubles favor clarity over
/// performance (e.g. its fake Kubernetes API clients).
#[derive(Default)]
pub struct MemoryStore {
    data: Mutex<Data>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KVStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, GatewayError> {
        Ok(self.data.lock().unwrap().strings.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), GatewayError> {
        self.data
            .lock()
            .unwrap()
            .strings
            .insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    async fn del(&self, key: &str) -> Result<(), GatewayError> {
        let mut data = self.data.lock().unwrap();
        data.strings.remove(key);
        data.hashes.remove(key);
        data.sets.remove(key);
        Ok(())
    }

    async fn hget(&self, key: &str, field: &str) -> Result<Option<String>, GatewayError> {
        Ok(self
            .data
            .lock()
            .unwrap()
            .hashes
            .get(key)
            .and_then(|h| h.get(field))
            .cloned())
    }

    async fn hset(&self, key: &str, field: &str, value: &str) -> Result<(), GatewayError> {
        self.data
            .lock()
            .unwrap()
            .hashes
            .entry(key.to_owned())
            .or_default()
            .insert(field.to_owned(), value.to_owned());
        Ok(())
    }

    async fn hdel(&self, key: &str, field: &str) -> Result<(), GatewayError> {
        if let Some(h) = self.data.lock().unwrap().hashes.get_mut(key) {
            h.remove(field);
        }
        Ok(())
    }

    async fn hgetall(&self, key: &str) -> Result<HashMap<String, String>, GatewayError> {
        Ok(self
            .data
            .lock()
            .unwrap()
            .hashes
            .get(key)
            .cloned()
            .unwrap_or_default())
    }

    async fn sadd(&self, key: &str, member: &str) -> Result<(), GatewayError> {
        self.data
            .lock()
            .unwrap()
            .sets
            .entry(key.to_owned())
            .or_default()
            .insert(member.to_owned());
        Ok(())
    }

    async fn srem(&self, key: &str, member: &str) -> Result<(), GatewayError> {
        if let Some(s) = self.data.lock().unwrap().sets.get_mut(key) {
            s.remove(member);
        }
        Ok(())
    }

    async fn sismember(&self, key: &str, member: &str) -> Result<bool, GatewayError> {
        Ok(self
            .data
            .lock()
            .unwrap()
            .sets
            .get(key)
            .is_some_and(|s| s.contains(member)))
    }

    async fn smembers(&self, key: &str) -> Result<Vec<String>, GatewayError> {
        Ok(self
            .data
            .lock()
            .unwrap()
            .sets
            .get(key)
            .map(|s| s.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn incr(&self, key: &str, delta: i64) -> Result<i64, GatewayError> {
        let mut data = self.data.lock().unwrap();
        let entry = data.strings.entry(key.to_owned()).or_insert_with(|| "0".to_owned());
        let next = entry.parse::<i64>().unwrap_or(0) + delta;
        *entry = next.to_string();
        Ok(next)
    }

    async fn approve_capacity(
        &self,
        hash_key: &str,
        stream_field: &str,
        capacity_field: &str,
        amount: u64,
        cap: u64,
    ) -> Result<ApproveOutcome, GatewayError> {
        let mut data = self.data.lock().unwrap();
        let hash = data.hashes.entry(hash_key.to_owned()).or_default();

        let current: u64 = hash
            .get(stream_field)
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);

        if hash.contains_key(capacity_field) {
            return Ok(ApproveOutcome {
                approved: true,
                current,
            });
        }

        let candidate = current + amount;
        if candidate > cap {
            return Ok(ApproveOutcome {
                approved: false,
                current,
            });
        }

        hash.insert(stream_field.to_owned(), candidate.to_string());
        hash.insert(capacity_field.to_owned(), amount.to_string());
        Ok(ApproveOutcome {
            approved: true,
            current: candidate,
        })
    }

    async fn rollback_capacity(
        &self,
        hash_key: &str,
        stream_field: &str,
        capacity_field: &str,
    ) -> Result<Option<u64>, GatewayError> {
        let mut data = self.data.lock().unwrap();
        let Some(hash) = data.hashes.get_mut(hash_key) else {
            return Ok(None);
        };
        let Some(amount_str) = hash.remove(capacity_field) else {
            return Ok(None);
        };
        let amount: u64 = amount_str.parse().unwrap_or(0);
        let current: u64 = hash
            .get(stream_field)
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);
        let next = current.saturating_sub(amount);
        hash.insert(stream_field.to_owned(), next.to_string());
        Ok(Some(amount))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn approve_then_rollback_restores_stream() {
        let store = MemoryStore::new();
        let out = store
            .approve_capacity("quota:powerflex:sys:bronze:alice:data", "stream:approved_capacity", "vol:v1:capacity", 1024, 9216)
            .await
            .unwrap();
        assert!(out.approved);
        assert_eq!(out.current, 1024);

        let rolled = store
            .rollback_capacity("quota:powerflex:sys:bronze:alice:data", "stream:approved_capacity", "vol:v1:capacity")
            .await
            .unwrap();
        assert_eq!(rolled, Some(1024));

        let remaining = store
            .hget("quota:powerflex:sys:bronze:alice:data", "stream:approved_capacity")
            .await
            .unwrap();
        assert_eq!(remaining, Some("0".to_owned()));
    }

    #[tokio::test]
    async fn approve_denies_over_cap() {
        let store = MemoryStore::new();
        store
            .approve_capacity("h", "stream:approved_capacity", "vol:v1:capacity", 9_000_000, 9_437_184)
            .await
            .unwrap();
        let out = store
            .approve_capacity("h", "stream:approved_capacity", "vol:v2:capacity", 9_000_000, 9_437_184)
            .await
            .unwrap();
        assert!(!out.approved);
        assert_eq!(out.current, 9_000_000);
    }

    #[tokio::test]
    async fn approve_is_idempotent_on_retry() {
        let store = MemoryStore::new();
        let first = store
            .approve_capacity("h", "stream:approved_capacity", "vol:v1:capacity", 1024, 9216)
            .await
            .unwrap();
        let second = store
            .approve_capacity("h", "stream:approved_capacity", "vol:v1:capacity", 1024, 9216)
            .await
            .unwrap();
        assert_eq!(first, second);
    }
}
