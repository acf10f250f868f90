//! The request fingerprint that keys quota reservations.

use crate::family::ArrayFamily;
use serde::{Deserialize, Serialize};

/// Uniquely identifies one quota-relevant request within a tenant's lifetime
/// for a given volume (`spec.md` §4.1, "Request fingerprint").
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint {
    pub family: ArrayFamily,
    pub system_id: String,
    pub pool: String,
    pub tenant: String,
    pub volume_name: String,
    pub capacity_kb: u64,
}

impl Fingerprint {
    pub fn new(
        family: ArrayFamily,
        system_id: impl Into<String>,
        pool: impl Into<String>,
        tenant: impl Into<String>,
        volume_name: impl Into<String>,
        capacity_kb: u64,
    ) -> Self {
        Self {
            family,
            system_id: system_id.into(),
            pool: pool.into(),
            tenant: tenant.into(),
            volume_name: volume_name.into(),
            capacity_kb,
        }
    }

    /// The hash key holding this fingerprint's quota-entry fields:
    /// `quota:<family>:<sys>:<pool>:<tenant>:data` (`spec.md` §3).
    pub fn quota_hash_key(&self) -> String {
        format!(
            "quota:{}:{}:{}:{}:data",
            self.family, self.system_id, self.pool, self.tenant
        )
    }

    pub fn capacity_field(&self) -> String {
        format!("vol:{}:capacity", self.volume_name)
    }

    pub fn created_field(&self) -> String {
        format!("vol:{}:created", self.volume_name)
    }

    pub fn deleted_field(&self) -> String {
        format!("vol:{}:deleted", self.volume_name)
    }

    pub const STREAM_FIELD: &'static str = "stream:approved_capacity";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_key_matches_schema() {
        let fp = Fingerprint::new(ArrayFamily::PowerFlex, "542a2d5f5122210f", "bronze", "Alice", "v1", 1_048_576);
        assert_eq!(fp.quota_hash_key(), "quota:powerflex:542a2d5f5122210f:bronze:Alice:data");
        assert_eq!(fp.capacity_field(), "vol:v1:capacity");
        assert_eq!(fp.created_field(), "vol:v1:created");
        assert_eq!(fp.deleted_field(), "vol:v1:deleted");
    }
}
