//! `QuotaLedger`: atomic per-fingerprint reservation, commit, and rollback
//! over `KVStore` primitives (`spec.md` §4.1).

use gateway_core::model::VolumeSummary;
use gateway_core::{Fingerprint, GatewayError};
use gateway_kvstore::KVStore;
use std::sync::Arc;
use tracing::instrument;

/// Outcome of [`QuotaLedger::approve_request`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApproveResult {
    pub approved: bool,
    pub current: u64,
}

/// Outcome of [`QuotaLedger::delete_request`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeleteResult {
    pub approved: bool,
}

/// Outcome of [`QuotaLedger::validate_ownership`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OwnershipResult {
    pub owned: bool,
    pub approved: u64,
}

/// Atomic reservation ledger keyed by [`Fingerprint`]. All mutation happens
/// on a single hash key per (family, system, pool, tenant) so the
/// `KVStore`'s single-key atomicity is sufficient across concurrent gateway
/// replicas (`spec.md` §4.1, "Atomicity policy").
pub struct QuotaLedger {
    store: Arc<dyn KVStore>,
}

impl QuotaLedger {
    pub fn new(store: Arc<dyn KVStore>) -> Self {
        Self { store }
    }

    /// Approve a prospective volume creation against `cap` (in KB). Atomic,
    /// and idempotent on retry via the volume name (`spec.md` §4.1).
    #[instrument(skip(self), fields(tenant = %req.tenant, family = %req.family, volume = %req.volume_name))]
    pub async fn approve_request(
        &self,
        req: &Fingerprint,
        cap: u64,
    ) -> Result<ApproveResult, GatewayError> {
        let outcome = self
            .store
            .approve_capacity(
                &req.quota_hash_key(),
                Fingerprint::STREAM_FIELD,
                &req.capacity_field(),
                req.capacity_kb,
                cap,
            )
            .await?;
        Ok(ApproveResult {
            approved: outcome.approved,
            current: outcome.current,
        })
    }

    /// Marks the volume created. Non-destructive if already marked.
    pub async fn publish_created(&self, req: &Fingerprint) -> Result<(), GatewayError> {
        self.store
            .hset(&req.quota_hash_key(), &req.created_field(), "true")
            .await
    }

    /// Marks the volume deleted and rolls back its approved capacity.
    /// Refuses (returns `approved: false`) if the volume was never approved.
    #[instrument(skip(self), fields(tenant = %req.tenant, family = %req.family, volume = %req.volume_name))]
    pub async fn delete_request(&self, req: &Fingerprint) -> Result<DeleteResult, GatewayError> {
        let rolled_back = self
            .store
            .rollback_capacity(
                &req.quota_hash_key(),
                Fingerprint::STREAM_FIELD,
                &req.capacity_field(),
            )
            .await?;

        match rolled_back {
            Some(_amount) => {
                self.store
                    .hset(&req.quota_hash_key(), &req.deleted_field(), "true")
                    .await?;
                Ok(DeleteResult { approved: true })
            }
            None => Ok(DeleteResult { approved: false }),
        }
    }

    /// Final delete acknowledgment. Entries may later be reaped by periodic
    /// compaction (out of core scope, `spec.md` §4.1).
    pub async fn publish_deleted(&self, req: &Fingerprint) -> Result<(), GatewayError> {
        self.store
            .hset(&req.quota_hash_key(), &req.deleted_field(), "true")
            .await
    }

    /// True iff `vol:<v>:capacity` exists under the requesting tenant's hash
    /// (`spec.md` §4.1, used to reject cross-tenant deletes).
    pub async fn validate_ownership(
        &self,
        req: &Fingerprint,
    ) -> Result<OwnershipResult, GatewayError> {
        let hash = self.store.hgetall(&req.quota_hash_key()).await?;
        match hash.get(&req.capacity_field()) {
            Some(v) => Ok(OwnershipResult {
                owned: true,
                approved: v.parse().unwrap_or(0),
            }),
            None => Ok(OwnershipResult {
                owned: false,
                approved: 0,
            }),
        }
    }

    /// Undo an approval that was never forwarded to the array (a rejected
    /// or errored request), without marking the volume deleted. Used by
    /// `ArrayHandlerFamily` on a non-2xx array response (`spec.md` §4.2
    /// step 7).
    pub async fn rollback_reservation(&self, req: &Fingerprint) -> Result<(), GatewayError> {
        self.store
            .rollback_capacity(
                &req.quota_hash_key(),
                Fingerprint::STREAM_FIELD,
                &req.capacity_field(),
            )
            .await?;
        Ok(())
    }

    /// Secondary index backing `VolumesQuery` (`spec.md` §4, `GET
    /// /proxy/volumes/`): the `KVStore` schema in §3 has no keys-matching
    /// scan, so the gateway maintains an explicit per-tenant set of
    /// volume summaries alongside the quota hash.
    fn volumes_index_key(tenant: &str) -> String {
        format!("tenant:{tenant}:volumes")
    }

    pub async fn index_volume(&self, tenant: &str, summary: &VolumeSummary) -> Result<(), GatewayError> {
        let encoded = serde_json::to_string(summary).map_err(|e| GatewayError::Internal(e.to_string()))?;
        self.store.sadd(&Self::volumes_index_key(tenant), &encoded).await
    }

    pub async fn deindex_volume(&self, tenant: &str, summary: &VolumeSummary) -> Result<(), GatewayError> {
        let encoded = serde_json::to_string(summary).map_err(|e| GatewayError::Internal(e.to_string()))?;
        self.store.srem(&Self::volumes_index_key(tenant), &encoded).await
    }

    /// Deletion doesn't carry the granting role `index_volume` stamped at
    /// creation, so it locates the entry by identity rather than
    /// reconstructing and comparing the full encoded summary.
    pub async fn deindex_volume_by_name(
        &self,
        tenant: &str,
        fingerprint: &Fingerprint,
    ) -> Result<(), GatewayError> {
        let key = Self::volumes_index_key(tenant);
        for entry in self.store.smembers(&key).await? {
            let Ok(summary) = serde_json::from_str::<VolumeSummary>(&entry) else {
                continue;
            };
            if summary.family == fingerprint.family
                && summary.system_id == fingerprint.system_id
                && summary.pool == fingerprint.pool
                && summary.name == fingerprint.volume_name
            {
                return self.store.srem(&key, &entry).await;
            }
        }
        Ok(())
    }

    pub async fn list_volumes(&self, tenant: &str) -> Result<Vec<VolumeSummary>, GatewayError> {
        let raw = self.store.smembers(&Self::volumes_index_key(tenant)).await?;
        Ok(raw.iter().filter_map(|s| serde_json::from_str(s).ok()).collect())
    }

    /// Looks a tenant's volume up by name, to recover the `pool`/`capacity_kb`
    /// a delete request doesn't carry so the caller can rebuild the exact
    /// `Fingerprint` the matching create used.
    pub async fn find_volume(&self, tenant: &str, volume_name: &str) -> Result<Option<VolumeSummary>, GatewayError> {
        Ok(self
            .list_volumes(tenant)
            .await?
            .into_iter()
            .find(|v| v.name == volume_name))
    }
}
