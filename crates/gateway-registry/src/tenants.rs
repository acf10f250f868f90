//! `TenantRegistry`: CRUD over tenants, role bindings, revocation, and
//! token issuance/refresh (`spec.md` §4.4).

use gateway_core::model::{Claims, Subject, Tenant};
use gateway_core::GatewayError;
use gateway_kvstore::KVStore;
use gateway_token::{NewPairParams, TokenManager};
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;

const REVOKED_SET: &str = "tenant:revoked";
const ALL_TENANTS_SET: &str = "tenant:all";
const REFRESHED_ACCESS_TTL: Duration = Duration::from_secs(30);

fn data_key(name: &str) -> String {
    format!("tenant:{name}:data")
}

fn roles_key(name: &str) -> String {
    format!("tenant:{name}:roles")
}

fn role_tenants_key(role: &str) -> String {
    format!("role:{role}:tenants")
}

/// The Kubernetes-secret-formatted YAML envelope `GenerateToken` returns
/// (`spec.md` §6). `data.access`/`data.refresh` are base64-encoded.
#[derive(Debug, Serialize)]
pub struct TenantTokenEnvelope {
    #[serde(rename = "apiVersion")]
    pub api_version: String,
    pub kind: String,
    pub metadata: SecretMetadata,
    #[serde(rename = "type")]
    pub type_: String,
    pub data: SecretData,
}

#[derive(Debug, Serialize)]
pub struct SecretMetadata {
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct SecretData {
    pub access: String,
    pub refresh: String,
}

impl TenantTokenEnvelope {
    fn new(access: &str, refresh: &str) -> Self {
        Self {
            api_version: "v1".to_owned(),
            kind: "Secret".to_owned(),
            metadata: SecretMetadata {
                name: "proxy-authz-tokens".to_owned(),
            },
            type_: "Opaque".to_owned(),
            data: SecretData {
                access: base64::encode(access),
                refresh: base64::encode(refresh),
            },
        }
    }

    pub fn to_yaml(&self) -> Result<String, GatewayError> {
        serde_yaml::to_string(self).map_err(|e| GatewayError::Internal(e.to_string()))
    }
}

/// The admin envelope: plain (unwrapped, un-base64'd) JWTs, per `spec.md`
/// §6. Open question in `spec.md` §9 resolved here: since some clients may
/// predate this, `parse_admin_envelope_token` (below) tolerates a
/// base64-encoded value too.
#[derive(Debug, Serialize)]
pub struct AdminTokenEnvelope {
    pub access: String,
    pub refresh: String,
}

impl AdminTokenEnvelope {
    pub fn to_yaml(&self) -> Result<String, GatewayError> {
        serde_yaml::to_string(self).map_err(|e| GatewayError::Internal(e.to_string()))
    }
}

/// Accepts either a raw JWT or a base64-encoded one, so legacy admin
/// clients that base64-decode unconditionally still work.
pub fn tolerant_admin_token(value: &str) -> String {
    match base64::decode(value) {
        Ok(bytes) => String::from_utf8(bytes).unwrap_or_else(|_| value.to_owned()),
        Err(_) => value.to_owned(),
    }
}

pub struct TenantRegistry {
    store: Arc<dyn KVStore>,
    tokens: Arc<TokenManager>,
}

impl TenantRegistry {
    pub fn new(store: Arc<dyn KVStore>, tokens: Arc<TokenManager>) -> Self {
        Self { store, tokens }
    }

    #[instrument(skip(self))]
    pub async fn create(&self, name: &str, approve_sdc: bool) -> Result<(), GatewayError> {
        if self.get(name).await?.is_some() {
            return Err(GatewayError::Conflict(format!("tenant {name} already exists")));
        }
        let tenant = Tenant::new(name, approve_sdc);
        self.store
            .hset(&data_key(name), "created_at", &tenant.created_at.to_rfc3339())
            .await?;
        self.store
            .hset(&data_key(name), "approve_sdc", &approve_sdc.to_string())
            .await?;
        self.store.sadd(ALL_TENANTS_SET, name).await?;
        Ok(())
    }

    pub async fn get(&self, name: &str) -> Result<Option<Tenant>, GatewayError> {
        let hash = self.store.hgetall(&data_key(name)).await?;
        let Some(created_raw) = hash.get("created_at") else {
            return Ok(None);
        };
        let created_at = created_raw
            .parse()
            .map_err(|e| GatewayError::Internal(format!("corrupt tenant timestamp: {e}")))?;
        let approve_sdc = hash
            .get("approve_sdc")
            .map(|v| v == "true")
            .unwrap_or(false);
        let roles: BTreeSet<String> = self.store.smembers(&roles_key(name)).await?.into_iter().collect();
        let revoked = self.store.sismember(REVOKED_SET, name).await?;

        Ok(Some(Tenant {
            name: name.to_owned(),
            created_at,
            approve_sdc,
            roles,
            revoked,
        }))
    }

    /// Flips the approve-SDC flag. This is the only field `Update` may
    /// change (`spec.md` §4.4).
    pub async fn update_approve_sdc(&self, name: &str, approve_sdc: bool) -> Result<(), GatewayError> {
        if self.get(name).await?.is_none() {
            return Err(GatewayError::NotFound(format!("tenant {name} not found")));
        }
        self.store
            .hset(&data_key(name), "approve_sdc", &approve_sdc.to_string())
            .await
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, name: &str) -> Result<(), GatewayError> {
        let Some(tenant) = self.get(name).await? else {
            return Err(GatewayError::NotFound(format!("tenant {name} not found")));
        };
        for role in &tenant.roles {
            self.store.srem(&role_tenants_key(role), name).await?;
        }
        self.store.del(&data_key(name)).await?;
        self.store.del(&roles_key(name)).await?;
        self.store.srem(REVOKED_SET, name).await?;
        self.store.srem(ALL_TENANTS_SET, name).await?;
        Ok(())
    }

    pub async fn list(&self) -> Result<Vec<String>, GatewayError> {
        let mut names = self.store.smembers(ALL_TENANTS_SET).await?;
        names.sort();
        Ok(names)
    }

    pub async fn bind_role(&self, name: &str, role: &str) -> Result<(), GatewayError> {
        if self.get(name).await?.is_none() {
            return Err(GatewayError::NotFound(format!("tenant {name} not found")));
        }
        self.store.sadd(&roles_key(name), role).await?;
        self.store.sadd(&role_tenants_key(role), name).await?;
        Ok(())
    }

    pub async fn unbind_role(&self, name: &str, role: &str) -> Result<(), GatewayError> {
        self.store.srem(&roles_key(name), role).await?;
        self.store.srem(&role_tenants_key(role), name).await?;
        Ok(())
    }

    /// Issues a fresh access/refresh pair and wraps it in the Kubernetes
    /// secret envelope (`spec.md` §4.4, §6).
    pub async fn generate_token(&self, name: &str) -> Result<TenantTokenEnvelope, GatewayError> {
        let tenant = self
            .get(name)
            .await?
            .ok_or_else(|| GatewayError::NotFound(format!("tenant {name} not found")))?;
        let params = NewPairParams {
            subject: Subject::CsmTenant,
            roles: tenant.roles.into_iter().collect(),
            group: tenant.name,
        };
        let pair = self
            .tokens
            .new_pair(&params)
            .await
            .map_err(|e| GatewayError::Internal(e.to_string()))?;
        Ok(TenantTokenEnvelope::new(&pair.access, &pair.refresh))
    }

    /// Requires the access token be expired, the refresh token valid, and
    /// the tenant not revoked; mints a new access token expiring 30 seconds
    /// out (`spec.md` §4.4, §8).
    #[instrument(skip(self, access, refresh))]
    pub async fn refresh_token(&self, access: &str, refresh: &str) -> Result<String, GatewayError> {
        if !self.tokens.is_expired(access).await {
            return Err(GatewayError::Unauthorized(
                "access token was valid; refresh is only for expired access tokens".into(),
            ));
        }

        let claims = self
            .tokens
            .parse_with_claims(refresh)
            .await
            .map_err(|e| GatewayError::Unauthorized(e.to_string()))?;

        if self.check_revoked(&claims.group).await? {
            return Err(GatewayError::Unauthorized(format!(
                "tenant {} is revoked",
                claims.group
            )));
        }

        self.mint_refreshed_access(&claims).await
    }

    /// Same contract as `refresh_token` but without the tenant revocation
    /// check — admins are not tenants and carry no revocation bit
    /// (`spec.md` §4.6, `/proxy/refresh-admin/`).
    pub async fn refresh_admin_token(&self, access: &str, refresh: &str) -> Result<String, GatewayError> {
        if !self.tokens.is_expired(access).await {
            return Err(GatewayError::Unauthorized(
                "access token was valid; refresh is only for expired access tokens".into(),
            ));
        }
        let claims = self
            .tokens
            .parse_with_claims(refresh)
            .await
            .map_err(|e| GatewayError::Unauthorized(e.to_string()))?;
        self.mint_refreshed_access(&claims).await
    }

    async fn mint_refreshed_access(&self, claims: &Claims) -> Result<String, GatewayError> {
        let params = NewPairParams {
            subject: claims.sub,
            roles: claims.role_list(),
            group: claims.group.clone(),
        };
        self.tokens
            .mint(&params, REFRESHED_ACCESS_TTL)
            .await
            .map_err(|e| GatewayError::Internal(e.to_string()))
    }

    pub async fn generate_admin_token(&self, name: &str, roles: Vec<String>) -> Result<AdminTokenEnvelope, GatewayError> {
        let params = NewPairParams {
            subject: Subject::CsmAdmin,
            roles,
            group: name.to_owned(),
        };
        let pair = self
            .tokens
            .new_pair(&params)
            .await
            .map_err(|e| GatewayError::Internal(e.to_string()))?;
        Ok(AdminTokenEnvelope {
            access: pair.access,
            refresh: pair.refresh,
        })
    }

    pub async fn revoke_tenant(&self, name: &str) -> Result<(), GatewayError> {
        self.store.sadd(REVOKED_SET, name).await
    }

    pub async fn cancel_revoke_tenant(&self, name: &str) -> Result<(), GatewayError> {
        self.store.srem(REVOKED_SET, name).await
    }

    pub async fn check_revoked(&self, name: &str) -> Result<bool, GatewayError> {
        self.store.sismember(REVOKED_SET, name).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gateway_kvstore::MemoryStore;

    fn registry() -> TenantRegistry {
        TenantRegistry::new(Arc::new(MemoryStore::new()), Arc::new(TokenManager::new("s3cr3t")))
    }

    #[tokio::test]
    async fn create_refuses_duplicates() {
        let registry = registry();
        registry.create("Alice", false).await.unwrap();
        let err = registry.create("Alice", false).await.unwrap_err();
        assert!(matches!(err, GatewayError::Conflict(_)));
    }

    #[tokio::test]
    async fn bind_role_populates_inverse_index() {
        let registry = registry();
        registry.create("Alice", false).await.unwrap();
        registry.bind_role("Alice", "CA-medium").await.unwrap();

        let tenant = registry.get("Alice").await.unwrap().unwrap();
        assert!(tenant.roles.contains("CA-medium"));
    }

    #[tokio::test]
    async fn delete_removes_all_keys() {
        let registry = registry();
        registry.create("Alice", false).await.unwrap();
        registry.bind_role("Alice", "CA-medium").await.unwrap();
        registry.delete("Alice").await.unwrap();

        assert!(registry.get("Alice").await.unwrap().is_none());
        assert!(!registry.list().await.unwrap().contains(&"Alice".to_owned()));
    }

    // Scenario 5 from spec.md §8: refresh with a still-valid access token.
    #[tokio::test]
    async fn refresh_rejects_still_valid_access_token() {
        let registry = registry();
        registry.create("Alice", false).await.unwrap();
        let envelope = registry.generate_token("Alice").await.unwrap();
        let access = String::from_utf8(base64::decode(&envelope.data.access).unwrap()).unwrap();
        let refresh = String::from_utf8(base64::decode(&envelope.data.refresh).unwrap()).unwrap();

        let err = registry.refresh_token(&access, &refresh).await.unwrap_err();
        assert!(matches!(err, GatewayError::Unauthorized(ref msg) if msg.contains("access token was valid")));
    }

    #[tokio::test]
    async fn refresh_rejects_revoked_tenant() {
        use gateway_token::NewPairParams;
        let store = Arc::new(MemoryStore::new());
        let tokens = Arc::new(
            TokenManager::new("s3cr3t").with_ttls(std::time::Duration::from_secs(0), std::time::Duration::from_secs(3600)),
        );
        let registry = TenantRegistry::new(store, tokens.clone());
        registry.create("Alice", false).await.unwrap();
        registry.revoke_tenant("Alice").await.unwrap();

        let pair = tokens
            .new_pair(&NewPairParams {
                subject: Subject::CsmTenant,
                roles: vec![],
                group: "Alice".into(),
            })
            .await
            .unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(1100)).await;

        let err = registry.refresh_token(&pair.access, &pair.refresh).await.unwrap_err();
        assert!(matches!(err, GatewayError::Unauthorized(_)));
    }
}
