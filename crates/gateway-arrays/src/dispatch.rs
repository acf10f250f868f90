//! `ArrayHandler` (one per family, `spec.md` §4.2) and `DispatchHandler`
//! (`spec.md` §4.5), wired by an explicit tagged variant rather than a
//! trait object (`spec.md` §9, "Dynamic dispatch").

use crate::forwarded::{self, ForwardedTarget};
use crate::pool_cache::PoolNameCache;
use crate::route::{self, InterceptedRoute};
use crate::session::SessionCache;
use gateway_core::model::{PolicyDecision, VolumeSummary};
use gateway_core::{ArrayFamily, Fingerprint, GatewayError};
use gateway_policy::PolicyClient;
use gateway_quota::QuotaLedger;
use gateway_registry::{RoleRegistry, StorageRegistry};
use http::Method;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Everything known about an intercepted request before it's forwarded.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub tenant: String,
    pub roles: Vec<String>,
    pub method: Method,
    pub path: String,
    pub system_id: String,
    pub pool: String,
    pub volume_name: String,
    pub capacity_kb: u64,
    /// The tenant's `approve_sdc` flag, consulted only by `RegisterSdc`
    /// (`spec.md` §4.2, "Scale-out block"): SDC registration is permitted
    /// only when the tenant has been approved for it.
    pub tenant_approve_sdc: bool,
}

/// The decision for one intercepted request: either forward it with the
/// given rewritten auth, or reject it outright.
#[derive(Debug)]
pub enum Decision {
    Forward {
        session_token: String,
        fingerprint: Fingerprint,
        /// The role that granted the cap, present only for create/delete
        /// routes; used to index the tenant's volume list.
        granting_role: Option<String>,
    },
    Reject(GatewayError),
}

/// One family's handler: credentials, session cache, and (for the
/// scale-out block family) the pool-name cache. `spec.md` §4.2's "map
/// <array-id -> session>" lives inside `sessions`.
pub struct ArrayHandler {
    pub family: ArrayFamily,
    storage: Arc<StorageRegistry>,
    roles: Arc<RoleRegistry>,
    policy: Arc<PolicyClient>,
    quota: Arc<QuotaLedger>,
    sessions: SessionCache,
    pool_names: PoolNameCache,
}

impl ArrayHandler {
    pub fn new(
        family: ArrayFamily,
        storage: Arc<StorageRegistry>,
        roles: Arc<RoleRegistry>,
        policy: Arc<PolicyClient>,
        quota: Arc<QuotaLedger>,
    ) -> Self {
        Self {
            family,
            storage,
            roles,
            policy,
            quota,
            sessions: SessionCache::default(),
            pool_names: PoolNameCache::default(),
        }
    }

    fn policy_path(&self, route: InterceptedRoute) -> String {
        let verb = match route.publishes_creation() {
            Some(true) => "create",
            Some(false) => "delete",
            None => "query",
        };
        format!("karavi/volumes/{}/{}", self.family.as_str(), verb)
    }

    /// Steps 2-5 of the common pipeline: credential lookup, policy
    /// evaluation, and quota approval/ownership-validation. A delete route
    /// only checks ownership here; the capacity is not released until
    /// `publish` sees the array actually acknowledge the delete, so a
    /// rejected delete leaves the reservation untouched.
    /// Steps 6-7 (rewrite + forward + publish/rollback) are driven by the
    /// caller once it has the decision, since the actual byte-level proxy
    /// call lives at the ingress edge, not in this crate.
    #[instrument(skip(self, ctx), fields(family = %self.family, tenant = %ctx.tenant))]
    pub async fn evaluate(&self, array_id: &str, ctx: &RequestContext, route: InterceptedRoute) -> Decision {
        let Some(record) = self.storage.get(self.family, array_id) else {
            return Decision::Reject(GatewayError::Transport(format!("no storage record for array {array_id}")));
        };

        if route == InterceptedRoute::RegisterSdc && !ctx.tenant_approve_sdc {
            return Decision::Reject(GatewayError::forbidden("tenant is not approved for SDC registration"));
        }

        let token = match self.session_token(array_id, &record).await {
            Ok(t) => t,
            Err(e) => return Decision::Reject(e),
        };

        let pool = match self.resolve_pool_name(&record, &token, &ctx.pool).await {
            Ok(p) => p,
            Err(e) => return Decision::Reject(e),
        };

        let input = serde_json::json!({
            "tenant": ctx.tenant,
            "roles": ctx.roles,
            "system-id": ctx.system_id,
            "pool": pool,
            "capacity": ctx.capacity_kb,
            "name": ctx.volume_name,
        });

        let decision: PolicyDecision = match self.policy.evaluate(&self.policy_path(route), input).await {
            Ok(d) => d,
            Err(e) => return Decision::Reject(e),
        };

        if !decision.allow {
            return Decision::Reject(GatewayError::forbidden(decision.deny_reasons.join("; ")));
        }

        let fingerprint = Fingerprint::new(
            self.family,
            &ctx.system_id,
            &pool,
            &ctx.tenant,
            &ctx.volume_name,
            ctx.capacity_kb,
        );

        let mut granting_role = None;

        match route.publishes_creation() {
            Some(true) => {
                let roles = if decision.permitted_roles.is_empty() {
                    ctx.roles.clone()
                } else {
                    decision.permitted_roles.clone()
                };
                let Some((role_name, cap)) = self.roles.best_role_for_any(&roles, self.family, &ctx.system_id, &pool) else {
                    return Decision::Reject(GatewayError::forbidden("no role grants this scope"));
                };
                match self.quota.approve_request(&fingerprint, cap).await {
                    Ok(result) if result.approved => granting_role = Some(role_name),
                    Ok(result) => return Decision::Reject(GatewayError::quota_denied(cap, result.current)),
                    Err(e) => return Decision::Reject(e),
                }
            }
            Some(false) => match self.quota.validate_ownership(&fingerprint).await {
                Ok(ownership) if ownership.owned => {}
                Ok(_) => return Decision::Reject(GatewayError::forbidden("volume not owned by tenant")),
                Err(e) => return Decision::Reject(e),
            },
            None => {}
        }

        Decision::Forward {
            session_token: token,
            fingerprint,
            granting_role,
        }
    }

    /// Resolves a PowerFlex pool id to the human pool name quota lookups
    /// key on, consulting the bounded LRU cache before calling the array
    /// (`spec.md` §4.2 "Scale-out block", §5 "LRU pool-name cache"). A
    /// no-op passthrough for every other family, whose wire format already
    /// carries the pool name directly.
    async fn resolve_pool_name(&self, record: &gateway_core::model::StorageSystemRecord, token: &str, pool_id: &str) -> Result<String, GatewayError> {
        if self.family != ArrayFamily::PowerFlex {
            return Ok(pool_id.to_owned());
        }
        if let Some(name) = self.pool_names.get(pool_id) {
            return Ok(name);
        }

        let client = reqwest::Client::new();
        let url = format!("{}/api/types/StoragePool/instances", record.endpoint);
        let response = client
            .get(&url)
            .header("authorization", format!("Bearer {token}"))
            .send()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;
        if !response.status().is_success() {
            return Err(GatewayError::Transport(format!("pool lookup {url} returned status {}", response.status())));
        }
        let pools: Vec<serde_json::Value> = response
            .json()
            .await
            .map_err(|e| GatewayError::Transport(format!("malformed pool list: {e}")))?;
        let name = pools
            .iter()
            .find(|p| p.get("id").and_then(|v| v.as_str()) == Some(pool_id))
            .and_then(|p| p.get("name").and_then(|v| v.as_str()))
            .ok_or_else(|| GatewayError::NotFound(format!("no storage pool with id {pool_id}")))?
            .to_owned();

        self.pool_names.insert(pool_id.to_owned(), name.clone());
        Ok(name)
    }

    /// The session token for a plain reverse-proxy request that isn't on the
    /// intercepted-route table at all — no policy or quota consulted, per
    /// `spec.md` §4.2 step 3, "non-intercepted routes fall through to a
    /// plain reverse proxy".
    pub async fn passthrough_token(&self, array_id: &str) -> Result<String, GatewayError> {
        let Some(record) = self.storage.get(self.family, array_id) else {
            return Err(GatewayError::Transport(format!("no storage record for array {array_id}")));
        };
        self.session_token(array_id, &record).await
    }

    /// Builds the `RequestContext` for a delete/unmap/snapshot-delete route
    /// by recovering the `pool`/`capacity_kb` the original create recorded,
    /// since delete requests don't carry them (`spec.md` §4, `VolumesQuery`'s
    /// index doubles as this lookup). A volume the tenant never created, or
    /// that belongs to another tenant, is reported the same way as a denied
    /// ownership check.
    pub async fn context_for_delete(
        &self,
        tenant: &str,
        roles: Vec<String>,
        method: Method,
        path: String,
        system_id: String,
        volume_name: String,
    ) -> Result<RequestContext, GatewayError> {
        let summary = self
            .quota
            .find_volume(tenant, &volume_name)
            .await?
            .ok_or_else(|| GatewayError::forbidden("volume not owned by tenant"))?;
        Ok(RequestContext {
            tenant: tenant.to_owned(),
            roles,
            method,
            path,
            system_id,
            pool: summary.pool,
            volume_name,
            capacity_kb: summary.capacity_kb,
            tenant_approve_sdc: false,
        })
    }

    async fn session_token(&self, array_id: &str, record: &gateway_core::model::StorageSystemRecord) -> Result<String, GatewayError> {
        self.sessions
            .ensure_token(array_id, || self.login(record.username.clone(), record.password.clone(), record.endpoint.clone()))
            .await
    }

    /// Publishes the outcome of a forwarded request once the array has
    /// responded (`spec.md` §4.2 step 7), maintaining the per-tenant
    /// volume index `VolumesQuery` reads from.
    ///
    /// Create and delete routes mutate the ledger in opposite directions on
    /// a non-2xx response: a rejected create gives back the capacity
    /// `evaluate` already reserved, while a rejected delete must leave the
    /// reservation alone, since `evaluate` never touched it in the first
    /// place (`spec.md` §7, "the ledger reservation is rolled back" only
    /// applies to the side that actually reserved something).
    pub async fn publish(
        &self,
        route: InterceptedRoute,
        fingerprint: &Fingerprint,
        granting_role: Option<&str>,
        array_status: u16,
    ) -> Result<(), GatewayError> {
        match route.publishes_creation() {
            Some(true) => {
                if array_status >= 400 {
                    warn!(status = array_status, "array rejected create, rolling back reservation");
                    return self.quota.rollback_reservation(fingerprint).await;
                }
                self.quota.publish_created(fingerprint).await?;
                let summary = VolumeSummary {
                    name: fingerprint.volume_name.clone(),
                    family: fingerprint.family,
                    system_id: fingerprint.system_id.clone(),
                    pool: fingerprint.pool.clone(),
                    role: granting_role.unwrap_or_default().to_owned(),
                    capacity_kb: fingerprint.capacity_kb,
                };
                self.quota.index_volume(&fingerprint.tenant, &summary).await
            }
            Some(false) => {
                if array_status >= 400 {
                    warn!(status = array_status, "array rejected delete, leaving reservation intact");
                    return Ok(());
                }
                let result = self.quota.delete_request(fingerprint).await?;
                if !result.approved {
                    warn!("array acknowledged delete but the reservation was already gone");
                }
                self.quota.deindex_volume_by_name(&fingerprint.tenant, fingerprint).await
            }
            None => Ok(()),
        }
    }

    /// Forces a fresh session on 401 and retries the caller's closure once
    /// (`spec.md` §4.2, "Session refresh").
    pub async fn refresh_on_unauthorized(&self, array_id: &str) -> Result<String, GatewayError> {
        let Some(record) = self.storage.get(self.family, array_id) else {
            return Err(GatewayError::Transport(format!("no storage record for array {array_id}")));
        };
        self.sessions
            .refresh(array_id, || self.login(record.username.clone(), record.password.clone(), record.endpoint.clone()))
            .await
    }

    async fn login(&self, username: String, password: String, endpoint: String) -> Result<String, GatewayError> {
        match self.family {
            ArrayFamily::PowerScale => Ok(format!("basic:{username}:{password}")),
            _ => {
                let client = reqwest::Client::new();
                let login_url = match self.family {
                    ArrayFamily::PowerFlex => format!("{endpoint}/api/login"),
                    ArrayFamily::PowerMax => format!("{endpoint}/univmax/restapi/system/version"),
                    ArrayFamily::PowerScale => unreachable!(),
                };
                let response = client
                    .get(&login_url)
                    .basic_auth(&username, Some(&password))
                    .send()
                    .await
                    .map_err(|e| GatewayError::Transport(e.to_string()))?;
                if !response.status().is_success() {
                    return Err(GatewayError::Transport(format!(
                        "login to {login_url} returned status {}",
                        response.status()
                    )));
                }
                response
                    .text()
                    .await
                    .map_err(|e| GatewayError::Transport(format!("malformed login response: {e}")))
            }
        }
    }
}

/// Stateless router from forwarded-header family to the configured
/// handler. Returns a family-shaped 502 when the family is missing or
/// unconfigured (`spec.md` §4.5).
pub struct DispatchHandler {
    powerflex: Arc<ArrayHandler>,
    powermax: Arc<ArrayHandler>,
    powerscale: Arc<ArrayHandler>,
}

impl DispatchHandler {
    pub fn new(powerflex: Arc<ArrayHandler>, powermax: Arc<ArrayHandler>, powerscale: Arc<ArrayHandler>) -> Self {
        Self {
            powerflex,
            powermax,
            powerscale,
        }
    }

    pub fn handler_for(&self, family: ArrayFamily) -> Arc<ArrayHandler> {
        match family {
            ArrayFamily::PowerFlex => self.powerflex.clone(),
            ArrayFamily::PowerMax => self.powermax.clone(),
            ArrayFamily::PowerScale => self.powerscale.clone(),
        }
    }

    /// Parses the `Forwarded` header and resolves it to a handler and
    /// route classification. Logs and returns `Unauthorized` if the
    /// header is malformed, and `Transport` (mapped to 502 by callers) if
    /// the alias doesn't resolve to any configured family.
    pub fn resolve(&self, forwarded_header: &str, method: &Method, path: &str) -> Result<(Arc<ArrayHandler>, ForwardedTarget, Option<InterceptedRoute>), GatewayError> {
        let target = forwarded::parse(forwarded_header)
            .ok_or_else(|| GatewayError::Unauthorized("malformed Forwarded header".into()))?;
        let Some(family) = target.family else {
            return Err(GatewayError::Transport(format!("no family configured for forwarded target {}", target.array_id)));
        };
        let route = route::classify(family, method, path);
        info!(family = %family, array_id = %target.array_id, ?route, "dispatching");
        Ok((self.handler_for(family), target, route))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gateway_core::model::{RoleInstance, StorageSystemRecord};
    use gateway_kvstore::MemoryStore;

    fn storage() -> Arc<StorageRegistry> {
        Arc::new(StorageRegistry::from_records(vec![StorageSystemRecord {
            family: ArrayFamily::PowerFlex,
            array_id: "542a2d5f5122210f".into(),
            username: "admin".into(),
            password: "secret".into(),
            endpoint: "https://10.0.0.1".into(),
            insecure: true,
            is_default: true,
        }]))
    }

    fn roles() -> Arc<RoleRegistry> {
        Arc::new(RoleRegistry::from_instances(vec![RoleInstance {
            name: "CA-medium".into(),
            family: ArrayFamily::PowerFlex,
            array_id: "542a2d5f5122210f".into(),
            pool: "bronze".into(),
            quota_kb: 9 * 1024 * 1024,
        }]))
    }

    fn ctx(volume: &str, capacity_kb: u64) -> RequestContext {
        RequestContext {
            tenant: "Alice".into(),
            roles: vec!["CA-medium".into()],
            method: Method::POST,
            path: "/api/types/Volume/instances/".into(),
            system_id: "542a2d5f5122210f".into(),
            pool: "bronze".into(),
            volume_name: volume.into(),
            capacity_kb,
            tenant_approve_sdc: false,
        }
    }

    // The `bronze` pool resolves to itself, so fixtures can key role/fingerprint
    // lookups off the same literal whether or not a test exercises the cache miss.
    async fn mock_pool_lookup(server: &mut mockito::ServerGuard) -> mockito::Mock {
        server
            .mock("GET", "/api/types/StoragePool/instances")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"[{"id": "bronze", "name": "bronze"}]"#)
            .create_async()
            .await
    }

    // Scenario 1 from spec.md §8, exercised through the full dispatch pipeline.
    #[tokio::test]
    async fn first_volume_within_cap_is_approved_and_forwarded() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("POST", "/v1/data/karavi/volumes/powerflex/create")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"result": {"allow": true, "permitted_roles": ["CA-medium"]}}"#)
            .create_async()
            .await;
        let _login = server.mock("GET", "/api/login").with_status(200).with_body("tok-123").create_async().await;
        let _pools = mock_pool_lookup(&mut server).await;

        let policy = Arc::new(PolicyClient::new(server.url(), std::time::Duration::from_secs(2)).unwrap());
        let quota = Arc::new(QuotaLedger::new(Arc::new(MemoryStore::new())));
        let mut storage_records = storage().all();
        storage_records[0].endpoint = server.url();
        let storage = Arc::new(StorageRegistry::from_records(storage_records));

        let handler = ArrayHandler::new(ArrayFamily::PowerFlex, storage, roles(), policy, quota);
        let decision = handler
            .evaluate("542a2d5f5122210f", &ctx("v1", 1024 * 1024), InterceptedRoute::CreateVolume)
            .await;

        match decision {
            Decision::Forward { fingerprint, .. } => {
                assert_eq!(fingerprint.volume_name, "v1");
            }
            Decision::Reject(e) => panic!("expected forward, got {e}"),
        }
    }

    // Scenario 2: a second request that would exceed the cap is denied with
    // cap/current in the error.
    #[tokio::test]
    async fn second_volume_over_cap_is_rejected() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("POST", "/v1/data/karavi/volumes/powerflex/create")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"result": {"allow": true, "permitted_roles": ["CA-medium"]}}"#)
            .create_async()
            .await;
        let _login = server.mock("GET", "/api/login").with_status(200).with_body("tok-123").create_async().await;
        let _pools = mock_pool_lookup(&mut server).await;

        let policy = Arc::new(PolicyClient::new(server.url(), std::time::Duration::from_secs(2)).unwrap());
        let quota = Arc::new(QuotaLedger::new(Arc::new(MemoryStore::new())));
        let fp = Fingerprint::new(ArrayFamily::PowerFlex, "542a2d5f5122210f", "bronze", "Alice", "v1", 1024 * 1024);
        quota.approve_request(&fp, 9 * 1024 * 1024).await.unwrap();

        let mut storage_records = storage().all();
        storage_records[0].endpoint = server.url();
        let storage = Arc::new(StorageRegistry::from_records(storage_records));

        let handler = ArrayHandler::new(ArrayFamily::PowerFlex, storage, roles(), policy, quota);
        let decision = handler
            .evaluate("542a2d5f5122210f", &ctx("v2", 9 * 1024 * 1024), InterceptedRoute::CreateVolume)
            .await;

        match decision {
            Decision::Reject(GatewayError::Forbidden { cap, current, .. }) => {
                assert_eq!(cap, Some(9 * 1024 * 1024));
                assert_eq!(current, Some(1024 * 1024));
            }
            other => panic!("expected quota-denied rejection, got {other:?}"),
        }
    }

    // Regression: a delete the array rejects must not release the
    // tenant's capacity or mark the volume gone (`spec.md` §7).
    #[tokio::test]
    async fn rejected_delete_leaves_reservation_intact() {
        let policy = Arc::new(PolicyClient::new("http://127.0.0.1:1", std::time::Duration::from_millis(50)).unwrap());
        let quota = Arc::new(QuotaLedger::new(Arc::new(MemoryStore::new())));
        let fp = Fingerprint::new(ArrayFamily::PowerFlex, "542a2d5f5122210f", "bronze", "Alice", "v1", 1024 * 1024);
        quota.approve_request(&fp, 9 * 1024 * 1024).await.unwrap();
        quota.publish_created(&fp).await.unwrap();

        let handler = ArrayHandler::new(ArrayFamily::PowerFlex, storage(), roles(), policy, quota.clone());

        // The array 4xxs the delete: publish() must leave the reservation alone.
        handler
            .publish(InterceptedRoute::DeleteVolume, &fp, None, 409)
            .await
            .unwrap();
        let ownership = quota.validate_ownership(&fp).await.unwrap();
        assert!(ownership.owned, "capacity must still be reserved after a rejected delete");
        assert_eq!(ownership.approved, 1024 * 1024);

        // A subsequent successful delete then actually releases it.
        handler
            .publish(InterceptedRoute::DeleteVolume, &fp, None, 200)
            .await
            .unwrap();
        let ownership = quota.validate_ownership(&fp).await.unwrap();
        assert!(!ownership.owned);
    }

    // spec.md §4.2 "Scale-out block": SDC registration is permitted only
    // when the tenant's approve-SDC flag is true.
    #[tokio::test]
    async fn register_sdc_is_rejected_without_tenant_approval() {
        let policy = Arc::new(PolicyClient::new("http://127.0.0.1:1", std::time::Duration::from_millis(50)).unwrap());
        let quota = Arc::new(QuotaLedger::new(Arc::new(MemoryStore::new())));
        let handler = ArrayHandler::new(ArrayFamily::PowerFlex, storage(), roles(), policy, quota);

        let mut sdc_ctx = ctx("unused", 0);
        sdc_ctx.tenant_approve_sdc = false;
        let decision = handler.evaluate("542a2d5f5122210f", &sdc_ctx, InterceptedRoute::RegisterSdc).await;

        match decision {
            Decision::Reject(GatewayError::Forbidden { reason, .. }) => {
                assert!(reason.contains("not approved"));
            }
            other => panic!("expected approve-sdc rejection, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn register_sdc_reaches_policy_when_tenant_is_approved() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("POST", "/v1/data/karavi/volumes/powerflex/query")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"result": {"allow": true}}"#)
            .create_async()
            .await;
        let _login = server.mock("GET", "/api/login").with_status(200).with_body("tok-123").create_async().await;
        let _pools = mock_pool_lookup(&mut server).await;

        let policy = Arc::new(PolicyClient::new(server.url(), std::time::Duration::from_secs(2)).unwrap());
        let quota = Arc::new(QuotaLedger::new(Arc::new(MemoryStore::new())));
        let mut storage_records = storage().all();
        storage_records[0].endpoint = server.url();
        let storage = Arc::new(StorageRegistry::from_records(storage_records));

        let handler = ArrayHandler::new(ArrayFamily::PowerFlex, storage, roles(), policy, quota);

        let mut sdc_ctx = ctx("unused", 0);
        sdc_ctx.tenant_approve_sdc = true;
        let decision = handler.evaluate("542a2d5f5122210f", &sdc_ctx, InterceptedRoute::RegisterSdc).await;

        match decision {
            Decision::Reject(e) => panic!("expected the request to reach the array, got {e}"),
            Decision::Forward { .. } => {}
        }
    }

    #[test]
    fn dispatch_resolves_scenario_6_forwarded_header() {
        let handlers = DispatchHandler::new(
            Arc::new(ArrayHandler::new(
                ArrayFamily::PowerFlex,
                storage(),
                roles(),
                Arc::new(PolicyClient::new("http://127.0.0.1:1", std::time::Duration::from_millis(50)).unwrap()),
                Arc::new(QuotaLedger::new(Arc::new(MemoryStore::new()))),
            )),
            Arc::new(ArrayHandler::new(
                ArrayFamily::PowerMax,
                storage(),
                roles(),
                Arc::new(PolicyClient::new("http://127.0.0.1:1", std::time::Duration::from_millis(50)).unwrap()),
                Arc::new(QuotaLedger::new(Arc::new(MemoryStore::new()))),
            )),
            Arc::new(ArrayHandler::new(
                ArrayFamily::PowerScale,
                storage(),
                roles(),
                Arc::new(PolicyClient::new("http://127.0.0.1:1", std::time::Duration::from_millis(50)).unwrap()),
                Arc::new(QuotaLedger::new(Arc::new(MemoryStore::new()))),
            )),
        );

        let (handler, target, _route) = handlers
            .resolve(
                "for=csm-authorization;https://10.0.0.1;12345, by=csm-authorization;csi-vxflexos",
                &Method::POST,
                "/api/types/Volume/instances/",
            )
            .unwrap();
        assert_eq!(handler.family, ArrayFamily::PowerFlex);
        assert_eq!(target.array_id, "12345");
    }
}
