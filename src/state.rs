//! Shared handles every filter closes over (`spec.md` §2).

use gateway_arrays::DispatchHandler;
use gateway_quota::QuotaLedger;
use gateway_registry::{RoleRegistry, StorageRegistry, TenantRegistry};
use gateway_token::TokenManager;
use std::sync::Arc;
use std::time::Duration;

pub struct AppState {
    pub tokens: Arc<TokenManager>,
    pub tenants: Arc<TenantRegistry>,
    pub roles: Arc<RoleRegistry>,
    pub storage: Arc<StorageRegistry>,
    pub quota: Arc<QuotaLedger>,
    pub dispatch: Arc<DispatchHandler>,
    pub http: reqwest::Client,
}

impl AppState {
    pub fn new(
        tokens: Arc<TokenManager>,
        tenants: Arc<TenantRegistry>,
        roles: Arc<RoleRegistry>,
        storage: Arc<StorageRegistry>,
        quota: Arc<QuotaLedger>,
        dispatch: Arc<DispatchHandler>,
        call_deadline: Duration,
    ) -> anyhow::Result<Arc<Self>> {
        let http = reqwest::Client::builder().timeout(call_deadline).build()?;
        Ok(Arc::new(Self {
            tokens,
            tenants,
            roles,
            storage,
            quota,
            dispatch,
            http,
        }))
    }
}
