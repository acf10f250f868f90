//! The administrative gRPC surface: one `tonic` service per registry,
//! wired to the same `gateway-registry` types the HTTP routes use
//! (`spec.md` §6, "gRPC surface").

use crate::state::AppState;
use gateway_core::model::{RoleInstance, StorageSystemRecord, Tenant};
use gateway_core::ArrayFamily;
use gateway_proto::role_registry_server::{RoleRegistry as RoleRegistryService, RoleRegistryServer};
use gateway_proto::storage_registry_server::{StorageRegistry as StorageRegistryService, StorageRegistryServer};
use gateway_proto::tenant_registry_server::{TenantRegistry as TenantRegistryService, TenantRegistryServer};
use gateway_proto::{
    BindRoleRequest, CancelRevokeTenantRequest, CheckRevokedRequest, CheckRevokedResponse,
    CreateRoleRequest, CreateStorageRequest, CreateTenantRequest, DeleteRoleRequest,
    DeleteStorageRequest, DeleteTenantRequest, Empty, GenerateTokenRequest, GenerateTokenResponse,
    GetRoleRequest, GetStorageRequest, GetTenantRequest, ListRolesRequest, ListRolesResponse,
    ListStorageRequest, ListStorageResponse, ListTenantsRequest, ListTenantsResponse,
    RefreshTokenRequest, RefreshTokenResponse, RevokeTenantRequest, UnbindRoleRequest,
    UpdateTenantRequest,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tonic::{Request, Response, Status};
use tracing::info;

fn to_status(err: gateway_core::GatewayError) -> Status {
    use gateway_core::GatewayError::*;
    match err {
        Unauthorized(m) => Status::unauthenticated(m),
        Forbidden { reason, .. } => Status::permission_denied(reason),
        NotFound(m) => Status::not_found(m),
        Conflict(m) => Status::already_exists(m),
        Upstream { status, body } => Status::unknown(format!("upstream status {status}: {body}")),
        Transport(m) => Status::unavailable(m),
        Internal(m) => Status::internal(m),
    }
}

fn tenant_message(t: Tenant) -> gateway_proto::Tenant {
    gateway_proto::Tenant {
        name: t.name,
        approve_sdc: t.approve_sdc,
        roles: t.roles.into_iter().collect(),
        revoked: t.revoked,
    }
}

fn role_message(r: RoleInstance) -> gateway_proto::RoleInstance {
    gateway_proto::RoleInstance {
        name: r.name,
        family: r.family.as_str().to_owned(),
        array_id: r.array_id,
        pool: r.pool,
        quota_kb: r.quota_kb,
    }
}

fn storage_message(s: StorageSystemRecord) -> gateway_proto::StorageSystemRecord {
    gateway_proto::StorageSystemRecord {
        family: s.family.as_str().to_owned(),
        array_id: s.array_id,
        username: s.username,
        password: s.password,
        endpoint: s.endpoint,
        insecure: s.insecure,
        is_default: s.is_default,
    }
}

fn parse_family(raw: &str) -> Result<ArrayFamily, Status> {
    ArrayFamily::from_alias(raw).ok_or_else(|| Status::invalid_argument(format!("unknown family {raw}")))
}

pub struct TenantService {
    state: Arc<AppState>,
}

#[tonic::async_trait]
impl TenantRegistryService for TenantService {
    async fn create(&self, request: Request<CreateTenantRequest>) -> Result<Response<Empty>, Status> {
        let req = request.into_inner();
        self.state.tenants.create(&req.name, req.approve_sdc).await.map_err(to_status)?;
        Ok(Response::new(Empty {}))
    }

    async fn update(&self, request: Request<UpdateTenantRequest>) -> Result<Response<Empty>, Status> {
        let req = request.into_inner();
        self.state
            .tenants
            .update_approve_sdc(&req.name, req.approve_sdc)
            .await
            .map_err(to_status)?;
        Ok(Response::new(Empty {}))
    }

    async fn get(&self, request: Request<GetTenantRequest>) -> Result<Response<gateway_proto::Tenant>, Status> {
        let req = request.into_inner();
        let tenant = self
            .state
            .tenants
            .get(&req.name)
            .await
            .map_err(to_status)?
            .ok_or_else(|| Status::not_found(format!("tenant {} not found", req.name)))?;
        Ok(Response::new(tenant_message(tenant)))
    }

    async fn delete(&self, request: Request<DeleteTenantRequest>) -> Result<Response<Empty>, Status> {
        let req = request.into_inner();
        self.state.tenants.delete(&req.name).await.map_err(to_status)?;
        Ok(Response::new(Empty {}))
    }

    async fn list(&self, _request: Request<ListTenantsRequest>) -> Result<Response<ListTenantsResponse>, Status> {
        let names = self.state.tenants.list().await.map_err(to_status)?;
        let mut tenants = Vec::with_capacity(names.len());
        for name in names {
            if let Some(t) = self.state.tenants.get(&name).await.map_err(to_status)? {
                tenants.push(tenant_message(t));
            }
        }
        Ok(Response::new(ListTenantsResponse { tenants }))
    }

    async fn bind_role(&self, request: Request<BindRoleRequest>) -> Result<Response<Empty>, Status> {
        let req = request.into_inner();
        self.state.tenants.bind_role(&req.tenant, &req.role).await.map_err(to_status)?;
        Ok(Response::new(Empty {}))
    }

    async fn unbind_role(&self, request: Request<UnbindRoleRequest>) -> Result<Response<Empty>, Status> {
        let req = request.into_inner();
        self.state.tenants.unbind_role(&req.tenant, &req.role).await.map_err(to_status)?;
        Ok(Response::new(Empty {}))
    }

    async fn generate_token(&self, request: Request<GenerateTokenRequest>) -> Result<Response<GenerateTokenResponse>, Status> {
        let req = request.into_inner();
        let envelope = self.state.tenants.generate_token(&req.tenant).await.map_err(to_status)?;
        let secret_yaml = envelope.to_yaml().map_err(to_status)?;
        Ok(Response::new(GenerateTokenResponse { secret_yaml }))
    }

    async fn refresh_token(&self, request: Request<RefreshTokenRequest>) -> Result<Response<RefreshTokenResponse>, Status> {
        let req = request.into_inner();
        let access_token = self
            .state
            .tenants
            .refresh_token(&req.access_token, &req.refresh_token)
            .await
            .map_err(to_status)?;
        Ok(Response::new(RefreshTokenResponse { access_token }))
    }

    async fn revoke_tenant(&self, request: Request<RevokeTenantRequest>) -> Result<Response<Empty>, Status> {
        let req = request.into_inner();
        self.state.tenants.revoke_tenant(&req.name).await.map_err(to_status)?;
        Ok(Response::new(Empty {}))
    }

    async fn cancel_revoke_tenant(&self, request: Request<CancelRevokeTenantRequest>) -> Result<Response<Empty>, Status> {
        let req = request.into_inner();
        self.state.tenants.cancel_revoke_tenant(&req.name).await.map_err(to_status)?;
        Ok(Response::new(Empty {}))
    }

    async fn check_revoked(&self, request: Request<CheckRevokedRequest>) -> Result<Response<CheckRevokedResponse>, Status> {
        let req = request.into_inner();
        let revoked = self.state.tenants.check_revoked(&req.name).await.map_err(to_status)?;
        Ok(Response::new(CheckRevokedResponse { revoked }))
    }
}

/// Roles are a file-watched, hot-reloaded source of truth (`spec.md` §4.7):
/// the gRPC surface can read the live snapshot but mutation belongs to
/// editing the backing file, not this RPC. `Create`/`Delete` report
/// `unimplemented` rather than silently no-op.
pub struct RoleService {
    state: Arc<AppState>,
}

#[tonic::async_trait]
impl RoleRegistryService for RoleService {
    async fn create(&self, _request: Request<CreateRoleRequest>) -> Result<Response<Empty>, Status> {
        Err(Status::unimplemented("roles are managed by editing the roles file, not this RPC"))
    }

    async fn get(&self, request: Request<GetRoleRequest>) -> Result<Response<gateway_proto::RoleInstance>, Status> {
        let req = request.into_inner();
        let family = parse_family(&req.family)?;
        let cap = self
            .state
            .roles
            .cap_for(&req.name, family, &req.array_id, &req.pool)
            .ok_or_else(|| Status::not_found("no such role instance"))?;
        Ok(Response::new(role_message(RoleInstance {
            name: req.name,
            family,
            array_id: req.array_id,
            pool: req.pool,
            quota_kb: cap,
        })))
    }

    async fn delete(&self, _request: Request<DeleteRoleRequest>) -> Result<Response<Empty>, Status> {
        Err(Status::unimplemented("roles are managed by editing the roles file, not this RPC"))
    }

    async fn list(&self, _request: Request<ListRolesRequest>) -> Result<Response<ListRolesResponse>, Status> {
        let roles = self.state.roles.all().into_iter().map(role_message).collect();
        Ok(Response::new(ListRolesResponse { roles }))
    }
}

/// Same rationale as [`RoleService`]: storage systems are file-watched
/// (`spec.md` §4.7).
pub struct StorageService {
    state: Arc<AppState>,
}

#[tonic::async_trait]
impl StorageRegistryService for StorageService {
    async fn create(&self, _request: Request<CreateStorageRequest>) -> Result<Response<Empty>, Status> {
        Err(Status::unimplemented("storage systems are managed by editing the storage file, not this RPC"))
    }

    async fn get(&self, request: Request<GetStorageRequest>) -> Result<Response<gateway_proto::StorageSystemRecord>, Status> {
        let req = request.into_inner();
        let family = parse_family(&req.family)?;
        let record = self
            .state
            .storage
            .get(family, &req.array_id)
            .ok_or_else(|| Status::not_found("no such storage system"))?;
        Ok(Response::new(storage_message(record)))
    }

    async fn delete(&self, _request: Request<DeleteStorageRequest>) -> Result<Response<Empty>, Status> {
        Err(Status::unimplemented("storage systems are managed by editing the storage file, not this RPC"))
    }

    async fn list(&self, _request: Request<ListStorageRequest>) -> Result<Response<ListStorageResponse>, Status> {
        let systems = self.state.storage.all().into_iter().map(storage_message).collect();
        Ok(Response::new(ListStorageResponse { systems }))
    }
}

/// Boots the admin gRPC server on `addr`, serving until the process is
/// signaled to shut down.
pub async fn serve(state: Arc<AppState>, addr: SocketAddr) -> anyhow::Result<()> {
    info!(%addr, "starting admin gRPC server");
    tonic::transport::Server::builder()
        .add_service(TenantRegistryServer::new(TenantService { state: state.clone() }))
        .add_service(RoleRegistryServer::new(RoleService { state: state.clone() }))
        .add_service(StorageRegistryServer::new(StorageService { state }))
        .serve(addr)
        .await
        .map_err(anyhow::Error::from)
}
