//! Composes the HTTPS ingress surface: the two auth-exempt refresh paths,
//! the authenticated query/admin endpoints, and the catch-all reverse
//! proxy keyed off the `Forwarded` header (`spec.md` §4.2, §4.4, §4.6).

use crate::auth::{require_admin, require_tenant, with_claims};
use crate::reject::{self, reject};
use crate::state::AppState;
use crate::volumes;
use gateway_arrays::extract;
use gateway_core::model::Claims;
use gateway_core::GatewayError;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::path::PathBuf;
use std::sync::Arc;
use warp::http::{HeaderMap, Method, Response, StatusCode};
use warp::{Filter, Rejection, Reply};

fn with_state(state: Arc<AppState>) -> impl Filter<Extract = (Arc<AppState>,), Error = Infallible> + Clone {
    warp::any().map(move || state.clone())
}

#[derive(Debug, Deserialize)]
struct RefreshBody {
    access: String,
    refresh: String,
}

#[derive(Debug, Serialize)]
struct RefreshResponse {
    access: String,
}

async fn refresh_token(body: RefreshBody, state: Arc<AppState>) -> Result<impl Reply, Rejection> {
    let access = state
        .tenants
        .refresh_token(&body.access, &body.refresh)
        .await
        .map_err(|e| reject(e, None))?;
    Ok(warp::reply::json(&RefreshResponse { access }))
}

async fn refresh_admin(body: RefreshBody, state: Arc<AppState>) -> Result<impl Reply, Rejection> {
    let access = state
        .tenants
        .refresh_admin_token(&body.access, &body.refresh)
        .await
        .map_err(|e| reject(e, None))?;
    Ok(warp::reply::json(&RefreshResponse { access }))
}

#[derive(Debug, Deserialize)]
struct CreateTenantBody {
    name: String,
    #[serde(rename = "approveSdc", default)]
    approve_sdc: bool,
}

#[derive(Debug, Deserialize)]
struct UpdateTenantBody {
    #[serde(rename = "approveSdc")]
    approve_sdc: bool,
}

#[derive(Debug, Deserialize)]
struct RoleBindingBody {
    role: String,
}

async fn create_tenant(body: CreateTenantBody, state: Arc<AppState>, _admin: Claims) -> Result<impl Reply, Rejection> {
    state.tenants.create(&body.name, body.approve_sdc).await.map_err(|e| reject(e, None))?;
    Ok(warp::reply::with_status("created", StatusCode::CREATED))
}

async fn update_tenant(name: String, body: UpdateTenantBody, state: Arc<AppState>, _admin: Claims) -> Result<impl Reply, Rejection> {
    state.tenants.update_approve_sdc(&name, body.approve_sdc).await.map_err(|e| reject(e, None))?;
    Ok(warp::reply::with_status("updated", StatusCode::OK))
}

async fn get_tenant(name: String, state: Arc<AppState>, _admin: Claims) -> Result<impl Reply, Rejection> {
    let tenant = state
        .tenants
        .get(&name)
        .await
        .map_err(|e| reject(e, None))?
        .ok_or_else(|| reject(GatewayError::NotFound(format!("tenant {name} not found")), None))?;
    Ok(warp::reply::json(&tenant))
}

async fn delete_tenant(name: String, state: Arc<AppState>, _admin: Claims) -> Result<impl Reply, Rejection> {
    state.tenants.delete(&name).await.map_err(|e| reject(e, None))?;
    Ok(warp::reply::with_status("deleted", StatusCode::OK))
}

async fn list_tenants(state: Arc<AppState>, _admin: Claims) -> Result<impl Reply, Rejection> {
    let names = state.tenants.list().await.map_err(|e| reject(e, None))?;
    Ok(warp::reply::json(&names))
}

async fn bind_role(name: String, body: RoleBindingBody, state: Arc<AppState>, _admin: Claims) -> Result<impl Reply, Rejection> {
    state.tenants.bind_role(&name, &body.role).await.map_err(|e| reject(e, None))?;
    Ok(warp::reply::with_status("bound", StatusCode::OK))
}

async fn unbind_role(name: String, body: RoleBindingBody, state: Arc<AppState>, _admin: Claims) -> Result<impl Reply, Rejection> {
    state.tenants.unbind_role(&name, &body.role).await.map_err(|e| reject(e, None))?;
    Ok(warp::reply::with_status("unbound", StatusCode::OK))
}

async fn generate_token(name: String, state: Arc<AppState>, _admin: Claims) -> Result<impl Reply, Rejection> {
    let envelope = state.tenants.generate_token(&name).await.map_err(|e| reject(e, None))?;
    let yaml = envelope.to_yaml().map_err(|e| reject(e, None))?;
    Ok(warp::reply::with_header(yaml, "content-type", "application/yaml"))
}

async fn revoke_tenant(name: String, state: Arc<AppState>, _admin: Claims) -> Result<impl Reply, Rejection> {
    state.tenants.revoke_tenant(&name).await.map_err(|e| reject(e, None))?;
    Ok(warp::reply::with_status("revoked", StatusCode::OK))
}

async fn cancel_revoke_tenant(name: String, state: Arc<AppState>, _admin: Claims) -> Result<impl Reply, Rejection> {
    state.tenants.cancel_revoke_tenant(&name).await.map_err(|e| reject(e, None))?;
    Ok(warp::reply::with_status("un-revoked", StatusCode::OK))
}

async fn list_storage(state: Arc<AppState>, _admin: Claims) -> Result<impl Reply, Rejection> {
    Ok(warp::reply::json(&state.storage.all()))
}

async fn get_storage(family: String, array_id: String, state: Arc<AppState>, _admin: Claims) -> Result<impl Reply, Rejection> {
    let family = gateway_core::ArrayFamily::from_alias(&family)
        .ok_or_else(|| reject(GatewayError::NotFound(format!("unknown family {family}")), None))?;
    let record = state
        .storage
        .get(family, &array_id)
        .ok_or_else(|| reject(GatewayError::NotFound(format!("no storage system {array_id}")), None))?;
    Ok(warp::reply::json(&record))
}

/// The catch-all CSI reverse proxy: parses the `Forwarded` header,
/// classifies the route, runs the common policy/quota pipeline for
/// intercepted routes, and forwards every request (intercepted or not) to
/// the array with rewritten auth (`spec.md` §4.2, §4.5).
#[allow(clippy::too_many_arguments)]
async fn proxy(
    method: Method,
    path: warp::path::FullPath,
    query: Option<String>,
    headers: HeaderMap,
    body: bytes::Bytes,
    claims: Claims,
    state: Arc<AppState>,
) -> Result<impl Reply, Rejection> {
    let forwarded = headers
        .get("forwarded")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| reject(GatewayError::Unauthorized("missing Forwarded header".into()), None))?;

    let (handler, target, route) = state
        .dispatch
        .resolve(forwarded, &method, path.as_str())
        .map_err(|e| reject(e, None))?;

    let (token, fingerprint_and_role) = match route {
        Some(route) => {
            let ctx = match route.publishes_creation() {
                Some(true) => {
                    let fields = extract::create_fields(&body).map_err(|e| reject(e, Some(handler.family)))?;
                    gateway_arrays::RequestContext {
                        tenant: claims.group.clone(),
                        roles: claims.role_list(),
                        method: method.clone(),
                        path: path.as_str().to_owned(),
                        system_id: target.array_id.clone(),
                        pool: fields.pool,
                        volume_name: fields.volume_name,
                        capacity_kb: fields.capacity_kb,
                        tenant_approve_sdc: false,
                    }
                }
                Some(false) => {
                    let volume_name = extract::delete_volume_name(&body).map_err(|e| reject(e, Some(handler.family)))?;
                    handler
                        .context_for_delete(&claims.group, claims.role_list(), method.clone(), path.as_str().to_owned(), target.array_id.clone(), volume_name)
                        .await
                        .map_err(|e| reject(e, Some(handler.family)))?
                }
                None => {
                    let tenant_approve_sdc = if route == gateway_arrays::InterceptedRoute::RegisterSdc {
                        state.tenants.get(&claims.group).await.ok().flatten().map(|t| t.approve_sdc).unwrap_or(false)
                    } else {
                        false
                    };
                    gateway_arrays::RequestContext {
                        tenant: claims.group.clone(),
                        roles: claims.role_list(),
                        method: method.clone(),
                        path: path.as_str().to_owned(),
                        system_id: target.array_id.clone(),
                        pool: String::new(),
                        volume_name: String::new(),
                        capacity_kb: 0,
                        tenant_approve_sdc,
                    }
                }
            };

            match handler.evaluate(&target.array_id, &ctx, route).await {
                gateway_arrays::Decision::Forward {
                    session_token,
                    fingerprint,
                    granting_role,
                } => (session_token, Some((fingerprint, granting_role, route))),
                gateway_arrays::Decision::Reject(e) => return Err(reject(e, Some(handler.family))),
            }
        }
        None => {
            let token = handler.passthrough_token(&target.array_id).await.map_err(|e| reject(e, Some(handler.family)))?;
            (token, None)
        }
    };

    let response = forward(&state.http, &target.endpoint, &method, path.as_str(), query.as_deref(), &headers, body, &token, handler.family)
        .await
        .map_err(|e| reject(e, Some(handler.family)))?;

    if let Some((fingerprint, granting_role, route)) = fingerprint_and_role {
        if let Err(e) = handler.publish(route, &fingerprint, granting_role.as_deref(), response.status().as_u16()).await {
            tracing::error!(error = %e, "failed to publish quota ledger outcome");
        }
    }

    Ok(response)
}

const HOP_BY_HOP: &[&str] = &["connection", "keep-alive", "transfer-encoding", "te", "trailer", "upgrade", "host", "authorization", "forwarded"];

/// Rewrites auth for the outbound call: `powerscale`'s session "token" is
/// the literal `basic:{user}:{pass}` `login()` returns, which needs
/// converting into a real Basic header; the other families hand back an
/// actual session token used as a Bearer token.
fn outbound_auth_header(token: &str) -> String {
    match token.strip_prefix("basic:") {
        Some(rest) => format!("Basic {}", base64::encode(rest)),
        None => format!("Bearer {token}"),
    }
}

async fn forward(
    client: &reqwest::Client,
    endpoint: &str,
    method: &Method,
    path: &str,
    query: Option<&str>,
    headers: &HeaderMap,
    body: bytes::Bytes,
    token: &str,
    family: gateway_core::ArrayFamily,
) -> Result<Response<Vec<u8>>, GatewayError> {
    let mut url = format!("{endpoint}{path}");
    if let Some(q) = query {
        url.push('?');
        url.push_str(q);
    }

    let reqwest_method = reqwest::Method::from_bytes(method.as_str().as_bytes())
        .map_err(|e| GatewayError::Internal(e.to_string()))?;
    let mut builder = client.request(reqwest_method, &url).header("authorization", outbound_auth_header(token));

    for (name, value) in headers.iter() {
        if HOP_BY_HOP.contains(&name.as_str().to_lowercase().as_str()) {
            continue;
        }
        builder = builder.header(name.as_str(), value.as_bytes());
    }

    let upstream = builder
        .body(body.to_vec())
        .send()
        .await
        .map_err(|e| GatewayError::Transport(e.to_string()))?;

    let status = upstream.status();
    let response_headers = upstream.headers().clone();
    let response_body = upstream.bytes().await.map_err(|e| GatewayError::Transport(e.to_string()))?;

    let _ = family; // carried for future family-specific response translation
    let mut response = Response::builder().status(status.as_u16());
    for (name, value) in response_headers.iter() {
        if name.as_str().eq_ignore_ascii_case("content-length") {
            continue;
        }
        response = response.header(name.as_str(), value.as_bytes());
    }
    response
        .body(response_body.to_vec())
        .map_err(|e| GatewayError::Internal(e.to_string()))
}

/// Builds the full set of filters and wraps them with TLS-terminated warp,
/// running until the process is signaled to shut down.
pub async fn serve(state: Arc<AppState>, listen_addr: std::net::SocketAddr, cert_path: PathBuf, key_path: PathBuf) {
    let refresh_token_route = warp::path!("proxy" / "refresh-token")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_state(state.clone()))
        .and_then(refresh_token);

    let refresh_admin_route = warp::path!("proxy" / "refresh-admin")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_state(state.clone()))
        .and_then(refresh_admin);

    let roles_route = warp::path!("proxy" / "roles")
        .and(warp::get())
        .and(with_claims(state.tokens.clone()))
        .and(with_state(state.clone()))
        .and_then(volumes::roles);

    let volumes_route = warp::path!("proxy" / "volumes")
        .and(warp::get())
        .and(with_claims(state.tokens.clone()))
        .and(with_state(state.clone()))
        .and_then(volumes::list);

    let admin_claims = with_claims(state.tokens.clone()).and_then(require_admin);

    let tenant_create = warp::path!("proxy" / "tenant")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_state(state.clone()))
        .and(admin_claims.clone())
        .and_then(create_tenant);

    let tenant_list = warp::path!("proxy" / "tenant")
        .and(warp::get())
        .and(with_state(state.clone()))
        .and(admin_claims.clone())
        .and_then(list_tenants);

    let tenant_update = warp::path!("proxy" / "tenant" / String)
        .and(warp::put())
        .and(warp::body::json())
        .and(with_state(state.clone()))
        .and(admin_claims.clone())
        .and_then(update_tenant);

    let tenant_get = warp::path!("proxy" / "tenant" / String)
        .and(warp::get())
        .and(with_state(state.clone()))
        .and(admin_claims.clone())
        .and_then(get_tenant);

    let tenant_delete = warp::path!("proxy" / "tenant" / String)
        .and(warp::delete())
        .and(with_state(state.clone()))
        .and(admin_claims.clone())
        .and_then(delete_tenant);

    let tenant_bind = warp::path!("proxy" / "tenant" / String / "bind")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_state(state.clone()))
        .and(admin_claims.clone())
        .and_then(bind_role);

    let tenant_unbind = warp::path!("proxy" / "tenant" / String / "unbind")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_state(state.clone()))
        .and(admin_claims.clone())
        .and_then(unbind_role);

    let tenant_token = warp::path!("proxy" / "tenant" / String / "token")
        .and(warp::post())
        .and(with_state(state.clone()))
        .and(admin_claims.clone())
        .and_then(generate_token);

    let tenant_revoke = warp::path!("proxy" / "tenant" / String / "revoke")
        .and(warp::post())
        .and(with_state(state.clone()))
        .and(admin_claims.clone())
        .and_then(revoke_tenant);

    let tenant_cancel_revoke = warp::path!("proxy" / "tenant" / String / "cancel-revoke")
        .and(warp::post())
        .and(with_state(state.clone()))
        .and(admin_claims.clone())
        .and_then(cancel_revoke_tenant);

    let storage_list = warp::path!("proxy" / "storage")
        .and(warp::get())
        .and(with_state(state.clone()))
        .and(admin_claims.clone())
        .and_then(list_storage);

    let storage_get = warp::path!("proxy" / "storage" / String / String)
        .and(warp::get())
        .and(with_state(state.clone()))
        .and(admin_claims.clone())
        .and_then(get_storage);

    let proxy_route = warp::method()
        .and(warp::path::full())
        .and(warp::filters::query::raw().map(Some).or(warp::any().map(|| None)).unify())
        .and(warp::header::headers_cloned())
        .and(warp::body::bytes())
        .and(with_claims(state.tokens.clone()).and_then(require_tenant))
        .and(with_state(state.clone()))
        .and_then(proxy);

    let routes = refresh_token_route
        .or(refresh_admin_route)
        .or(roles_route)
        .or(volumes_route)
        .or(tenant_create)
        .or(tenant_list)
        .or(tenant_update)
        .or(tenant_get)
        .or(tenant_delete)
        .or(tenant_bind)
        .or(tenant_unbind)
        .or(tenant_token)
        .or(tenant_revoke)
        .or(tenant_cancel_revoke)
        .or(storage_list)
        .or(storage_get)
        .or(proxy_route)
        .recover(reject::handle);

    warp::serve(routes).tls().cert_path(&cert_path).key_path(&key_path).run(listen_addr).await;
}
