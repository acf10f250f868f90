//! `GET /proxy/volumes/`: lists the caller's recorded volumes (`spec.md`
//! §4, "VolumesQuery").

use crate::reject::reject;
use crate::state::AppState;
use gateway_core::model::Claims;
use gateway_core::GatewayError;
use std::sync::Arc;
use warp::{Rejection, Reply};

pub async fn list(claims: Claims, state: Arc<AppState>) -> Result<impl Reply, Rejection> {
    let volumes = state
        .quota
        .list_volumes(&claims.group)
        .await
        .map_err(|e| reject(e, None))?;
    Ok(warp::reply::json(&volumes))
}

/// `GET /proxy/roles/`: lists the caller's permitted role instances
/// (`spec.md` §4, "RoleQuery").
pub async fn roles(claims: Claims, state: Arc<AppState>) -> Result<impl Reply, Rejection> {
    let names = claims.role_list();
    let out: Vec<_> = state
        .roles
        .all()
        .into_iter()
        .filter(|r| names.contains(&r.name))
        .collect();
    Ok(warp::reply::json(&out))
}
