//! `AuthMiddleware`: extracts and validates the bearer token, attaching
//! parsed claims to the request context (`spec.md` §4.6). The refresh
//! paths never sit behind this filter; everything else does.

use crate::reject::reject;
use gateway_core::model::{Claims, Subject};
use gateway_core::GatewayError;
use gateway_token::TokenManager;
use std::sync::Arc;
use warp::{Filter, Rejection};

/// The family hint used to pick the right error envelope on rejection, read
/// from the `Forwarded` header's `by` field when present (`spec.md` §4.6).
fn family_hint(forwarded: Option<&str>) -> Option<gateway_core::ArrayFamily> {
    forwarded.and_then(gateway_arrays::forwarded::parse).and_then(|t| t.family)
}

/// Parses `Authorization: Bearer <tkn>` and validates it, yielding the
/// token's claims on success.
pub fn with_claims(tokens: Arc<TokenManager>) -> impl Filter<Extract = (Claims,), Error = Rejection> + Clone {
    warp::header::optional::<String>("authorization")
        .and(warp::header::optional::<String>("forwarded"))
        .and_then(move |auth: Option<String>, forwarded: Option<String>| {
            let tokens = tokens.clone();
            async move {
                let family = family_hint(forwarded.as_deref());
                let Some(header) = auth else {
                    return Err(reject(GatewayError::Unauthorized("missing authorization header".into()), family));
                };
                let Some(token) = header.strip_prefix("Bearer ") else {
                    return Err(reject(GatewayError::Unauthorized("authorization header is not a bearer token".into()), family));
                };
                tokens
                    .parse_with_claims(token)
                    .await
                    .map_err(|e| reject(GatewayError::Unauthorized(e.to_string()), family))
            }
        })
}

/// Narrows a tenant/admin claims filter to admin-only, for `/proxy/tenant/`
/// and `/proxy/storage/` mutations (`spec.md` §4.6).
pub async fn require_admin(claims: Claims) -> Result<Claims, Rejection> {
    if claims.sub == Subject::CsmAdmin {
        Ok(claims)
    } else {
        Err(reject(GatewayError::Unauthorized("admin token required".into()), None))
    }
}

/// Narrows to tenant-only, for the array-proxying catch-all: admin tokens
/// don't drive CSI traffic.
pub async fn require_tenant(claims: Claims) -> Result<Claims, Rejection> {
    if claims.sub == Subject::CsmTenant {
        Ok(claims)
    } else {
        Err(reject(GatewayError::Unauthorized("tenant token required".into()), None))
    }
}
