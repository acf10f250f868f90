//! Turns a [`GatewayError`] into the right HTTP envelope: the default
//! `{error, code}` shape, or the NAS-style `{errors: [{code, message}]}`
//! shape when the request is bound for `powerscale` (`spec.md` §4.6, §7).

use gateway_core::model::{ErrorEnvelope, NasErrorEnvelope};
use gateway_core::{ArrayFamily, GatewayError};
use std::convert::Infallible;
use warp::http::{Response, StatusCode};
use warp::{Rejection, Reply};

#[derive(Debug)]
pub struct ApiError {
    pub error: GatewayError,
    pub family: Option<ArrayFamily>,
}

impl warp::reject::Reject for ApiError {}

pub fn reject(error: GatewayError, family: Option<ArrayFamily>) -> Rejection {
    warp::reject::custom(ApiError { error, family })
}

pub async fn handle(err: Rejection) -> Result<impl Reply, Infallible> {
    let (status, body) = if let Some(api_err) = err.find::<ApiError>() {
        let status = StatusCode::from_u16(api_err.error.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = render(&api_err.error, api_err.family);
        (status, body)
    } else if err.is_not_found() {
        (StatusCode::NOT_FOUND, render(&GatewayError::NotFound("no such route".into()), None))
    } else {
        tracing::error!(?err, "unhandled rejection");
        (StatusCode::INTERNAL_SERVER_ERROR, render(&GatewayError::Internal("unhandled rejection".into()), None))
    };

    Ok(Response::builder()
        .status(status)
        .header("content-type", "application/json")
        .body(body)
        .unwrap_or_else(|_| Response::new(Vec::new())))
}

fn render(error: &GatewayError, family: Option<ArrayFamily>) -> Vec<u8> {
    let (cap, current) = match error {
        GatewayError::Forbidden { cap, current, .. } => (*cap, *current),
        _ => (None, None),
    };
    match family {
        Some(ArrayFamily::PowerScale) => {
            serde_json::to_vec(&NasErrorEnvelope::single(error.status_code(), error.to_string(), cap, current)).unwrap_or_default()
        }
        _ => serde_json::to_vec(&ErrorEnvelope {
            error: error.to_string(),
            code: error.status_code(),
            cap,
            current,
        })
        .unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // spec.md §8 scenario 2: a quota denial's body carries cap and current.
    #[test]
    fn quota_denial_carries_cap_and_current_on_the_wire() {
        let error = GatewayError::quota_denied(9 * 1024 * 1024, 1024 * 1024);

        let body = render(&error, None);
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["cap"], 9 * 1024 * 1024);
        assert_eq!(json["current"], 1024 * 1024);
        assert_eq!(json["code"], 403);

        let nas_body = render(&error, Some(ArrayFamily::PowerScale));
        let nas_json: serde_json::Value = serde_json::from_slice(&nas_body).unwrap();
        assert_eq!(nas_json["errors"][0]["cap"], 9 * 1024 * 1024);
        assert_eq!(nas_json["errors"][0]["current"], 1024 * 1024);
    }

    #[test]
    fn plain_forbidden_omits_cap_and_current() {
        let error = GatewayError::forbidden("no role grants this scope");
        let body = render(&error, None);
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert!(json.get("cap").is_none());
        assert!(json.get("current").is_none());
    }
}
