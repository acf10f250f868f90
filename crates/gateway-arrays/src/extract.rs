//! Pulls the quota-relevant fields (pool, volume name, capacity) out of an
//! intercepted request body.
//!
//! The exact per-array wire format for these fields is explicitly out of
//! scope (`spec.md` §1, "implementing array protocols beyond what is
//! required..."); this assumes the common gateway-normalized body the
//! per-node sidecar injector produces before the request reaches the
//! gateway, rather than guessing at any one array's native field names.

use gateway_core::GatewayError;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct CreateBody {
    name: String,
    pool: String,
    #[serde(rename = "capacityKb")]
    capacity_kb: u64,
}

#[derive(Debug, Deserialize)]
struct DeleteBody {
    name: String,
}

pub struct CreateFields {
    pub pool: String,
    pub volume_name: String,
    pub capacity_kb: u64,
}

/// Parses `{name, pool, capacityKb}` from a create/snapshot-create body.
/// A malformed body is reported the same way as a malformed `Forwarded`
/// header (`spec.md` §7, `Unauthorized`): the gateway can't even identify
/// what's being requested.
pub fn create_fields(body: &[u8]) -> Result<CreateFields, GatewayError> {
    let parsed: CreateBody =
        serde_json::from_slice(body).map_err(|e| GatewayError::Unauthorized(format!("malformed create body: {e}")))?;
    Ok(CreateFields {
        pool: parsed.pool,
        volume_name: parsed.name,
        capacity_kb: parsed.capacity_kb,
    })
}

/// Parses `{name}` from a delete/snapshot-delete body.
pub fn delete_volume_name(body: &[u8]) -> Result<String, GatewayError> {
    let parsed: DeleteBody =
        serde_json::from_slice(body).map_err(|e| GatewayError::Unauthorized(format!("malformed delete body: {e}")))?;
    Ok(parsed.name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_create_body() {
        let fields = create_fields(br#"{"name":"v1","pool":"bronze","capacityKb":1048576}"#).unwrap();
        assert_eq!(fields.volume_name, "v1");
        assert_eq!(fields.pool, "bronze");
        assert_eq!(fields.capacity_kb, 1048576);
    }

    #[test]
    fn rejects_malformed_create_body() {
        let err = create_fields(b"not json").unwrap_err();
        assert!(matches!(err, GatewayError::Unauthorized(_)));
    }

    #[test]
    fn parses_delete_body() {
        assert_eq!(delete_volume_name(br#"{"name":"v1"}"#).unwrap(), "v1");
    }
}
