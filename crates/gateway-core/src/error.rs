//! Error kinds shared across the gateway (`spec.md` §7).

use thiserror::Error;

/// A gateway error, carrying enough structure for handlers to pick an HTTP
/// status and envelope without re-inspecting the failure.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Missing/invalid/expired token, or a malformed `Forwarded` header.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Policy or quota denial. Quota denials carry the cap and current usage.
    #[error("forbidden: {reason}")]
    Forbidden {
        reason: String,
        cap: Option<u64>,
        current: Option<u64>,
    },

    /// Tenant or role not found during an administrative call.
    #[error("not found: {0}")]
    NotFound(String),

    /// Duplicate tenant creation.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The array returned a non-2xx response.
    #[error("upstream array error: status {status}")]
    Upstream { status: u16, body: String },

    /// KV store or array unreachable within the call's deadline.
    #[error("transport error: {0}")]
    Transport(String),

    /// A programming error surfaced as a 500 with full server-side context.
    #[error("internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    /// The HTTP status this error maps to (`spec.md` §7).
    pub fn status_code(&self) -> u16 {
        match self {
            GatewayError::Unauthorized(_) => 401,
            GatewayError::Forbidden { .. } => 403,
            GatewayError::NotFound(_) => 404,
            GatewayError::Conflict(_) => 409,
            GatewayError::Upstream { status, .. } => *status,
            GatewayError::Transport(_) => 502,
            GatewayError::Internal(_) => 500,
        }
    }

    pub fn forbidden(reason: impl Into<String>) -> Self {
        GatewayError::Forbidden {
            reason: reason.into(),
            cap: None,
            current: None,
        }
    }

    pub fn quota_denied(cap: u64, current: u64) -> Self {
        GatewayError::Forbidden {
            reason: "quota exceeded".into(),
            cap: Some(cap),
            current: Some(current),
        }
    }
}
