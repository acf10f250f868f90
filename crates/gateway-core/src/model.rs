//! Plain data types shared across the gateway's crates (`spec.md` §3).

use crate::family::ArrayFamily;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A tenant: a Kubernetes-level identity the gateway authorizes on behalf of.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tenant {
    pub name: String,
    pub created_at: DateTime<Utc>,
    /// When true, additionally authorizes SDC-registration on `powerflex`.
    pub approve_sdc: bool,
    pub roles: BTreeSet<String>,
    pub revoked: bool,
}

impl Tenant {
    pub fn new(name: impl Into<String>, approve_sdc: bool) -> Self {
        Self {
            name: name.into(),
            created_at: Utc::now(),
            approve_sdc,
            roles: BTreeSet::new(),
            revoked: false,
        }
    }
}

/// One (name, family, array-id, pool) quota cap, as loaded by `RoleRegistry`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleInstance {
    pub name: String,
    pub family: ArrayFamily,
    pub array_id: String,
    pub pool: String,
    pub quota_kb: u64,
}

/// Credentials and connection details for one storage array, as loaded by
/// `StorageRegistry`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageSystemRecord {
    pub family: ArrayFamily,
    pub array_id: String,
    pub username: String,
    pub password: String,
    pub endpoint: String,
    pub insecure: bool,
    pub is_default: bool,
}

/// Token claims, same shape for access and refresh tokens (`spec.md` §3).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub iss: String,
    pub aud: String,
    pub sub: Subject,
    /// Unix seconds.
    pub exp: i64,
    /// Unix seconds; stamped for audit even though `spec.md` does not name it.
    pub iat: i64,
    /// Comma-joined role names.
    pub roles: String,
    /// Tenant or admin name.
    pub group: String,
}

impl Claims {
    pub fn role_list(&self) -> Vec<String> {
        if self.roles.is_empty() {
            Vec::new()
        } else {
            self.roles.split(',').map(str::to_owned).collect()
        }
    }
}

/// The JWT subject: distinguishes tenant callers from administrative ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Subject {
    CsmTenant,
    CsmAdmin,
}

impl Subject {
    pub fn as_str(&self) -> &'static str {
        match self {
            Subject::CsmTenant => "csm-tenant",
            Subject::CsmAdmin => "csm-admin",
        }
    }
}

/// The decision object returned by the policy engine (`spec.md` §4.2 step 4).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyDecision {
    pub allow: bool,
    #[serde(default)]
    pub permitted_roles: Vec<String>,
    #[serde(default)]
    pub deny_reasons: Vec<String>,
}

/// Default error envelope: `{error, code}` (`spec.md` §4.2, §7). A quota
/// denial additionally carries `cap`/`current` so a client can tell how far
/// over the line it is without re-parsing `error` (`spec.md` §4.1, §8
/// scenario 2).
#[derive(Debug, Clone, Serialize)]
pub struct ErrorEnvelope {
    pub error: String,
    pub code: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cap: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current: Option<u64>,
}

/// `powerscale`'s error envelope: `{errors: [{code, message, cap?, current?}]}`.
#[derive(Debug, Clone, Serialize)]
pub struct NasErrorEnvelope {
    pub errors: Vec<NasError>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NasError {
    pub code: u16,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cap: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current: Option<u64>,
}

impl NasErrorEnvelope {
    pub fn single(code: u16, message: impl Into<String>, cap: Option<u64>, current: Option<u64>) -> Self {
        Self {
            errors: vec![NasError {
                code,
                message: message.into(),
                cap,
                current,
            }],
        }
    }
}

/// A volume the gateway has recorded for a tenant (`VolumesQuery`, `spec.md` §4).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VolumeSummary {
    pub name: String,
    pub family: ArrayFamily,
    pub system_id: String,
    pub pool: String,
    pub role: String,
    pub capacity_kb: u64,
}
