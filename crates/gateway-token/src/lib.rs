//! `TokenManager`: issues, signs, parses, and validates access/refresh
//! token pairs (`spec.md` §4.3).

use chrono::{Duration as ChronoDuration, Utc};
use gateway_core::model::{Claims, Subject};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::info;

const ISSUER: &str = "com.dell.csm";
const AUDIENCE: &str = "csm";

/// Distinguishes "expired" from any other validation failure, as
/// `spec.md` §4.3 and §8 require so the refresh endpoint can recognize it
/// explicitly.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("token expired")]
    Expired,
    #[error("invalid token: {0}")]
    Invalid(String),
}

/// The per-call inputs to mint a new token pair: role bindings never change
/// across a refresh (`spec.md` §3, "Refresh never changes subject, group, or
/// roles").
#[derive(Debug, Clone)]
pub struct NewPairParams {
    pub subject: Subject,
    pub roles: Vec<String>,
    pub group: String,
}

/// A freshly-minted access/refresh pair.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

/// Signs and validates HS256 tokens against a shared secret that can be
/// reloaded at runtime (`spec.md` §4.3, §9). Readers re-read the secret on
/// every parse rather than capturing it, per the "Globals and runtime
/// reconfiguration" design note.
pub struct TokenManager {
    secret: Arc<RwLock<String>>,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenManager {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: Arc::new(RwLock::new(secret.into())),
            access_ttl: Duration::from_secs(15 * 60),
            refresh_ttl: Duration::from_secs(24 * 60 * 60),
        }
    }

    pub fn with_ttls(mut self, access_ttl: Duration, refresh_ttl: Duration) -> Self {
        self.access_ttl = access_ttl;
        self.refresh_ttl = refresh_ttl;
        self
    }

    /// A cheap handle other tasks can use to push a reloaded secret in,
    /// e.g. from a `gateway_fswatch::watch_file` callback.
    pub fn secret_handle(&self) -> Arc<RwLock<String>> {
        self.secret.clone()
    }

    pub async fn set_secret(&self, secret: impl Into<String>) {
        *self.secret.write().await = secret.into();
        info!("signing secret reloaded");
    }

    /// Issues a new access/refresh pair. Sets issuer `com.dell.csm`,
    /// audience `csm`, and copies `roles`/`group` from `params`
    /// (`spec.md` §4.3).
    pub async fn new_pair(&self, params: &NewPairParams) -> Result<TokenPair, TokenError> {
        let access = self.mint(params, self.access_ttl).await?;
        let refresh = self.mint(params, self.refresh_ttl).await?;
        Ok(TokenPair { access, refresh })
    }

    /// Mints a single token with an explicit TTL. Used directly by
    /// `TenantRegistry::RefreshToken`, which mints a replacement access
    /// token with a fixed 30-second TTL (`spec.md` §4.4).
    pub async fn mint(&self, params: &NewPairParams, ttl: Duration) -> Result<String, TokenError> {
        let now = Utc::now();
        let exp = now + ChronoDuration::from_std(ttl).map_err(|e| TokenError::Invalid(e.to_string()))?;
        let claims = Claims {
            iss: ISSUER.to_owned(),
            aud: AUDIENCE.to_owned(),
            sub: params.subject,
            exp: exp.timestamp(),
            iat: now.timestamp(),
            roles: params.roles.join(","),
            group: params.group.clone(),
        };
        let secret = self.secret.read().await.clone();
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .map_err(|e| TokenError::Invalid(e.to_string()))
    }

    /// Validates signature first, then expiry, distinguishing the two
    /// failure modes (`spec.md` §4.3, §8).
    pub async fn parse_with_claims(&self, token: &str) -> Result<Claims, TokenError> {
        let secret = self.secret.read().await.clone();
        let mut validation = Validation::new(jsonwebtoken::Algorithm::HS256);
        validation.set_audience(&[AUDIENCE]);
        validation.set_issuer(&[ISSUER]);
        // Validate expiry ourselves below so we can distinguish it cleanly
        // from any other signature/claim failure.
        validation.validate_exp = false;

        let data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &validation,
        )
        .map_err(|e| TokenError::Invalid(e.to_string()))?;

        if data.claims.exp < Utc::now().timestamp() {
            return Err(TokenError::Expired);
        }
        Ok(data.claims)
    }

    /// True iff the token parses successfully *and* has expired — used by
    /// `RefreshToken` to require that the access token specifically be
    /// expired before minting a new one (`spec.md` §4.4).
    pub async fn is_expired(&self, token: &str) -> bool {
        matches!(self.parse_with_claims(token).await, Err(TokenError::Expired))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration as StdDuration;

    fn params() -> NewPairParams {
        NewPairParams {
            subject: Subject::CsmTenant,
            roles: vec!["CA-medium".to_owned()],
            group: "Alice".to_owned(),
        }
    }

    #[tokio::test]
    async fn parse_of_sign_round_trips_claims() {
        let manager = TokenManager::new("s3cr3t");
        let pair = manager.new_pair(&params()).await.unwrap();
        let claims = manager.parse_with_claims(&pair.access).await.unwrap();
        assert_eq!(claims.group, "Alice");
        assert_eq!(claims.role_list(), vec!["CA-medium".to_owned()]);
        assert_eq!(claims.sub, Subject::CsmTenant);
    }

    #[tokio::test]
    async fn expired_token_is_distinguished() {
        let manager = TokenManager::new("s3cr3t").with_ttls(StdDuration::from_secs(0), StdDuration::from_secs(3600));
        let pair = manager.new_pair(&params()).await.unwrap();
        tokio::time::sleep(StdDuration::from_millis(1100)).await;
        let err = manager.parse_with_claims(&pair.access).await.unwrap_err();
        assert_eq!(err, TokenError::Expired);
    }

    #[tokio::test]
    async fn bad_signature_is_invalid_not_expired() {
        let manager = TokenManager::new("s3cr3t");
        let other = TokenManager::new("different-secret");
        let pair = manager.new_pair(&params()).await.unwrap();
        let err = other.parse_with_claims(&pair.access).await.unwrap_err();
        assert!(matches!(err, TokenError::Invalid(_)));
    }

    #[tokio::test]
    async fn reload_changes_subsequent_validation() {
        let manager = TokenManager::new("s3cr3t");
        let pair = manager.new_pair(&params()).await.unwrap();
        manager.set_secret("new-secret").await;
        let err = manager.parse_with_claims(&pair.access).await.unwrap_err();
        assert!(matches!(err, TokenError::Invalid(_)));
    }

    #[tokio::test]
    async fn mint_with_explicit_ttl_for_refresh_flow() {
        let manager = TokenManager::new("s3cr3t");
        let token = manager.mint(&params(), StdDuration::from_secs(30)).await.unwrap();
        let claims = manager.parse_with_claims(&token).await.unwrap();
        let ttl = claims.exp - claims.iat;
        assert!((29..=31).contains(&ttl), "expected ~30s ttl, got {ttl}");
    }
}
