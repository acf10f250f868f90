//! Per-array session-token cache with a single-writer refresh lock and a
//! broadcast wake for queued waiters (`spec.md` §4.2 "Session refresh",
//! §5 "Credential cache per array family").

use gateway_core::GatewayError;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex, RwLock};

struct ArrayState {
    token: RwLock<Option<String>>,
    refresh_lock: Mutex<()>,
    wake: broadcast::Sender<()>,
}

impl ArrayState {
    fn new() -> Self {
        let (wake, _) = broadcast::channel(16);
        Self {
            token: RwLock::new(None),
            refresh_lock: Mutex::new(()),
            wake,
        }
    }
}

/// Holds one [`ArrayState`] per array id, created on first access.
pub struct SessionCache {
    arrays: RwLock<HashMap<String, Arc<ArrayState>>>,
}

impl Default for SessionCache {
    fn default() -> Self {
        Self {
            arrays: RwLock::new(HashMap::new()),
        }
    }
}

impl SessionCache {
    /// The cached token, if one exists, without performing a login.
    pub async fn token(&self, array_id: &str) -> Option<String> {
        self.entry(array_id).await.token.read().await.clone()
    }

    /// Returns a cached token or performs a fresh login via `login`,
    /// serialized per array id. Callers that arrive while another refresh
    /// is in-flight wait on the broadcast channel and retry once against
    /// the result, rather than performing a second login.
    pub async fn ensure_token<F, Fut>(&self, array_id: &str, login: F) -> Result<String, GatewayError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<String, GatewayError>>,
    {
        let state = self.entry(array_id).await;
        if let Some(token) = state.token.read().await.clone() {
            return Ok(token);
        }
        self.refresh_locked(&state, login).await
    }

    /// Forces a fresh login, e.g. after the array returns 401 to a
    /// rewritten request.
    pub async fn refresh<F, Fut>(&self, array_id: &str, login: F) -> Result<String, GatewayError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<String, GatewayError>>,
    {
        let state = self.entry(array_id).await;
        self.refresh_locked(&state, login).await
    }

    async fn entry(&self, array_id: &str) -> Arc<ArrayState> {
        if let Some(state) = self.arrays.read().await.get(array_id) {
            return state.clone();
        }
        self.arrays
            .write()
            .await
            .entry(array_id.to_owned())
            .or_insert_with(|| Arc::new(ArrayState::new()))
            .clone()
    }

    async fn refresh_locked<F, Fut>(&self, state: &Arc<ArrayState>, login: F) -> Result<String, GatewayError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<String, GatewayError>>,
    {
        let guard = state.refresh_lock.try_lock();
        let _permit = match guard {
            Ok(permit) => permit,
            Err(_) => {
                let mut waiter = state.wake.subscribe();
                let _ = waiter.recv().await;
                return state
                    .token
                    .read()
                    .await
                    .clone()
                    .ok_or_else(|| GatewayError::Transport("session refresh did not produce a token".into()));
            }
        };

        let token = login().await?;
        *state.token.write().await = Some(token.clone());
        let _ = state.wake.send(());
        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn ensure_token_logs_in_once_then_caches() {
        let cache = SessionCache::default();
        let logins = Arc::new(AtomicU32::new(0));

        let l = logins.clone();
        let first = cache
            .ensure_token("12345", || async move {
                l.fetch_add(1, Ordering::SeqCst);
                Ok("tok-1".to_owned())
            })
            .await
            .unwrap();
        assert_eq!(first, "tok-1");

        let l = logins.clone();
        let second = cache
            .ensure_token("12345", || async move {
                l.fetch_add(1, Ordering::SeqCst);
                Ok("tok-2".to_owned())
            })
            .await
            .unwrap();

        assert_eq!(second, "tok-1");
        assert_eq!(logins.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn refresh_replaces_cached_token() {
        let cache = SessionCache::default();
        cache.ensure_token("12345", || async { Ok("tok-1".to_owned()) }).await.unwrap();
        let refreshed = cache.refresh("12345", || async { Ok("tok-2".to_owned()) }).await.unwrap();
        assert_eq!(refreshed, "tok-2");
        assert_eq!(cache.token("12345").await, Some("tok-2".to_owned()));
    }
}
