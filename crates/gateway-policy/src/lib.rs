//! `PolicyClient`: POSTs `{input: {...}}` to a named policy path and parses
//! a typed decision object (`spec.md` §4.2 step 4, §6 "Policy protocol").

use gateway_core::model::PolicyDecision;
use gateway_core::GatewayError;
use serde_json::Value;
use std::time::Duration;
use tracing::instrument;

pub struct PolicyClient {
    http: reqwest::Client,
    base_url: String,
}

impl PolicyClient {
    pub fn new(base_url: impl Into<String>, call_deadline: Duration) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder().timeout(call_deadline).build()?;
        Ok(Self {
            http,
            base_url: base_url.into(),
        })
    }

    /// Evaluates `input` against the policy document at `policy_path`
    /// (e.g. `karavi/volumes/powerflex/create`) and returns the parsed
    /// `.result` decision.
    #[instrument(skip(self, input), fields(policy_path))]
    pub async fn evaluate(
        &self,
        policy_path: &str,
        input: Value,
    ) -> Result<PolicyDecision, GatewayError> {
        let url = format!("{}/v1/data/{}", self.base_url.trim_end_matches('/'), policy_path);
        let body = serde_json::json!({ "input": input });

        let response = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(GatewayError::Transport(format!(
                "policy service returned status {}",
                response.status()
            )));
        }

        let envelope: Value = response
            .json()
            .await
            .map_err(|e| GatewayError::Internal(format!("malformed policy response: {e}")))?;

        let result = envelope
            .get("result")
            .cloned()
            .ok_or_else(|| GatewayError::Internal("policy response missing result".into()))?;

        serde_json::from_value(result)
            .map_err(|e| GatewayError::Internal(format!("unexpected policy decision shape: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn parses_allow_decision() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("POST", "/v1/data/karavi/volumes/powerflex/create")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"result": {"allow": true, "permitted_roles": ["CA-medium"]}}"#)
            .create_async()
            .await;

        let client = PolicyClient::new(server.url(), Duration::from_secs(2)).unwrap();
        let decision = client
            .evaluate(
                "karavi/volumes/powerflex/create",
                serde_json::json!({"tenant": "Alice"}),
            )
            .await
            .unwrap();

        assert!(decision.allow);
        assert_eq!(decision.permitted_roles, vec!["CA-medium".to_owned()]);
    }

    #[tokio::test]
    async fn parses_deny_decision_with_reasons() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("POST", "/v1/data/karavi/volumes/powermax/create")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"result": {"allow": false, "deny_reasons": ["no matching role"]}}"#)
            .create_async()
            .await;

        let client = PolicyClient::new(server.url(), Duration::from_secs(2)).unwrap();
        let decision = client
            .evaluate("karavi/volumes/powermax/create", serde_json::json!({}))
            .await
            .unwrap();

        assert!(!decision.allow);
        assert_eq!(decision.deny_reasons, vec!["no matching role".to_owned()]);
    }

    #[tokio::test]
    async fn transport_error_on_unreachable_host() {
        let client = PolicyClient::new("http://127.0.0.1:1", Duration::from_millis(200)).unwrap();
        let err = client
            .evaluate("karavi/volumes/powerflex/create", serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Transport(_)));
    }
}
