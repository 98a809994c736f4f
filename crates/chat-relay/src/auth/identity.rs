//! Verifier backed by the identity provider's account lookup endpoint.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::BearerToken;
use super::verifier::{AuthError, Principal, TokenVerifier};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LookupRequest<'a> {
    id_token: &'a str,
}

#[derive(Deserialize)]
struct LookupResponse {
    #[serde(default)]
    users: Vec<LookupUser>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LookupUser {
    local_id: String,
    #[serde(default)]
    email: Option<String>,
}

/// Resolves ID tokens via `POST {base_url}/v1/accounts:lookup`.
///
/// A 400 answer means the token is bad; anything else unexpected means the
/// identity provider could not be consulted, including a lookup that does
/// not finish within `timeout`.
pub struct IdentityToolkitVerifier {
    client: Client,
    base_url: String,
    api_key: String,
    timeout: Duration,
}

impl IdentityToolkitVerifier {
    #[must_use]
    pub fn new(
        client: Client,
        base_url: impl Into<String>,
        api_key: String,
        timeout: Duration,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            timeout,
        }
    }

    async fn lookup(&self, token: &BearerToken) -> Result<Principal, AuthError> {
        let url = format!("{}/v1/accounts:lookup", self.base_url);

        let response = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&LookupRequest {
                id_token: token.as_str(),
            })
            .send()
            .await
            .map_err(|e| AuthError::Unavailable(e.to_string()))?;

        let status = response.status();
        if status.as_u16() == 400 {
            let body = response.text().await.unwrap_or_default();
            debug!(body = %body, "identity provider rejected token");
            return Err(AuthError::Rejected("invalid id token".into()));
        }
        if !status.is_success() {
            return Err(AuthError::Unavailable(format!(
                "identity provider returned {status}"
            )));
        }

        let lookup: LookupResponse = response
            .json()
            .await
            .map_err(|e| AuthError::Unavailable(e.to_string()))?;

        let user = lookup
            .users
            .into_iter()
            .next()
            .ok_or_else(|| AuthError::Rejected("no account for token".into()))?;

        Ok(Principal {
            id: user.local_id,
            email: user.email,
        })
    }
}

#[async_trait]
impl TokenVerifier for IdentityToolkitVerifier {
    async fn verify(&self, token: &BearerToken) -> Result<Principal, AuthError> {
        tokio::time::timeout(self.timeout, self.lookup(token))
            .await
            .map_err(|_| AuthError::Unavailable("identity lookup timed out".into()))?
    }
}
