//! Role authority client.

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use jobgate_core::CallerIdentity;
use serde::Deserialize;
use url::Url;

use super::{ROLE_AUTHORITY, RoleAuthority, http_client, transport_error};
use crate::AuthResult;
use crate::error::AuthError;

const ME_PATH: &str = "api/V2/me";

#[derive(Debug, Deserialize)]
struct MeResponse {
    #[serde(default)]
    customroles: Vec<String>,
}

/// HTTP client for the auth service's "who am I" endpoint.
///
/// The caller's token is forwarded verbatim; the response lists the custom
/// roles the token's owner holds.
pub struct HttpRoleAuthority {
    http_client: reqwest::Client,
    me_url: Url,
}

impl HttpRoleAuthority {
    /// Creates a client for the auth service rooted at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the endpoint URL cannot be derived
    /// from `base_url` or the HTTP client cannot be built.
    pub fn new(base_url: Url, timeout: Duration) -> AuthResult<Self> {
        let me_url = me_url(&base_url)?;
        Ok(Self {
            http_client: http_client(timeout)?,
            me_url,
        })
    }

    /// Endpoint queried for role memberships.
    pub fn url(&self) -> &Url {
        &self.me_url
    }
}

fn me_url(base_url: &Url) -> AuthResult<Url> {
    let mut base = base_url.clone();
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base.join(ME_PATH)
        .map_err(|e| AuthError::configuration(format!("Invalid auth_url '{base_url}': {e}")))
}

#[async_trait]
impl RoleAuthority for HttpRoleAuthority {
    async fn get_roles(&self, caller: &CallerIdentity) -> AuthResult<HashSet<String>> {
        tracing::debug!(user = %caller.user_id(), "Fetching caller roles");

        let response = self
            .http_client
            .get(self.me_url.as_str())
            .header(reqwest::header::AUTHORIZATION, caller.token())
            .send()
            .await
            .map_err(|e| transport_error(ROLE_AUTHORITY, e))?;

        if !response.status().is_success() {
            return Err(AuthError::authority_unavailable(
                ROLE_AUTHORITY,
                format!("HTTP status {}", response.status().as_u16()),
            ));
        }

        let body: MeResponse = response
            .json()
            .await
            .map_err(|e| transport_error(ROLE_AUTHORITY, e))?;

        Ok(body.customroles.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_me_url_with_and_without_trailing_slash() {
        let plain = Url::parse("https://ci.example.org/services/auth").unwrap();
        let slashed = Url::parse("https://ci.example.org/services/auth/").unwrap();

        assert_eq!(
            me_url(&plain).unwrap().as_str(),
            "https://ci.example.org/services/auth/api/V2/me"
        );
        assert_eq!(me_url(&plain).unwrap(), me_url(&slashed).unwrap());
    }

    #[test]
    fn test_missing_customroles_is_empty() {
        let body: MeResponse = serde_json::from_str(r#"{"user": "alice"}"#).unwrap();
        assert!(body.customroles.is_empty());
    }
}
