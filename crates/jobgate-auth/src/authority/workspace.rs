//! Workspace authority client.
//!
//! Speaks JSON-RPC 1.1 to the workspace service and asks for the permission
//! table of a single workspace (`Workspace.get_permissions_mass`). The table
//! maps user names, plus `*` for public access, to single-letter codes.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use jobgate_core::{CallerIdentity, PermissionLevel, WorkspaceId};
use serde::{Deserialize, Serialize};
use url::Url;

use super::{WORKSPACE_AUTHORITY, WorkspaceAuthority, http_client, transport_error};
use crate::AuthResult;
use crate::error::AuthError;

const GET_PERMISSIONS_METHOD: &str = "Workspace.get_permissions_mass";

/// Permission-table key granting access to everyone.
const PUBLIC_USER: &str = "*";

#[derive(Debug, Serialize)]
struct RpcRequest<'a> {
    method: &'static str,
    version: &'static str,
    id: &'static str,
    params: [PermissionsParams<'a>; 1],
}

#[derive(Debug, Serialize)]
struct PermissionsParams<'a> {
    workspaces: [WorkspaceIdentity<'a>; 1],
}

/// Numeric ids go as `id`, anything else as a workspace name.
#[derive(Debug, Serialize)]
#[serde(untagged)]
enum WorkspaceIdentity<'a> {
    Id { id: i64 },
    Name { workspace: &'a str },
}

impl<'a> WorkspaceIdentity<'a> {
    fn from_workspace(workspace: &'a WorkspaceId) -> Self {
        match workspace.as_str().parse::<i64>() {
            Ok(id) => Self::Id { id },
            Err(_) => Self::Name {
                workspace: workspace.as_str(),
            },
        }
    }
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Vec<PermissionsResult>>,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct PermissionsResult {
    perms: Vec<HashMap<String, String>>,
}

/// HTTP client for the workspace authorization authority.
pub struct HttpWorkspaceAuthority {
    http_client: reqwest::Client,
    url: Url,
}

impl HttpWorkspaceAuthority {
    /// Creates a client for the workspace service at `url`.
    ///
    /// Every request is bounded by `timeout`.
    pub fn new(url: Url, timeout: Duration) -> AuthResult<Self> {
        Ok(Self {
            http_client: http_client(timeout)?,
            url,
        })
    }

    /// Endpoint this client talks to.
    pub fn url(&self) -> &Url {
        &self.url
    }
}

#[async_trait]
impl WorkspaceAuthority for HttpWorkspaceAuthority {
    async fn get_access_level(
        &self,
        caller: &CallerIdentity,
        workspace: &WorkspaceId,
    ) -> AuthResult<PermissionLevel> {
        let request = RpcRequest {
            method: GET_PERMISSIONS_METHOD,
            version: "1.1",
            id: "0",
            params: [PermissionsParams {
                workspaces: [WorkspaceIdentity::from_workspace(workspace)],
            }],
        };

        tracing::debug!(
            workspace = %workspace,
            user = %caller.user_id(),
            "Fetching workspace permissions"
        );

        let response = self
            .http_client
            .post(self.url.as_str())
            .header(reqwest::header::AUTHORIZATION, caller.token())
            .json(&request)
            .send()
            .await
            .map_err(|e| transport_error(WORKSPACE_AUTHORITY, e))?;

        if !response.status().is_success() {
            return Err(AuthError::authority_unavailable(
                WORKSPACE_AUTHORITY,
                format!("HTTP status {}", response.status().as_u16()),
            ));
        }

        let body: RpcResponse = response
            .json()
            .await
            .map_err(|e| transport_error(WORKSPACE_AUTHORITY, e))?;

        level_from_response(body, caller.user_id().as_str())
    }
}

fn level_from_response(body: RpcResponse, user: &str) -> AuthResult<PermissionLevel> {
    if let Some(error) = body.error {
        return Err(AuthError::authority_unavailable(
            WORKSPACE_AUTHORITY,
            format!("RPC error: {error}"),
        ));
    }

    let perms = body
        .result
        .and_then(|mut results| results.pop())
        .and_then(|mut result| result.perms.pop())
        .ok_or_else(|| {
            AuthError::authority_unavailable(WORKSPACE_AUTHORITY, "response has no permission table")
        })?;

    let parse = |code: &str| {
        PermissionLevel::from_code(code).map_err(|e| {
            AuthError::authority_unavailable(WORKSPACE_AUTHORITY, format!("unexpected code: {e}"))
        })
    };

    let own = perms
        .get(user)
        .map(|code| parse(code))
        .transpose()?
        .unwrap_or(PermissionLevel::None);

    // Public workspaces are readable by everyone, never writable
    let public = perms
        .get(PUBLIC_USER)
        .map(|code| parse(code))
        .transpose()?
        .unwrap_or(PermissionLevel::None)
        .min(PermissionLevel::Read);

    Ok(own.max(public))
}
