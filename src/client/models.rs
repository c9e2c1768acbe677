//! Wire types for the Arcane API.
//!
//! Field names follow the backend's JSON exactly, which mixes `snake_case`
//! and `camelCase` (`apiUrl`, `apiKey`).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

fn is_false(b: &bool) -> bool {
    !*b
}

/// An Arcane environment: one Docker host reached through its agent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Environment {
    pub id: String,
    pub name: String,
    #[serde(rename = "apiUrl", skip_serializing_if = "String::is_empty")]
    pub api_url: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    pub use_api_key: bool,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub access_token: String,
    /// Only present in the response to an API key regeneration.
    #[serde(rename = "apiKey", skip_serializing_if = "String::is_empty")]
    pub api_key: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub created_at: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub updated_at: String,
}

impl Environment {
    /// The agent token to store after a key regeneration.
    ///
    /// The regenerate response carries the new key in `apiKey`; older
    /// backends only echo `access_token`.
    pub fn issued_token(&self) -> Option<&str> {
        [self.api_key.as_str(), self.access_token.as_str()]
            .into_iter()
            .find(|t| !t.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnvironmentCreateRequest {
    pub name: String,
    #[serde(rename = "apiUrl")]
    pub api_url: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(skip_serializing_if = "is_false")]
    pub use_api_key: bool,
}

/// Partial update; unset fields are left alone by the backend.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EnvironmentUpdateRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub use_api_key: Option<bool>,
}

impl EnvironmentUpdateRequest {
    /// Whether there is anything to send.
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.description.is_none() && self.use_api_key.is_none()
    }
}

/// A compose project deployed in an environment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Project {
    pub id: String,
    pub name: String,
    pub status: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub path: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub services: Vec<ProjectService>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub environment_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectService {
    pub name: String,
    pub status: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub image: String,
}

/// Flags for `up` and `redeploy`. Also the request body of both calls.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct DeployOptions {
    /// Pull images before starting.
    #[serde(skip_serializing_if = "is_false")]
    pub pull: bool,
    /// Recreate containers even when their config is unchanged.
    #[serde(skip_serializing_if = "is_false")]
    pub force_recreate: bool,
    /// Remove containers for services no longer in the compose file.
    #[serde(skip_serializing_if = "is_false")]
    pub remove_orphans: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerDetail {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub image: String,
    pub status: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub health: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<ContainerPort>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerPort {
    pub host_port: i64,
    pub container_port: i64,
    pub protocol: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerRegistry {
    pub id: String,
    pub name: String,
    pub url: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub auth_type: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub username: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub password: String,
}

/// Body for creating or updating a registry. Empty optional fields are omitted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ContainerRegistryRequest {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub url: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub auth_type: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub username: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub password: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GitRepository {
    pub id: String,
    pub name: String,
    pub url: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub branch: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub auth_type: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub credentials: String,
}

/// Body for creating or updating a git repository.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GitRepositoryRequest {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub url: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub branch: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub auth_type: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub credentials: String,
}

/// Links a git repository path to an environment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GitOpsSync {
    pub id: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub environment_id: String,
    pub repository_id: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub path: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub branch: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub compose_file: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub sync_interval: String,
    pub auto_sync: bool,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub last_sync_at: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub last_sync_commit: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GitOpsSyncCreateRequest {
    pub repository_id: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub path: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub branch: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub compose_file: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub sync_interval: String,
    #[serde(skip_serializing_if = "is_false")]
    pub auto_sync: bool,
}

/// Partial update of a sync. `auto_sync` is explicit so `false` can be sent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GitOpsSyncUpdateRequest {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub repository_id: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub path: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub branch: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub compose_file: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub sync_interval: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_sync: Option<bool>,
}
