//! `arcane_gitops_sync`

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

use super::{decode, deleted, encode, non_empty, split_import_id, Resource, ResourceContext};
use crate::client::models::{GitOpsSync, GitOpsSyncCreateRequest, GitOpsSyncUpdateRequest};
use crate::error::ProviderError;
use crate::schema::{Attribute, Schema};

const DEFAULT_COMPOSE_FILE: &str = "docker-compose.yml";

/// Keeps an environment's projects in step with a path in a git repository.
#[derive(Debug, Clone, Copy, Default)]
pub struct GitOpsSyncResource;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
struct SyncState {
    id: Option<String>,
    environment_id: String,
    repository_id: String,
    path: Option<String>,
    branch: Option<String>,
    compose_file: Option<String>,
    sync_interval: Option<String>,
    auto_sync: bool,
    last_sync_at: Option<String>,
    last_sync_commit: Option<String>,
}

impl SyncState {
    fn refresh(&mut self, sync: &GitOpsSync) {
        self.id = Some(sync.id.clone());
        if !sync.repository_id.is_empty() {
            self.repository_id = sync.repository_id.clone();
        }
        for (field, remote) in [
            (&mut self.path, &sync.path),
            (&mut self.branch, &sync.branch),
            (&mut self.compose_file, &sync.compose_file),
            (&mut self.sync_interval, &sync.sync_interval),
        ] {
            if let Some(value) = non_empty(remote) {
                *field = Some(value);
            }
        }
        self.auto_sync = sync.auto_sync;
        self.last_sync_at = non_empty(&sync.last_sync_at);
        self.last_sync_commit = non_empty(&sync.last_sync_commit);
    }
}

#[async_trait]
impl Resource for GitOpsSyncResource {
    fn type_name(&self) -> &'static str {
        "arcane_gitops_sync"
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_description("Syncs compose projects from a git repository into an environment.")
            .with_attribute("id", Attribute::computed_string())
            .with_attribute(
                "environment_id",
                Attribute::required_string().with_force_new(),
            )
            .with_attribute("repository_id", Attribute::required_string())
            .with_attribute(
                "path",
                Attribute::optional_string().with_description("Directory within the repository."),
            )
            .with_attribute(
                "branch",
                Attribute::optional_computed_string()
                    .with_description("Defaults to the repository's default branch."),
            )
            .with_attribute(
                "compose_file",
                Attribute::optional_computed_string().with_default(json!(DEFAULT_COMPOSE_FILE)),
            )
            .with_attribute(
                "sync_interval",
                Attribute::optional_string().with_description("e.g. `5m`."),
            )
            .with_attribute("auto_sync", Attribute::optional_bool(false))
            .with_attribute("last_sync_at", Attribute::computed_string())
            .with_attribute("last_sync_commit", Attribute::computed_string())
    }

    async fn create(&self, ctx: &ResourceContext, planned: Value) -> Result<Value, ProviderError> {
        let mut state: SyncState = decode(planned)?;
        let request = GitOpsSyncCreateRequest {
            repository_id: state.repository_id.clone(),
            path: state.path.clone().unwrap_or_default(),
            branch: state.branch.clone().unwrap_or_default(),
            compose_file: state.compose_file.clone().unwrap_or_default(),
            sync_interval: state.sync_interval.clone().unwrap_or_default(),
            auto_sync: state.auto_sync,
        };

        let sync = ctx
            .client
            .for_environment(state.environment_id.as_str())
            .create_gitops_sync(&request)
            .await
            .map_err(|e| {
                ProviderError::remote(
                    format!("create gitops sync in environment {}", state.environment_id),
                    e,
                )
            })?;
        info!(id = %sync.id, environment = %state.environment_id, "gitops sync created");

        state.refresh(&sync);
        encode(&state)
    }

    async fn read(
        &self,
        ctx: &ResourceContext,
        current: Value,
    ) -> Result<Option<Value>, ProviderError> {
        let mut state: SyncState = decode(current)?;
        let Some(id) = state.id.clone() else {
            return Ok(None);
        };

        let result = ctx
            .client
            .for_environment(state.environment_id.as_str())
            .get_gitops_sync(&id)
            .await;
        match result {
            Ok(sync) => {
                state.refresh(&sync);
                encode(&state).map(Some)
            }
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(ProviderError::remote(
                format!("read gitops sync {}/{}", state.environment_id, id),
                err,
            )),
        }
    }

    async fn update(
        &self,
        ctx: &ResourceContext,
        prior: Value,
        planned: Value,
    ) -> Result<Value, ProviderError> {
        let prior: SyncState = decode(prior)?;
        let mut state: SyncState = decode(planned)?;
        let id = prior
            .id
            .ok_or_else(|| ProviderError::InvalidRequest("gitops sync state has no id".into()))?;

        let request = GitOpsSyncUpdateRequest {
            repository_id: state.repository_id.clone(),
            path: state.path.clone().unwrap_or_default(),
            branch: state.branch.clone().unwrap_or_default(),
            compose_file: state.compose_file.clone().unwrap_or_default(),
            sync_interval: state.sync_interval.clone().unwrap_or_default(),
            auto_sync: Some(state.auto_sync),
        };
        let sync = ctx
            .client
            .for_environment(state.environment_id.as_str())
            .update_gitops_sync(&id, &request)
            .await
            .map_err(|e| {
                ProviderError::remote(
                    format!("update gitops sync {}/{}", state.environment_id, id),
                    e,
                )
            })?;

        state.refresh(&sync);
        encode(&state)
    }

    async fn delete(&self, ctx: &ResourceContext, current: Value) -> Result<(), ProviderError> {
        let state: SyncState = decode(current)?;
        let Some(id) = state.id else {
            return Ok(());
        };
        deleted(
            format!("delete gitops sync {}/{}", state.environment_id, id),
            ctx.client
                .for_environment(state.environment_id.as_str())
                .delete_gitops_sync(&id)
                .await,
        )
    }

    async fn import(&self, ctx: &ResourceContext, id: &str) -> Result<Value, ProviderError> {
        let (environment_id, sync_id) = split_import_id(id, "environment_id/sync_id")?;
        let sync = ctx
            .client
            .for_environment(environment_id)
            .get_gitops_sync(sync_id)
            .await
            .map_err(|e| ProviderError::remote(format!("import gitops sync {}", id), e))?;

        let mut state = SyncState {
            environment_id: environment_id.to_string(),
            ..Default::default()
        };
        state.refresh(&sync);
        encode(&state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_defaults() {
        let plan = GitOpsSyncResource
            .plan(None, &json!({"environment_id": "env-1", "repository_id": "repo-1"}))
            .unwrap();
        assert_eq!(plan.planned_state["compose_file"], DEFAULT_COMPOSE_FILE);
        assert_eq!(plan.planned_state["auto_sync"], false);
        assert!(plan.planned_state["last_sync_at"].is_null());
    }

    #[test]
    fn test_environment_change_replaces() {
        let prior = json!({
            "id": "sync-1",
            "environment_id": "env-1",
            "repository_id": "repo-1",
            "compose_file": "docker-compose.yml",
            "auto_sync": false
        });
        let plan = GitOpsSyncResource
            .plan(
                Some(&prior),
                &json!({"environment_id": "env-2", "repository_id": "repo-1"}),
            )
            .unwrap();
        assert!(plan.requires_replace);
    }

    #[test]
    fn test_refresh_clears_sync_markers() {
        let mut state = SyncState {
            id: Some("sync-1".into()),
            environment_id: "env-1".into(),
            repository_id: "repo-1".into(),
            path: Some("stacks/web".into()),
            last_sync_at: Some("2024-05-01T00:00:00Z".into()),
            ..Default::default()
        };
        state.refresh(&GitOpsSync {
            id: "sync-1".into(),
            repository_id: "repo-1".into(),
            branch: "main".into(),
            auto_sync: true,
            ..Default::default()
        });

        assert_eq!(state.path.as_deref(), Some("stacks/web"));
        assert_eq!(state.branch.as_deref(), Some("main"));
        assert!(state.auto_sync);
        assert!(state.last_sync_at.is_none());
    }
}
