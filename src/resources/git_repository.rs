//! `arcane_git_repository`

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use super::{decode, deleted, encode, non_empty, Resource, ResourceContext};
use crate::client::models::{GitRepository, GitRepositoryRequest};
use crate::error::ProviderError;
use crate::schema::{Attribute, Schema};

/// A git repository that gitops syncs pull compose files from.
#[derive(Debug, Clone, Copy, Default)]
pub struct GitRepositoryResource;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
struct RepositoryState {
    id: Option<String>,
    name: String,
    url: String,
    branch: Option<String>,
    auth_type: Option<String>,
    credentials: Option<String>,
}

impl RepositoryState {
    fn request(&self) -> GitRepositoryRequest {
        GitRepositoryRequest {
            name: self.name.clone(),
            url: self.url.clone(),
            branch: self.branch.clone().unwrap_or_default(),
            auth_type: self.auth_type.clone().unwrap_or_default(),
            credentials: self.credentials.clone().unwrap_or_default(),
        }
    }

    /// Credentials are write-only and stay as configured.
    fn refresh(&mut self, repo: &GitRepository) {
        self.id = Some(repo.id.clone());
        self.name = repo.name.clone();
        self.url = repo.url.clone();
        if let Some(branch) = non_empty(&repo.branch) {
            self.branch = Some(branch);
        }
        self.auth_type = non_empty(&repo.auth_type);
    }
}

#[async_trait]
impl Resource for GitRepositoryResource {
    fn type_name(&self) -> &'static str {
        "arcane_git_repository"
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_description("A git repository registered for gitops.")
            .with_attribute("id", Attribute::computed_string())
            .with_attribute("name", Attribute::required_string())
            .with_attribute("url", Attribute::required_string())
            .with_attribute(
                "branch",
                Attribute::optional_computed_string()
                    .with_description("Defaults to the repository's default branch."),
            )
            .with_attribute(
                "auth_type",
                Attribute::optional_string().with_description("`none`, `http` or `ssh`."),
            )
            .with_attribute(
                "credentials",
                Attribute::optional_string()
                    .sensitive()
                    .with_description("Token or private key. Write-only."),
            )
    }

    async fn create(&self, ctx: &ResourceContext, planned: Value) -> Result<Value, ProviderError> {
        let mut state: RepositoryState = decode(planned)?;
        let repo = ctx
            .client
            .create_git_repository(&state.request())
            .await
            .map_err(|e| ProviderError::remote(format!("create git repository {}", state.name), e))?;
        info!(id = %repo.id, url = %repo.url, "git repository created");

        state.refresh(&repo);
        encode(&state)
    }

    async fn read(
        &self,
        ctx: &ResourceContext,
        current: Value,
    ) -> Result<Option<Value>, ProviderError> {
        let mut state: RepositoryState = decode(current)?;
        let Some(id) = state.id.clone() else {
            return Ok(None);
        };

        match ctx.client.get_git_repository(&id).await {
            Ok(repo) => {
                state.refresh(&repo);
                encode(&state).map(Some)
            }
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(ProviderError::remote(format!("read git repository {}", id), err)),
        }
    }

    async fn update(
        &self,
        ctx: &ResourceContext,
        prior: Value,
        planned: Value,
    ) -> Result<Value, ProviderError> {
        let prior: RepositoryState = decode(prior)?;
        let mut state: RepositoryState = decode(planned)?;
        let id = prior.id.ok_or_else(|| {
            ProviderError::InvalidRequest("git repository state has no id".into())
        })?;

        let repo = ctx
            .client
            .update_git_repository(&id, &state.request())
            .await
            .map_err(|e| ProviderError::remote(format!("update git repository {}", id), e))?;

        state.refresh(&repo);
        encode(&state)
    }

    async fn delete(&self, ctx: &ResourceContext, current: Value) -> Result<(), ProviderError> {
        let state: RepositoryState = decode(current)?;
        match state.id {
            Some(id) => deleted(
                format!("delete git repository {}", id),
                ctx.client.delete_git_repository(&id).await,
            ),
            None => Ok(()),
        }
    }

    async fn import(&self, ctx: &ResourceContext, id: &str) -> Result<Value, ProviderError> {
        let repo = ctx
            .client
            .get_git_repository(id)
            .await
            .map_err(|e| ProviderError::remote(format!("import git repository {}", id), e))?;

        let mut state = RepositoryState::default();
        state.refresh(&repo);
        encode(&state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_branch_is_filled_in_by_backend() {
        let mut state: RepositoryState = decode(json!({
            "name": "infra",
            "url": "https://github.com/acme/infra.git",
            "auth_type": "http",
            "credentials": "ghp_token"
        }))
        .unwrap();

        state.refresh(&GitRepository {
            id: "repo-1".into(),
            name: "infra".into(),
            url: "https://github.com/acme/infra.git".into(),
            branch: "main".into(),
            auth_type: "http".into(),
            ..Default::default()
        });

        assert_eq!(state.branch.as_deref(), Some("main"));
        assert_eq!(state.credentials.as_deref(), Some("ghp_token"));
    }

    #[test]
    fn test_plan_keeps_computed_branch() {
        let prior = json!({
            "id": "repo-1",
            "name": "infra",
            "url": "https://github.com/acme/infra.git",
            "branch": "main",
            "auth_type": null,
            "credentials": null
        });
        let plan = GitRepositoryResource
            .plan(
                Some(&prior),
                &json!({"name": "infra", "url": "https://github.com/acme/infra.git"}),
            )
            .unwrap();
        assert!(!plan.has_changes());
        assert_eq!(plan.planned_state["branch"], "main");
    }
}
