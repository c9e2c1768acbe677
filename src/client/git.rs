//! GitOps: repositories (global) and syncs (per environment).

use reqwest::Method;

use super::models::{
    GitOpsSync, GitOpsSyncCreateRequest, GitOpsSyncUpdateRequest, GitRepository,
    GitRepositoryRequest,
};
use super::{Client, EnvironmentClient};
use crate::error::ClientError;

const REPOSITORIES: &[&str] = &["api", "gitops", "repositories"];

impl Client {
    /// List git repositories.
    pub async fn list_git_repositories(&self) -> Result<Vec<GitRepository>, ClientError> {
        self.get_list(REPOSITORIES).await
    }

    /// Get a git repository by id.
    pub async fn get_git_repository(&self, id: &str) -> Result<GitRepository, ClientError> {
        self.get_one(&["api", "gitops", "repositories", id]).await
    }

    /// Register a git repository.
    pub async fn create_git_repository(
        &self,
        request: &GitRepositoryRequest,
    ) -> Result<GitRepository, ClientError> {
        self.write_one(Method::POST, REPOSITORIES, request).await
    }

    /// Update a git repository.
    pub async fn update_git_repository(
        &self,
        id: &str,
        request: &GitRepositoryRequest,
    ) -> Result<GitRepository, ClientError> {
        self.write_one(Method::PUT, &["api", "gitops", "repositories", id], request)
            .await
    }

    /// Remove a git repository.
    pub async fn delete_git_repository(&self, id: &str) -> Result<(), ClientError> {
        self.call::<()>(Method::DELETE, &["api", "gitops", "repositories", id], None)
            .await
    }
}

impl EnvironmentClient {
    /// List the environment's gitops syncs.
    pub async fn list_gitops_syncs(&self) -> Result<Vec<GitOpsSync>, ClientError> {
        self.client
            .get_list(&["api", "environments", self.environment_id.as_str(), "gitops-syncs"])
            .await
    }

    /// Get a gitops sync by id.
    pub async fn get_gitops_sync(&self, sync_id: &str) -> Result<GitOpsSync, ClientError> {
        self.client
            .get_one(&[
                "api",
                "environments",
                self.environment_id.as_str(),
                "gitops-syncs",
                sync_id,
            ])
            .await
    }

    /// Create a gitops sync.
    pub async fn create_gitops_sync(
        &self,
        request: &GitOpsSyncCreateRequest,
    ) -> Result<GitOpsSync, ClientError> {
        self.client
            .write_one(
                Method::POST,
                &["api", "environments", self.environment_id.as_str(), "gitops-syncs"],
                request,
            )
            .await
    }

    /// Update a gitops sync.
    pub async fn update_gitops_sync(
        &self,
        sync_id: &str,
        request: &GitOpsSyncUpdateRequest,
    ) -> Result<GitOpsSync, ClientError> {
        self.client
            .write_one(
                Method::PUT,
                &[
                    "api",
                    "environments",
                    self.environment_id.as_str(),
                    "gitops-syncs",
                    sync_id,
                ],
                request,
            )
            .await
    }

    /// Delete a gitops sync.
    pub async fn delete_gitops_sync(&self, sync_id: &str) -> Result<(), ClientError> {
        self.client
            .call::<()>(
                Method::DELETE,
                &[
                    "api",
                    "environments",
                    self.environment_id.as_str(),
                    "gitops-syncs",
                    sync_id,
                ],
                None,
            )
            .await
    }

    /// Run a sync now instead of waiting for the interval.
    pub async fn trigger_gitops_sync(&self, sync_id: &str) -> Result<(), ClientError> {
        self.client
            .call::<()>(
                Method::POST,
                &[
                    "api",
                    "environments",
                    self.environment_id.as_str(),
                    "gitops-syncs",
                    sync_id,
                    "trigger",
                ],
                None,
            )
            .await
    }
}
