//! `/api/environments`

use reqwest::Method;
use serde_json::json;

use super::models::{Environment, EnvironmentCreateRequest, EnvironmentUpdateRequest};
use super::Client;
use crate::error::{ApiError, ClientError};

const ENVIRONMENTS: &[&str] = &["api", "environments"];

impl Client {
    /// List all environments.
    pub async fn list_environments(&self) -> Result<Vec<Environment>, ClientError> {
        self.get_list(ENVIRONMENTS).await
    }

    /// Get an environment by id.
    pub async fn get_environment(&self, id: &str) -> Result<Environment, ClientError> {
        self.get_one(&["api", "environments", id]).await
    }

    /// Find an environment by exact name. Missing names report a 404.
    pub async fn get_environment_by_name(&self, name: &str) -> Result<Environment, ClientError> {
        self.list_environments()
            .await?
            .into_iter()
            .find(|env| env.name == name)
            .ok_or_else(|| ApiError::not_found("environment not found").into())
    }

    /// Create an environment.
    pub async fn create_environment(
        &self,
        request: &EnvironmentCreateRequest,
    ) -> Result<Environment, ClientError> {
        self.write_one(Method::POST, ENVIRONMENTS, request).await
    }

    /// Update the fields set in `request`.
    pub async fn update_environment(
        &self,
        id: &str,
        request: &EnvironmentUpdateRequest,
    ) -> Result<Environment, ClientError> {
        self.write_one(Method::PUT, &["api", "environments", id], request)
            .await
    }

    /// Delete an environment.
    pub async fn delete_environment(&self, id: &str) -> Result<(), ClientError> {
        self.call::<()>(Method::DELETE, &["api", "environments", id], None)
            .await
    }

    /// Issue a new agent API key. The key is in [`Environment::issued_token`].
    pub async fn regenerate_environment_api_key(&self, id: &str) -> Result<Environment, ClientError> {
        self.write_one(
            Method::PUT,
            &["api", "environments", id],
            &json!({ "regenerateApiKey": true }),
        )
        .await
    }

    /// Ask the backend to contact the environment's agent.
    pub async fn test_environment(&self, id: &str) -> Result<(), ClientError> {
        self.call::<()>(Method::POST, &["api", "environments", id, "test"], None)
            .await
    }
}
