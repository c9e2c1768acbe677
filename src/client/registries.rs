//! `/api/container-registries`

use reqwest::Method;

use super::models::{ContainerRegistry, ContainerRegistryRequest};
use super::Client;
use crate::error::ClientError;

const REGISTRIES: &[&str] = &["api", "container-registries"];

impl Client {
    /// List registry credentials known to Arcane.
    pub async fn list_container_registries(&self) -> Result<Vec<ContainerRegistry>, ClientError> {
        self.get_list(REGISTRIES).await
    }

    /// Get a registry by id.
    pub async fn get_container_registry(&self, id: &str) -> Result<ContainerRegistry, ClientError> {
        self.get_one(&["api", "container-registries", id]).await
    }

    /// Register a container registry.
    pub async fn create_container_registry(
        &self,
        request: &ContainerRegistryRequest,
    ) -> Result<ContainerRegistry, ClientError> {
        self.write_one(Method::POST, REGISTRIES, request).await
    }

    /// Update a registry. Empty fields in `request` are not sent.
    pub async fn update_container_registry(
        &self,
        id: &str,
        request: &ContainerRegistryRequest,
    ) -> Result<ContainerRegistry, ClientError> {
        self.write_one(Method::PUT, &["api", "container-registries", id], request)
            .await
    }

    /// Remove a registry.
    pub async fn delete_container_registry(&self, id: &str) -> Result<(), ClientError> {
        self.call::<()>(Method::DELETE, &["api", "container-registries", id], None)
            .await
    }
}
