//! `arcane_container_registry`

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use super::{decode, deleted, encode, non_empty, Resource, ResourceContext};
use crate::client::models::{ContainerRegistry, ContainerRegistryRequest};
use crate::error::ProviderError;
use crate::schema::{Attribute, Schema};

/// Registry credentials Arcane uses when pulling images.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContainerRegistryResource;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
struct RegistryState {
    id: Option<String>,
    name: String,
    url: String,
    auth_type: Option<String>,
    username: Option<String>,
    /// Never returned by the backend; kept from plan or prior state.
    password: Option<String>,
}

impl RegistryState {
    fn request(&self) -> ContainerRegistryRequest {
        ContainerRegistryRequest {
            name: self.name.clone(),
            url: self.url.clone(),
            auth_type: self.auth_type.clone().unwrap_or_default(),
            username: self.username.clone().unwrap_or_default(),
            password: self.password.clone().unwrap_or_default(),
        }
    }

    fn refresh(&mut self, registry: &ContainerRegistry) {
        self.id = Some(registry.id.clone());
        self.name = registry.name.clone();
        self.url = registry.url.clone();
        self.auth_type = non_empty(&registry.auth_type);
        self.username = non_empty(&registry.username);
    }
}

#[async_trait]
impl Resource for ContainerRegistryResource {
    fn type_name(&self) -> &'static str {
        "arcane_container_registry"
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_description("A container registry and the credentials to pull from it.")
            .with_attribute("id", Attribute::computed_string())
            .with_attribute("name", Attribute::required_string())
            .with_attribute(
                "url",
                Attribute::required_string().with_description("Registry URL, e.g. `ghcr.io`."),
            )
            .with_attribute("auth_type", Attribute::optional_string())
            .with_attribute("username", Attribute::optional_string())
            .with_attribute(
                "password",
                Attribute::optional_string()
                    .sensitive()
                    .with_description("Write-only; the API never returns it."),
            )
    }

    async fn create(&self, ctx: &ResourceContext, planned: Value) -> Result<Value, ProviderError> {
        let mut state: RegistryState = decode(planned)?;
        let registry = ctx
            .client
            .create_container_registry(&state.request())
            .await
            .map_err(|e| {
                ProviderError::remote(format!("create container registry {}", state.name), e)
            })?;
        info!(id = %registry.id, url = %registry.url, "container registry created");

        state.refresh(&registry);
        encode(&state)
    }

    async fn read(
        &self,
        ctx: &ResourceContext,
        current: Value,
    ) -> Result<Option<Value>, ProviderError> {
        let mut state: RegistryState = decode(current)?;
        let Some(id) = state.id.clone() else {
            return Ok(None);
        };

        match ctx.client.get_container_registry(&id).await {
            Ok(registry) => {
                state.refresh(&registry);
                encode(&state).map(Some)
            }
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(ProviderError::remote(
                format!("read container registry {}", id),
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
        let prior: RegistryState = decode(prior)?;
        let mut state: RegistryState = decode(planned)?;
        let id = prior.id.ok_or_else(|| {
            ProviderError::InvalidRequest("container registry state has no id".into())
        })?;

        let registry = ctx
            .client
            .update_container_registry(&id, &state.request())
            .await
            .map_err(|e| ProviderError::remote(format!("update container registry {}", id), e))?;

        state.refresh(&registry);
        encode(&state)
    }

    async fn delete(&self, ctx: &ResourceContext, current: Value) -> Result<(), ProviderError> {
        let state: RegistryState = decode(current)?;
        let Some(id) = state.id else {
            return Ok(());
        };
        deleted(
            format!("delete container registry {}", id),
            ctx.client.delete_container_registry(&id).await,
        )
    }

    async fn import(&self, ctx: &ResourceContext, id: &str) -> Result<Value, ProviderError> {
        let registry = ctx
            .client
            .get_container_registry(id)
            .await
            .map_err(|e| ProviderError::remote(format!("import container registry {}", id), e))?;

        let mut state = RegistryState::default();
        state.refresh(&registry);
        encode(&state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_refresh_keeps_password() {
        let mut state: RegistryState = decode(json!({
            "name": "ghcr",
            "url": "ghcr.io",
            "username": "bot",
            "password": "s3cret"
        }))
        .unwrap();

        state.refresh(&ContainerRegistry {
            id: "reg-1".into(),
            name: "ghcr".into(),
            url: "ghcr.io".into(),
            ..Default::default()
        });

        let value = encode(&state).unwrap();
        assert_eq!(value["id"], "reg-1");
        assert_eq!(value["password"], "s3cret");
        assert!(value["username"].is_null());
    }

    #[test]
    fn test_request_omits_unset() {
        let state: RegistryState =
            decode(json!({"name": "hub", "url": "docker.io"})).unwrap();
        let body = serde_json::to_value(state.request()).unwrap();
        assert_eq!(body, json!({"name": "hub", "url": "docker.io"}));
    }

    #[test]
    fn test_password_is_sensitive() {
        let schema = ContainerRegistryResource.schema();
        assert!(schema.attribute("password").unwrap().flags.sensitive);
        assert!(!schema.attribute("username").unwrap().flags.sensitive);
    }
}
