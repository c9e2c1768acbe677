//! `arcane_container` data source

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use super::{container_value, fill, ports_attribute, DataSource, Lookup, LookupKey};
use crate::client::models::ContainerDetail;
use crate::client::{Client, EnvironmentClient};
use crate::error::{ApiError, ClientError, ProviderError};
use crate::schema::{Attribute, Diagnostic, Schema};
use crate::validation;

/// Looks up a container by id or name.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContainerDataSource;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ContainerConfig {
    environment_id: String,
    project_id: Option<String>,
    #[serde(flatten)]
    lookup: Lookup,
}

/// Search one project when `project_id` is set, otherwise every project.
async fn find_by_name(
    env: &EnvironmentClient,
    project_id: Option<&str>,
    name: &str,
) -> Result<ContainerDetail, ClientError> {
    match project_id {
        Some(project_id) => env
            .get_project_containers(project_id)
            .await?
            .into_iter()
            .find(|c| c.name == name)
            .ok_or_else(|| ApiError::not_found("container not found").into()),
        None => env.get_container_by_name(name).await,
    }
}

#[async_trait]
impl DataSource for ContainerDataSource {
    fn type_name(&self) -> &'static str {
        "arcane_container"
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_description("Look up a container by `id` or `name`.")
            .with_attribute("environment_id", Attribute::required_string())
            .with_attribute(
                "project_id",
                Attribute::optional_string().with_description("Narrows name lookups to one project."),
            )
            .with_attribute("id", Attribute::optional_computed_string())
            .with_attribute("name", Attribute::optional_computed_string())
            .with_attribute("image", Attribute::computed_string())
            .with_attribute("status", Attribute::computed_string())
            .with_attribute("health", Attribute::computed_string())
            .with_attribute("ports", ports_attribute())
    }

    fn validate(&self, config: &Value) -> Vec<Diagnostic> {
        let mut diagnostics = validation::validate(&self.schema(), config);
        diagnostics.extend(validation::require_one_of(config, &["id", "name"]));
        diagnostics
    }

    async fn read(&self, client: &Client, config: Value) -> Result<Value, ProviderError> {
        let cfg: ContainerConfig = serde_json::from_value(config.clone())?;
        let env = client.for_environment(cfg.environment_id.as_str());
        let project_id = cfg.project_id.as_deref().filter(|p| !p.is_empty());

        let container = match cfg.lookup.key("a container")? {
            LookupKey::Id(id) => env.get_container(id).await.map_err(|e| {
                ProviderError::remote(format!("read container {}/{}", cfg.environment_id, id), e)
            })?,
            LookupKey::Name(name) => find_by_name(&env, project_id, name).await.map_err(|e| {
                ProviderError::remote(
                    format!("find container named {} in environment {}", name, cfg.environment_id),
                    e,
                )
            })?,
        };

        Ok(fill(config, container_value(&container)))
    }
}
