//! `arcane_project` data source

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{fill, DataSource, Lookup, LookupKey};
use crate::client::Client;
use crate::error::ProviderError;
use crate::resources::non_empty;
use crate::schema::{Attribute, AttributeFlags, AttributeType, Diagnostic, Schema};
use crate::validation;

/// Looks up a project in an environment by id or name.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProjectDataSource;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ProjectConfig {
    environment_id: String,
    #[serde(flatten)]
    lookup: Lookup,
}

#[async_trait]
impl DataSource for ProjectDataSource {
    fn type_name(&self) -> &'static str {
        "arcane_project"
    }

    fn schema(&self) -> Schema {
        let service = AttributeType::object([
            ("name", AttributeType::String),
            ("status", AttributeType::String),
            ("image", AttributeType::String),
        ]);

        Schema::v0()
            .with_description("Look up a project by `id` or `name` within an environment.")
            .with_attribute("environment_id", Attribute::required_string())
            .with_attribute("id", Attribute::optional_computed_string())
            .with_attribute("name", Attribute::optional_computed_string())
            .with_attribute("status", Attribute::computed_string())
            .with_attribute("path", Attribute::computed_string())
            .with_attribute(
                "services",
                Attribute::new(AttributeType::list(service), AttributeFlags::computed()),
            )
    }

    fn validate(&self, config: &Value) -> Vec<Diagnostic> {
        let mut diagnostics = validation::validate(&self.schema(), config);
        diagnostics.extend(validation::require_one_of(config, &["id", "name"]));
        diagnostics
    }

    async fn read(&self, client: &Client, config: Value) -> Result<Value, ProviderError> {
        let cfg: ProjectConfig = serde_json::from_value(config.clone())?;
        let env = client.for_environment(cfg.environment_id.as_str());

        let project = match cfg.lookup.key("a project")? {
            LookupKey::Id(id) => env.get_project(id).await.map_err(|e| {
                ProviderError::remote(
                    format!("read project {}/{}", cfg.environment_id, id),
                    e,
                )
            })?,
            LookupKey::Name(name) => env.get_project_by_name(name).await.map_err(|e| {
                ProviderError::remote(
                    format!("find project named {} in environment {}", name, cfg.environment_id),
                    e,
                )
            })?,
        };

        let services: Vec<Value> = project
            .services
            .iter()
            .map(|s| json!({"name": s.name, "status": s.status, "image": s.image}))
            .collect();

        Ok(fill(
            config,
            json!({
                "id": project.id,
                "name": project.name,
                "status": project.status,
                "path": non_empty(&project.path),
                "services": services,
            }),
        ))
    }
}
