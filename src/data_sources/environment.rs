//! `arcane_environment` data source

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{fill, DataSource, Lookup, LookupKey};
use crate::client::Client;
use crate::error::ProviderError;
use crate::resources::non_empty;
use crate::schema::{Attribute, Diagnostic, Schema};
use crate::validation;

/// Looks up an environment by id or name.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvironmentDataSource;

#[async_trait]
impl DataSource for EnvironmentDataSource {
    fn type_name(&self) -> &'static str {
        "arcane_environment"
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_description("Look up an existing environment by `id` or `name`.")
            .with_attribute("id", Attribute::optional_computed_string())
            .with_attribute("name", Attribute::optional_computed_string())
            .with_attribute("api_url", Attribute::computed_string())
            .with_attribute("description", Attribute::computed_string())
            .with_attribute("use_api_key", Attribute::computed_bool())
    }

    fn validate(&self, config: &Value) -> Vec<Diagnostic> {
        let mut diagnostics = validation::validate(&self.schema(), config);
        diagnostics.extend(validation::require_one_of(config, &["id", "name"]));
        diagnostics
    }

    async fn read(&self, client: &Client, config: Value) -> Result<Value, ProviderError> {
        let lookup: Lookup = serde_json::from_value(config.clone())?;
        let env = match lookup.key("an environment")? {
            LookupKey::Id(id) => client
                .get_environment(id)
                .await
                .map_err(|e| ProviderError::remote(format!("read environment {}", id), e))?,
            LookupKey::Name(name) => client
                .get_environment_by_name(name)
                .await
                .map_err(|e| ProviderError::remote(format!("find environment named {}", name), e))?,
        };

        Ok(fill(
            config,
            json!({
                "id": env.id,
                "name": env.name,
                "api_url": non_empty(&env.api_url),
                "description": non_empty(&env.description),
                "use_api_key": env.use_api_key,
            }),
        ))
    }
}
