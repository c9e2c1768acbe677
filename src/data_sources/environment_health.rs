//! `arcane_environment_health` data source

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use super::{fill, DataSource};
use crate::client::Client;
use crate::error::ProviderError;
use crate::schema::{Attribute, Schema};

/// Whether Arcane can reach an environment's agent.
///
/// A failed connectivity test is reported through `is_connected` and
/// `error_message`, not as an error.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvironmentHealthDataSource;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct HealthConfig {
    environment_id: String,
}

#[async_trait]
impl DataSource for EnvironmentHealthDataSource {
    fn type_name(&self) -> &'static str {
        "arcane_environment_health"
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_description("Connectivity between Arcane and an environment's agent.")
            .with_attribute("environment_id", Attribute::required_string())
            .with_attribute("is_connected", Attribute::computed_bool())
            .with_attribute("error_message", Attribute::computed_string())
    }

    async fn read(&self, client: &Client, config: Value) -> Result<Value, ProviderError> {
        let cfg: HealthConfig = serde_json::from_value(config.clone())?;

        let health = match client.test_environment(&cfg.environment_id).await {
            Ok(()) => json!({"is_connected": true, "error_message": ""}),
            Err(err) => {
                debug!(environment = %cfg.environment_id, error = %err, "environment unreachable");
                json!({"is_connected": false, "error_message": err.to_string()})
            }
        };
        Ok(fill(config, health))
    }
}
