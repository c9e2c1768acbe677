//! [`ArcaneProvider`]: the [`ProviderService`] for Arcane.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{info, instrument};

use crate::client::Client;
use crate::config::ProviderConfig;
use crate::data_sources::{self, DataSource};
use crate::deployment::{cancellation, Backoff, CancelHandle};
use crate::error::ProviderError;
use crate::resources::{self, Resource, ResourceContext};
use crate::schema::{Attribute, Diagnostic, ProviderSchema, Schema};
use crate::service::ProviderService;
use crate::types::{ImportedResource, PlanResult, ProviderMetadata, ServerCapabilities};
use crate::validation;

type EnvLookup = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Manages Arcane environments, deployments and gitops through its REST API.
///
/// Resource and data source calls fail with [`ProviderError::Configuration`]
/// until [`configure`](ProviderService::configure) has succeeded.
pub struct ArcaneProvider {
    client: RwLock<Option<Client>>,
    resources: HashMap<&'static str, Box<dyn Resource>>,
    data_sources: HashMap<&'static str, Box<dyn DataSource>>,
    cancel: CancelHandle,
    backoff: Backoff,
    env: EnvLookup,
}

impl ArcaneProvider {
    /// A provider serving every Arcane resource and data source.
    pub fn new() -> Self {
        let (cancel, _) = cancellation();
        Self {
            client: RwLock::new(None),
            resources: resources::all()
                .into_iter()
                .map(|r| (r.type_name(), r))
                .collect(),
            data_sources: data_sources::all()
                .into_iter()
                .map(|d| (d.type_name(), d))
                .collect(),
            cancel,
            backoff: Backoff::default(),
            env: Arc::new(|name| std::env::var(name).ok()),
        }
    }

    /// Override the delay schedule used while waiting for an agent.
    pub fn with_wait_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Read `ARCANE_URL` / `ARCANE_API_KEY` fallbacks through `lookup`
    /// instead of the process environment.
    pub fn with_env<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        self.env = Arc::new(lookup);
        self
    }

    /// The configured client, if any.
    pub async fn client(&self) -> Option<Client> {
        self.client.read().await.clone()
    }

    fn config_schema() -> Schema {
        Schema::v0()
            .with_attribute(
                "url",
                Attribute::optional_string().with_description(
                    "Base URL of the Arcane API. Falls back to `ARCANE_URL`.",
                ),
            )
            .with_attribute(
                "api_key",
                Attribute::optional_string()
                    .sensitive()
                    .with_description("API key. Falls back to `ARCANE_API_KEY`."),
            )
    }

    async fn context(&self) -> Result<ResourceContext, ProviderError> {
        let client = self.client().await.ok_or_else(|| {
            ProviderError::Configuration(
                "provider is not configured; call configure first".to_string(),
            )
        })?;
        Ok(ResourceContext {
            client,
            backoff: self.backoff,
            cancel: self.cancel.subscribe(),
        })
    }

    fn resource(&self, type_name: &str) -> Result<&dyn Resource, ProviderError> {
        self.resources
            .get(type_name)
            .map(|r| r.as_ref())
            .ok_or_else(|| ProviderError::UnknownResource(type_name.to_string()))
    }

    fn data_source(&self, type_name: &str) -> Result<&dyn DataSource, ProviderError> {
        self.data_sources
            .get(type_name)
            .map(|d| d.as_ref())
            .ok_or_else(|| ProviderError::UnknownResource(type_name.to_string()))
    }
}

impl Default for ArcaneProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ArcaneProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut resources: Vec<_> = self.resources.keys().collect();
        resources.sort();
        f.debug_struct("ArcaneProvider")
            .field("resources", &resources)
            .field("backoff", &self.backoff)
            .finish_non_exhaustive()
    }
}

#[async_trait::async_trait]
impl ProviderService for ArcaneProvider {
    fn schema(&self) -> ProviderSchema {
        let schema = ProviderSchema::new().with_provider_config(Self::config_schema());
        let schema = self
            .resources
            .values()
            .fold(schema, |s, r| s.with_resource(r.type_name(), r.schema()));
        self.data_sources
            .values()
            .fold(schema, |s, d| s.with_data_source(d.type_name(), d.schema()))
    }

    fn metadata(&self) -> ProviderMetadata {
        let mut resources: Vec<String> = self.resources.keys().map(|k| k.to_string()).collect();
        let mut data_sources: Vec<String> =
            self.data_sources.keys().map(|k| k.to_string()).collect();
        resources.sort();
        data_sources.sort();
        ProviderMetadata {
            resources,
            data_sources,
            capabilities: ServerCapabilities { plan_destroy: true },
        }
    }

    async fn validate_provider_config(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError> {
        Ok(validation::validate(&Self::config_schema(), &config))
    }

    #[instrument(skip_all)]
    async fn configure(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError> {
        let diagnostics = validation::validate(&Self::config_schema(), &config);
        if diagnostics.iter().any(Diagnostic::is_error) {
            return Ok(diagnostics);
        }

        let config: ProviderConfig = match config {
            Value::Null => ProviderConfig::default(),
            config => serde_json::from_value(config)?,
        };
        let env = Arc::clone(&self.env);
        let client = config
            .resolve_with(move |name| env(name))
            .and_then(|cfg| {
                Client::new(cfg).map_err(|e| ProviderError::Configuration(e.to_string()))
            });

        match client {
            Ok(client) => {
                info!(url = client.base_url(), "provider configured");
                *self.client.write().await = Some(client);
                Ok(diagnostics)
            }
            Err(err) => Ok(vec![Diagnostic::from(err).with_attribute("url")]),
        }
    }

    async fn stop(&self) -> Result<(), ProviderError> {
        info!("stopping provider, cancelling pending waits");
        self.cancel.cancel();
        Ok(())
    }

    async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        Ok(self.resource(resource_type)?.validate(&config))
    }

    async fn plan(
        &self,
        resource_type: &str,
        prior_state: Option<Value>,
        proposed_state: Value,
    ) -> Result<PlanResult, ProviderError> {
        self.resource(resource_type)?
            .plan(prior_state.as_ref(), &proposed_state)
    }

    #[instrument(skip(self, planned_state))]
    async fn create(&self, resource_type: &str, planned_state: Value) -> Result<Value, ProviderError> {
        let resource = self.resource(resource_type)?;
        let ctx = self.context().await?;
        resource.create(&ctx, planned_state).await
    }

    #[instrument(skip(self, current_state))]
    async fn read(
        &self,
        resource_type: &str,
        current_state: Value,
    ) -> Result<Option<Value>, ProviderError> {
        let resource = self.resource(resource_type)?;
        let ctx = self.context().await?;
        resource.read(&ctx, current_state).await
    }

    #[instrument(skip(self, prior_state, planned_state))]
    async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Value, ProviderError> {
        let resource = self.resource(resource_type)?;
        let ctx = self.context().await?;
        resource.update(&ctx, prior_state, planned_state).await
    }

    #[instrument(skip(self, current_state))]
    async fn delete(&self, resource_type: &str, current_state: Value) -> Result<(), ProviderError> {
        let resource = self.resource(resource_type)?;
        let ctx = self.context().await?;
        resource.delete(&ctx, current_state).await
    }

    #[instrument(skip(self))]
    async fn import_resource(
        &self,
        resource_type: &str,
        id: &str,
    ) -> Result<Vec<ImportedResource>, ProviderError> {
        let resource = self.resource(resource_type)?;
        let ctx = self.context().await?;
        let state = resource.import(&ctx, id).await?;
        Ok(vec![ImportedResource::new(resource_type, state)])
    }

    async fn validate_data_source_config(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        Ok(self.data_source(data_source_type)?.validate(&config))
    }

    #[instrument(skip(self, config))]
    async fn read_data_source(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Value, ProviderError> {
        let data_source = self.data_source(data_source_type)?;
        let ctx = self.context().await?;
        data_source.read(&ctx.client, config).await
    }
}
