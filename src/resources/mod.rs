//! Managed resource types.
//!
//! Each resource maps onto one Arcane endpoint family. State is a JSON object
//! keyed by attribute name; every resource decodes it into a typed struct at
//! the boundary and encodes the result back.

mod container_registry;
mod environment;
mod git_repository;
mod gitops_sync;
mod project_deployment;

pub use container_registry::ContainerRegistryResource;
pub use environment::EnvironmentResource;
pub use git_repository::GitRepositoryResource;
pub use gitops_sync::GitOpsSyncResource;
pub use project_deployment::ProjectDeploymentResource;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};

use crate::client::Client;
use crate::deployment::{Backoff, CancelSignal, Deployer};
use crate::error::{ClientError, ProviderError};
use crate::schema::{Diagnostic, Schema};
use crate::types::{AttributeChange, PlanResult};
use crate::validation;

/// What a resource operation gets from the configured provider.
#[derive(Debug, Clone)]
pub struct ResourceContext {
    /// Configured backend client.
    pub client: Client,
    /// Delay schedule for reachability waits.
    pub backoff: Backoff,
    /// Fires when the provider is stopped.
    pub cancel: CancelSignal,
}

impl ResourceContext {
    /// A context with the default backoff and no cancellation.
    pub fn new(client: Client) -> Self {
        Self {
            client,
            backoff: Backoff::default(),
            cancel: CancelSignal::never(),
        }
    }

    /// A deployer sharing this context's client and cancel signal.
    pub fn deployer(&self) -> Deployer<Client> {
        Deployer::new(self.client.clone())
            .with_backoff(self.backoff)
            .with_cancel(self.cancel.clone())
    }
}

/// A resource type managed by the provider.
#[async_trait]
pub trait Resource: Send + Sync {
    /// Full type name, e.g. `arcane_environment`.
    fn type_name(&self) -> &'static str;

    /// Attribute schema.
    fn schema(&self) -> Schema;

    /// Check configuration before planning.
    fn validate(&self, config: &Value) -> Vec<Diagnostic> {
        validation::validate(&self.schema(), config)
    }

    /// Compute the planned state. See [`plan_with_schema`].
    fn plan(&self, prior: Option<&Value>, proposed: &Value) -> Result<PlanResult, ProviderError> {
        plan_with_schema(&self.schema(), prior, proposed)
    }

    /// Create the remote object and return the new state.
    async fn create(&self, ctx: &ResourceContext, planned: Value) -> Result<Value, ProviderError>;

    /// Refresh state. `None` removes the resource from state.
    async fn read(&self, ctx: &ResourceContext, current: Value)
        -> Result<Option<Value>, ProviderError>;

    /// Apply a planned in-place change.
    async fn update(
        &self,
        ctx: &ResourceContext,
        prior: Value,
        planned: Value,
    ) -> Result<Value, ProviderError>;

    /// Delete the remote object. Already-gone objects are not an error.
    async fn delete(&self, ctx: &ResourceContext, current: Value) -> Result<(), ProviderError>;

    /// Build state for an existing remote object from its import id.
    async fn import(&self, ctx: &ResourceContext, id: &str) -> Result<Value, ProviderError>;
}

/// All resources served by the provider.
pub fn all() -> Vec<Box<dyn Resource>> {
    vec![
        Box::new(EnvironmentResource),
        Box::new(ProjectDeploymentResource),
        Box::new(ContainerRegistryResource),
        Box::new(GitRepositoryResource),
        Box::new(GitOpsSyncResource),
    ]
}

/// Schema-driven planning shared by all resources.
///
/// - a `null` proposed state plans a destroy
/// - unset configurable attributes take their schema default, or the prior
///   value when the provider may compute them
/// - computed-only attributes carry over from prior state, and are `null`
///   (known after apply) on create or replacement
/// - a change to a `force_new` attribute requires replacement
pub fn plan_with_schema(
    schema: &Schema,
    prior: Option<&Value>,
    proposed: &Value,
) -> Result<PlanResult, ProviderError> {
    let prior = prior.filter(|p| !p.is_null());

    if proposed.is_null() {
        return Ok(match prior {
            None => PlanResult::no_change(Value::Null),
            Some(prior) => {
                let changes = sorted_names(schema)
                    .into_iter()
                    .filter_map(|name| AttributeChange::between(name, prior.get(name), None))
                    .collect();
                PlanResult::with_changes(Value::Null, changes, false)
            }
        });
    }

    let proposed = proposed.as_object().ok_or_else(|| {
        ProviderError::Validation("proposed state must be an object".to_string())
    })?;

    let mut planned = Map::new();
    let mut changes = Vec::new();
    let mut requires_replace = false;

    for name in sorted_names(schema) {
        let attr = &schema.block.attributes[name];
        let prior_value = prior.and_then(|p| p.get(name)).filter(|v| !v.is_null());

        if attr.flags.is_computed_only() {
            planned.insert(name.to_string(), prior_value.cloned().unwrap_or(Value::Null));
            continue;
        }

        let value = proposed
            .get(name)
            .filter(|v| !v.is_null())
            .cloned()
            .or_else(|| attr.default.clone())
            .or_else(|| prior_value.filter(|_| attr.flags.computed).cloned())
            .unwrap_or(Value::Null);

        if let Some(change) = AttributeChange::between(name, prior_value, Some(&value)) {
            if prior.is_some() && attr.force_new {
                requires_replace = true;
            }
            changes.push(change);
        }
        planned.insert(name.to_string(), value);
    }

    if requires_replace {
        for (name, attr) in &schema.block.attributes {
            if attr.flags.is_computed_only() {
                planned.insert(name.clone(), Value::Null);
            }
        }
    }

    Ok(PlanResult::with_changes(
        Value::Object(planned),
        changes,
        requires_replace,
    ))
}

fn sorted_names(schema: &Schema) -> Vec<&str> {
    let mut names: Vec<&str> = schema.block.attributes.keys().map(String::as_str).collect();
    names.sort_unstable();
    names
}

/// Decode a state or config object into a typed model.
pub(crate) fn decode<T: DeserializeOwned>(value: Value) -> Result<T, ProviderError> {
    Ok(serde_json::from_value(value)?)
}

/// Encode a typed model back into a state object.
pub(crate) fn encode<T: Serialize>(model: &T) -> Result<Value, ProviderError> {
    Ok(serde_json::to_value(model)?)
}

/// Treat empty strings from the backend as unset.
pub(crate) fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

/// Map a delete result, treating 404 as already deleted.
pub(crate) fn deleted(
    operation: impl Into<String>,
    result: Result<(), ClientError>,
) -> Result<(), ProviderError> {
    match result {
        Ok(()) => Ok(()),
        Err(err) if err.is_not_found() => Ok(()),
        Err(err) => Err(ProviderError::remote(operation, err)),
    }
}

/// Split an import id of the form `parent/child`.
pub(crate) fn split_import_id<'a>(
    id: &'a str,
    expected: &str,
) -> Result<(&'a str, &'a str), ProviderError> {
    match id.split_once('/') {
        Some((parent, child)) if !parent.is_empty() && !child.is_empty() => Ok((parent, child)),
        _ => Err(ProviderError::InvalidRequest(format!(
            "Expected format: {}, got: {}",
            expected, id
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Attribute;
    use serde_json::json;

    fn schema() -> Schema {
        Schema::v0()
            .with_attribute("id", Attribute::computed_string())
            .with_attribute("environment_id", Attribute::required_string().with_force_new())
            .with_attribute("path", Attribute::optional_string())
            .with_attribute("branch", Attribute::optional_computed_string())
            .with_attribute(
                "compose_file",
                Attribute::optional_computed_string().with_default(json!("docker-compose.yml")),
            )
            .with_attribute("auto_sync", Attribute::optional_bool(false))
            .with_attribute("last_sync_at", Attribute::computed_string())
    }

    #[test]
    fn test_plan_create_applies_defaults() {
        let plan = plan_with_schema(&schema(), None, &json!({"environment_id": "env-1"})).unwrap();

        assert!(!plan.requires_replace);
        let state = &plan.planned_state;
        assert_eq!(state["compose_file"], "docker-compose.yml");
        assert_eq!(state["auto_sync"], false);
        assert!(state["id"].is_null());
        assert!(state["path"].is_null());

        let paths: Vec<&str> = plan.changes.iter().map(|c| c.path.as_str()).collect();
        assert_eq!(paths, vec!["auto_sync", "compose_file", "environment_id"]);
    }

    #[test]
    fn test_plan_no_change_carries_computed() {
        let prior = json!({
            "id": "sync-1",
            "environment_id": "env-1",
            "path": null,
            "branch": "main",
            "compose_file": "docker-compose.yml",
            "auto_sync": false,
            "last_sync_at": "2024-05-01T00:00:00Z"
        });
        let plan =
            plan_with_schema(&schema(), Some(&prior), &json!({"environment_id": "env-1"})).unwrap();

        assert!(!plan.has_changes());
        assert_eq!(plan.planned_state["id"], "sync-1");
        assert_eq!(plan.planned_state["branch"], "main");
        assert_eq!(plan.planned_state["last_sync_at"], "2024-05-01T00:00:00Z");
    }

    #[test]
    fn test_plan_in_place_update() {
        let prior = json!({"id": "sync-1", "environment_id": "env-1", "auto_sync": false});
        let plan = plan_with_schema(
            &schema(),
            Some(&prior),
            &json!({"environment_id": "env-1", "auto_sync": true}),
        )
        .unwrap();

        assert!(!plan.requires_replace);
        assert!(plan.changes.iter().any(|c| c.path == "auto_sync"));
        assert_eq!(plan.planned_state["id"], "sync-1");
    }

    #[test]
    fn test_plan_force_new_replaces() {
        let prior = json!({"id": "sync-1", "environment_id": "env-1", "last_sync_at": "x"});
        let plan =
            plan_with_schema(&schema(), Some(&prior), &json!({"environment_id": "env-2"})).unwrap();

        assert!(plan.requires_replace);
        assert!(plan.planned_state["id"].is_null());
        assert!(plan.planned_state["last_sync_at"].is_null());
    }

    #[test]
    fn test_plan_destroy() {
        let prior = json!({"id": "sync-1", "environment_id": "env-1"});
        let plan = plan_with_schema(&schema(), Some(&prior), &Value::Null).unwrap();
        assert!(plan.planned_state.is_null());
        assert_eq!(plan.changes.len(), 2);

        let plan = plan_with_schema(&schema(), None, &Value::Null).unwrap();
        assert!(!plan.has_changes());
    }

    #[test]
    fn test_plan_rejects_non_object() {
        assert!(plan_with_schema(&schema(), None, &json!("env-1")).is_err());
    }

    #[test]
    fn test_split_import_id() {
        assert_eq!(split_import_id("env-1/sync-1", "env/sync").unwrap(), ("env-1", "sync-1"));
        assert!(split_import_id("env-1", "env/sync").is_err());
        assert!(split_import_id("/sync-1", "env/sync").is_err());
    }

    #[test]
    fn test_all_resources_have_unique_names() {
        let mut names: Vec<&str> = all().iter().map(|r| r.type_name()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), 5);
        assert!(names.iter().all(|n| n.starts_with("arcane_")));
    }
}
