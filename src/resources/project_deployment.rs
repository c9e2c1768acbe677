//! `arcane_project_deployment`
//!
//! A thin layer over [`crate::deployment`]: state is decoded into a
//! [`DeploymentSpec`], the reconciler picks the action, and the deployer
//! carries it out.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, instrument, warn};

use super::{decode, encode, Resource, ResourceContext};
use crate::client::models::DeployOptions;
use crate::config::{parse_duration, DEFAULT_WAIT_TIMEOUT};
use crate::deployment::{reconcile, Action, DeploymentKey, DeploymentSpec, Outcome};
use crate::error::ProviderError;
use crate::schema::{Attribute, Diagnostic, Schema};
use crate::types::{AttributeChange, PlanResult};
use crate::validation;

/// Deploys a compose project and redeploys it when its triggers or flags change.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProjectDeploymentResource;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
struct DeploymentState {
    id: Option<String>,
    environment_id: String,
    project_id: String,
    pull: bool,
    force_recreate: bool,
    remove_orphans: bool,
    stop_on_delete: bool,
    triggers: Option<BTreeMap<String, String>>,
    wait_timeout: Option<String>,
    status: Option<String>,
    last_deployed_at: Option<String>,
}

impl DeploymentState {
    fn key(&self) -> DeploymentKey {
        DeploymentKey::new(&self.environment_id, &self.project_id)
    }

    /// Everything the reconciler compares. The wait timeout is left at its default.
    fn desired(&self) -> DeploymentSpec {
        DeploymentSpec::new(self.key())
            .with_options(DeployOptions {
                pull: self.pull,
                force_recreate: self.force_recreate,
                remove_orphans: self.remove_orphans,
            })
            .with_triggers(self.triggers.clone().unwrap_or_default())
            .with_stop_on_delete(self.stop_on_delete)
    }

    fn spec(&self) -> DeploymentSpec {
        let wait_timeout = match self.wait_timeout.as_deref() {
            None | Some("") => DEFAULT_WAIT_TIMEOUT,
            Some(raw) => parse_duration(raw).unwrap_or_else(|err| {
                warn!(wait_timeout = raw, error = %err, "using default wait timeout");
                DEFAULT_WAIT_TIMEOUT
            }),
        };
        self.desired().with_wait_timeout(wait_timeout)
    }
}

fn default_wait_timeout() -> Value {
    json!("2m")
}

#[async_trait]
impl Resource for ProjectDeploymentResource {
    fn type_name(&self) -> &'static str {
        "arcane_project_deployment"
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_description(
                "Deploys a project in an Arcane environment. Changing `triggers` \
                 or a deploy flag redeploys it.",
            )
            .with_attribute(
                "id",
                Attribute::computed_string().with_description("`environment_id/project_id`."),
            )
            .with_attribute(
                "environment_id",
                Attribute::required_string().with_force_new(),
            )
            .with_attribute("project_id", Attribute::required_string().with_force_new())
            .with_attribute(
                "pull",
                Attribute::optional_bool(false).with_description("Pull images before deploying."),
            )
            .with_attribute("force_recreate", Attribute::optional_bool(false))
            .with_attribute("remove_orphans", Attribute::optional_bool(false))
            .with_attribute(
                "stop_on_delete",
                Attribute::optional_bool(false)
                    .with_description("Stop the project when this resource is destroyed."),
            )
            .with_attribute(
                "triggers",
                Attribute::optional_string_map()
                    .with_description("Arbitrary values; any change triggers a redeploy."),
            )
            .with_attribute(
                "wait_timeout",
                Attribute::optional_computed_string()
                    .with_default(default_wait_timeout())
                    .with_description(
                        "How long to wait for the environment agent before the first deploy, \
                         e.g. `30s` or `5m`.",
                    ),
            )
            .with_attribute("status", Attribute::computed_string())
            .with_attribute(
                "last_deployed_at",
                Attribute::computed_string().with_description("RFC3339 time of the last deploy."),
            )
    }

    fn validate(&self, config: &Value) -> Vec<Diagnostic> {
        let mut diagnostics = validation::validate(&self.schema(), config);
        if let Some(raw) = config.get("wait_timeout").and_then(Value::as_str) {
            if let Err(err) = parse_duration(raw) {
                diagnostics.push(
                    Diagnostic::error("Invalid wait_timeout")
                        .with_detail(err.to_string())
                        .with_attribute("wait_timeout"),
                );
            }
        }
        diagnostics
    }

    fn plan(&self, prior: Option<&Value>, proposed: &Value) -> Result<PlanResult, ProviderError> {
        let mut plan = super::plan_with_schema(&self.schema(), prior, proposed)?;

        let Some(prior) = prior.filter(|p| !p.is_null()) else {
            return Ok(plan);
        };
        if plan.planned_state.is_null() || plan.requires_replace {
            return Ok(plan);
        }

        let previous: DeploymentState = decode(prior.clone())?;
        let desired: DeploymentState = decode(plan.planned_state.clone())?;
        if reconcile(Some(&desired.desired()), Some(&previous.desired())) == Action::Redeploy {
            for name in ["last_deployed_at", "status"] {
                if let Some(state) = plan.planned_state.as_object_mut() {
                    state.insert(name.to_string(), Value::Null);
                }
                plan.changes
                    .push(AttributeChange::new(name, prior.get(name).cloned(), None));
            }
        }
        Ok(plan)
    }

    #[instrument(skip_all, fields(resource = "arcane_project_deployment"))]
    async fn create(&self, ctx: &ResourceContext, planned: Value) -> Result<Value, ProviderError> {
        let mut state: DeploymentState = decode(planned)?;
        let spec = state.spec();

        let outcome = ctx
            .deployer()
            .apply(Action::Deploy, Some(&spec), None)
            .await?;
        if let Outcome::Deployed(deployed) = outcome {
            state.status = Some(deployed.status.clone());
            state.last_deployed_at = Some(deployed.deployed_at_rfc3339());
        }
        state.id = Some(spec.key.to_string());
        encode(&state)
    }

    async fn read(
        &self,
        ctx: &ResourceContext,
        current: Value,
    ) -> Result<Option<Value>, ProviderError> {
        let mut state: DeploymentState = decode(current)?;
        let key = state.key();

        match ctx
            .client
            .for_environment(key.environment_id.as_str())
            .get_project(&key.project_id)
            .await
        {
            Ok(project) => {
                state.status = Some(project.status);
                encode(&state).map(Some)
            }
            Err(err) if err.is_not_found() => {
                debug!(deployment = %key, "project gone, dropping deployment");
                Ok(None)
            }
            Err(err) => Err(ProviderError::remote(
                format!("get status of project {}", key),
                err,
            )),
        }
    }

    #[instrument(skip_all, fields(resource = "arcane_project_deployment"))]
    async fn update(
        &self,
        ctx: &ResourceContext,
        prior: Value,
        planned: Value,
    ) -> Result<Value, ProviderError> {
        let prior: DeploymentState = decode(prior)?;
        let mut state: DeploymentState = decode(planned)?;
        let desired = state.spec();
        let previous = prior.spec();

        let action = reconcile(Some(&desired), Some(&previous));
        debug!(deployment = %desired.key, ?action, "reconciled");

        match ctx
            .deployer()
            .apply(action, Some(&desired), Some(&previous))
            .await?
        {
            Outcome::Deployed(deployed) => {
                state.status = Some(deployed.status.clone());
                state.last_deployed_at = Some(deployed.deployed_at_rfc3339());
            }
            Outcome::Unchanged | Outcome::Destroyed => {
                state.status = prior.status.clone();
                state.last_deployed_at = prior.last_deployed_at.clone();
            }
        }
        state.id = Some(desired.key.to_string());
        encode(&state)
    }

    async fn delete(&self, ctx: &ResourceContext, current: Value) -> Result<(), ProviderError> {
        let state: DeploymentState = decode(current)?;
        ctx.deployer()
            .apply_destroy(&state.spec(), state.stop_on_delete)
            .await
    }

    async fn import(&self, ctx: &ResourceContext, id: &str) -> Result<Value, ProviderError> {
        let key: DeploymentKey = id.parse()?;
        let project = ctx
            .client
            .for_environment(key.environment_id.as_str())
            .get_project(&key.project_id)
            .await
            .map_err(|e| ProviderError::remote(format!("import project deployment {}", key), e))?;

        encode(&DeploymentState {
            id: Some(key.to_string()),
            environment_id: key.environment_id,
            project_id: key.project_id,
            wait_timeout: Some("2m".to_string()),
            status: Some(project.status),
            ..Default::default()
        })
    }
}
