//! `arcane_environment`

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, instrument};

use super::{decode, deleted, encode, non_empty, Resource, ResourceContext};
use crate::client::models::{Environment, EnvironmentCreateRequest, EnvironmentUpdateRequest};
use crate::client::Client;
use crate::error::ProviderError;
use crate::schema::{Attribute, Schema};
use crate::types::{AttributeChange, PlanResult};

/// Manages an Arcane environment and its agent access token.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvironmentResource;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
struct EnvironmentState {
    id: Option<String>,
    name: String,
    api_url: String,
    description: Option<String>,
    use_api_key: bool,
    access_token: Option<String>,
    regenerate_access_token: bool,
}

impl EnvironmentState {
    /// Overlay what the backend reports onto the configured values.
    fn refresh(&mut self, env: &Environment) {
        self.id = Some(env.id.clone());
        if !env.name.is_empty() {
            self.name = env.name.clone();
        }
        if !env.api_url.is_empty() {
            self.api_url = env.api_url.clone();
        }
        if let Some(description) = non_empty(&env.description) {
            self.description = Some(description);
        }
        self.use_api_key = env.use_api_key;
    }

    fn from_remote(env: &Environment) -> Self {
        let mut state = Self::default();
        state.refresh(env);
        state
    }
}

async fn regenerate_token(client: &Client, id: &str) -> Result<Option<String>, ProviderError> {
    let env = client
        .regenerate_environment_api_key(id)
        .await
        .map_err(|e| ProviderError::remote(format!("regenerate access token of environment {}", id), e))?;
    Ok(env.issued_token().map(str::to_string))
}

#[async_trait]
impl Resource for EnvironmentResource {
    fn type_name(&self) -> &'static str {
        "arcane_environment"
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_description("An Arcane environment: a Docker host reached through its agent.")
            .with_attribute(
                "id",
                Attribute::computed_string().with_description("Environment id."),
            )
            .with_attribute(
                "name",
                Attribute::required_string().with_description("Display name."),
            )
            .with_attribute(
                "api_url",
                Attribute::required_string().with_description("URL of the environment's agent."),
            )
            .with_attribute("description", Attribute::optional_string())
            .with_attribute("use_api_key", Attribute::optional_bool(false))
            .with_attribute(
                "access_token",
                Attribute::computed_string()
                    .sensitive()
                    .with_description("Token the agent uses to authenticate to Arcane."),
            )
            .with_attribute(
                "regenerate_access_token",
                Attribute::optional_bool(false).with_description(
                    "Set to true to issue a new access token. Reset to false afterwards.",
                ),
            )
    }

    fn plan(&self, prior: Option<&Value>, proposed: &Value) -> Result<PlanResult, ProviderError> {
        let mut plan = super::plan_with_schema(&self.schema(), prior, proposed)?;

        let Some(prior) = prior.filter(|p| !p.is_null()) else {
            return Ok(plan);
        };
        let was_set = prior["regenerate_access_token"].as_bool().unwrap_or(false);
        let now_set = plan.planned_state["regenerate_access_token"]
            .as_bool()
            .unwrap_or(false);

        if now_set && !was_set {
            if let Some(state) = plan.planned_state.as_object_mut() {
                state.insert("access_token".to_string(), Value::Null);
            }
            plan.changes.push(AttributeChange::new(
                "access_token",
                prior.get("access_token").cloned(),
                None,
            ));
        }
        Ok(plan)
    }

    #[instrument(skip_all, fields(resource = "arcane_environment"))]
    async fn create(&self, ctx: &ResourceContext, planned: Value) -> Result<Value, ProviderError> {
        let mut state: EnvironmentState = decode(planned)?;

        let request = EnvironmentCreateRequest {
            name: state.name.clone(),
            api_url: state.api_url.clone(),
            description: state.description.clone().unwrap_or_default(),
            use_api_key: state.use_api_key,
        };
        let env = ctx
            .client
            .create_environment(&request)
            .await
            .map_err(|e| ProviderError::remote(format!("create environment {}", state.name), e))?;
        info!(id = %env.id, name = %env.name, "environment created");

        state.refresh(&env);
        state.access_token = regenerate_token(&ctx.client, &env.id)
            .await?
            .or_else(|| non_empty(&env.access_token));
        encode(&state)
    }

    async fn read(
        &self,
        ctx: &ResourceContext,
        current: Value,
    ) -> Result<Option<Value>, ProviderError> {
        let mut state: EnvironmentState = decode(current)?;
        let Some(id) = state.id.clone() else {
            return Ok(None);
        };

        match ctx.client.get_environment(&id).await {
            Ok(env) => {
                state.refresh(&env);
                encode(&state).map(Some)
            }
            Err(err) if err.is_not_found() => {
                debug!(%id, "environment gone");
                Ok(None)
            }
            Err(err) => Err(ProviderError::remote(format!("read environment {}", id), err)),
        }
    }

    #[instrument(skip_all, fields(resource = "arcane_environment"))]
    async fn update(
        &self,
        ctx: &ResourceContext,
        prior: Value,
        planned: Value,
    ) -> Result<Value, ProviderError> {
        let prior: EnvironmentState = decode(prior)?;
        let mut state: EnvironmentState = decode(planned)?;
        let id = prior
            .id
            .clone()
            .ok_or_else(|| ProviderError::InvalidRequest("environment state has no id".into()))?;
        state.id = Some(id.clone());

        state.access_token = if state.regenerate_access_token && !prior.regenerate_access_token {
            info!(%id, "rotating access token");
            regenerate_token(&ctx.client, &id)
                .await?
                .or_else(|| prior.access_token.clone())
        } else {
            prior.access_token.clone()
        };

        let request = EnvironmentUpdateRequest {
            name: (state.name != prior.name).then(|| state.name.clone()),
            description: (state.description != prior.description)
                .then(|| state.description.clone().unwrap_or_default()),
            use_api_key: (state.use_api_key != prior.use_api_key).then_some(state.use_api_key),
        };
        if !request.is_empty() {
            let env = ctx
                .client
                .update_environment(&id, &request)
                .await
                .map_err(|e| ProviderError::remote(format!("update environment {}", id), e))?;
            state.refresh(&env);
        }
        encode(&state)
    }

    async fn delete(&self, ctx: &ResourceContext, current: Value) -> Result<(), ProviderError> {
        let state: EnvironmentState = decode(current)?;
        let Some(id) = state.id else {
            return Ok(());
        };
        deleted(
            format!("delete environment {}", id),
            ctx.client.delete_environment(&id).await,
        )
    }

    async fn import(&self, ctx: &ResourceContext, id: &str) -> Result<Value, ProviderError> {
        let env = ctx
            .client
            .get_environment(id)
            .await
            .map_err(|e| ProviderError::remote(format!("import environment {}", id), e))?;
        encode(&EnvironmentState::from_remote(&env))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn prior() -> Value {
        json!({
            "id": "env-1",
            "name": "production",
            "api_url": "http://10.0.0.5:3553",
            "description": null,
            "use_api_key": false,
            "access_token": "arc_old",
            "regenerate_access_token": false
        })
    }

    fn config(regenerate: bool) -> Value {
        json!({
            "name": "production",
            "api_url": "http://10.0.0.5:3553",
            "regenerate_access_token": regenerate
        })
    }

    #[test]
    fn test_plan_keeps_token_without_rotation() {
        let plan = EnvironmentResource.plan(Some(&prior()), &config(false)).unwrap();
        assert!(!plan.has_changes());
        assert_eq!(plan.planned_state["access_token"], "arc_old");
    }

    #[test]
    fn test_plan_rotation_marks_token_unknown() {
        let plan = EnvironmentResource.plan(Some(&prior()), &config(true)).unwrap();
        assert!(plan.planned_state["access_token"].is_null());
        let paths: Vec<&str> = plan.changes.iter().map(|c| c.path.as_str()).collect();
        assert!(paths.contains(&"access_token"));
        assert!(paths.contains(&"regenerate_access_token"));
        assert!(!plan.requires_replace);
    }

    #[test]
    fn test_plan_flag_back_to_false_keeps_token() {
        let mut rotated = prior();
        rotated["regenerate_access_token"] = json!(true);
        rotated["access_token"] = json!("arc_new");

        let plan = EnvironmentResource.plan(Some(&rotated), &config(false)).unwrap();
        assert_eq!(plan.planned_state["access_token"], "arc_new");
    }

    #[test]
    fn test_state_from_remote_drops_empty_description() {
        let env = Environment {
            id: "env-1".into(),
            name: "production".into(),
            api_url: "http://10.0.0.5:3553".into(),
            use_api_key: true,
            ..Default::default()
        };
        let state = encode(&EnvironmentState::from_remote(&env)).unwrap();
        assert!(state["description"].is_null());
        assert!(state["access_token"].is_null());
        assert_eq!(state["use_api_key"], true);
        assert_eq!(state["regenerate_access_token"], false);
    }
}
