//! `arcane_project_status` data source

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use super::{container_value, containers_attribute, fill, DataSource};
use crate::client::models::{ContainerDetail, Project};
use crate::client::Client;
use crate::error::{ClientError, ProviderError};
use crate::resources::non_empty;
use crate::schema::{Attribute, Schema};

/// A project's status and the containers behind it.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProjectStatusDataSource;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct StatusConfig {
    environment_id: String,
    project_id: String,
}

/// The container list to report.
///
/// Falls back to the project's services, without ids, health or ports, when
/// the container endpoint fails or comes back empty while services exist.
/// `None` means there is nothing to report.
fn containers(project: &Project, listed: Result<Vec<ContainerDetail>, ClientError>) -> Option<Value> {
    let failure = match listed {
        Ok(listed) if !listed.is_empty() => {
            return Some(listed.iter().map(container_value).collect());
        }
        Ok(_) => None,
        Err(err) => Some(err),
    };

    if project.services.is_empty() {
        return None;
    }
    if let Some(err) = failure {
        debug!(project = %project.id, error = %err, "container listing failed, using services");
    }
    Some(
        project
            .services
            .iter()
            .map(|svc| {
                json!({
                    "id": "",
                    "name": svc.name,
                    "image": svc.image,
                    "status": svc.status,
                    "health": "",
                    "ports": [],
                })
            })
            .collect(),
    )
}

#[async_trait]
impl DataSource for ProjectStatusDataSource {
    fn type_name(&self) -> &'static str {
        "arcane_project_status"
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_description("Current status of a project and its containers.")
            .with_attribute("environment_id", Attribute::required_string())
            .with_attribute("project_id", Attribute::required_string())
            .with_attribute("name", Attribute::computed_string())
            .with_attribute("status", Attribute::computed_string())
            .with_attribute("path", Attribute::computed_string())
            .with_attribute("containers", containers_attribute())
    }

    async fn read(&self, client: &Client, config: Value) -> Result<Value, ProviderError> {
        let cfg: StatusConfig = serde_json::from_value(config.clone())?;
        let env = client.for_environment(cfg.environment_id.as_str());

        let project = env.get_project(&cfg.project_id).await.map_err(|e| {
            ProviderError::remote(
                format!("read status of project {}/{}", cfg.environment_id, cfg.project_id),
                e,
            )
        })?;
        let listed = env.get_project_containers(&cfg.project_id).await;

        Ok(fill(
            config,
            json!({
                "name": project.name,
                "status": project.status,
                "path": non_empty(&project.path),
                "containers": containers(&project, listed),
            }),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::models::ProjectService;
    use crate::error::ApiError;

    fn project(services: &[&str]) -> Project {
        Project {
            id: "p1".into(),
            name: "web".into(),
            status: "running".into(),
            services: services
                .iter()
                .map(|name| ProjectService {
                    name: name.to_string(),
                    status: "running".into(),
                    image: "nginx:1.27".into(),
                })
                .collect(),
            ..Default::default()
        }
    }

    fn detail(name: &str) -> ContainerDetail {
        ContainerDetail {
            id: format!("{}-id", name),
            name: name.to_string(),
            status: "running".into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_detailed_list_wins() {
        let value = containers(&project(&["web"]), Ok(vec![detail("web-1")])).unwrap();
        assert_eq!(value[0]["id"], "web-1-id");
    }

    #[test]
    fn test_falls_back_on_error() {
        let err = ClientError::from(ApiError::new(500, "docker unavailable"));
        let value = containers(&project(&["web", "db"]), Err(err)).unwrap();
        assert_eq!(value.as_array().unwrap().len(), 2);
        assert_eq!(value[1]["name"], "db");
        assert_eq!(value[1]["id"], "");
        assert_eq!(value[1]["image"], "nginx:1.27");
    }

    #[test]
    fn test_falls_back_on_empty_list() {
        let value = containers(&project(&["web"]), Ok(vec![])).unwrap();
        assert_eq!(value[0]["name"], "web");
    }

    #[test]
    fn test_nothing_to_report() {
        assert!(containers(&project(&[]), Ok(vec![])).is_none());
        let err = ClientError::from(ApiError::new(500, "boom"));
        assert!(containers(&project(&[]), Err(err)).is_none());
    }
}
