//! Projects and containers, scoped to an environment.

use reqwest::Method;
use tracing::debug;

use super::models::{ContainerDetail, DeployOptions, Project};
use super::EnvironmentClient;
use crate::error::{ApiError, ClientError};

impl EnvironmentClient {
    fn project_path<'a>(&'a self, project_id: &'a str, action: Option<&'a str>) -> Vec<&'a str> {
        let mut segments = vec![
            "api",
            "environments",
            self.environment_id.as_str(),
            "projects",
            project_id,
        ];
        segments.extend(action);
        segments
    }

    /// List the projects in this environment.
    pub async fn list_projects(&self) -> Result<Vec<Project>, ClientError> {
        self.client
            .get_list(&["api", "environments", self.environment_id.as_str(), "projects"])
            .await
    }

    /// Get a project by id.
    pub async fn get_project(&self, project_id: &str) -> Result<Project, ClientError> {
        self.client
            .get_one(&self.project_path(project_id, None))
            .await
    }

    /// Find a project by exact name. Missing names report a 404.
    pub async fn get_project_by_name(&self, name: &str) -> Result<Project, ClientError> {
        self.list_projects()
            .await?
            .into_iter()
            .find(|p| p.name == name)
            .ok_or_else(|| ApiError::not_found("project not found").into())
    }

    /// `docker compose up` the project.
    pub async fn deploy_project(
        &self,
        project_id: &str,
        options: &DeployOptions,
    ) -> Result<(), ClientError> {
        self.client
            .call(
                Method::POST,
                &self.project_path(project_id, Some("up")),
                Some(options),
            )
            .await
    }

    /// Tear down and bring the project back up.
    pub async fn redeploy_project(
        &self,
        project_id: &str,
        options: &DeployOptions,
    ) -> Result<(), ClientError> {
        self.client
            .call(
                Method::POST,
                &self.project_path(project_id, Some("redeploy")),
                Some(options),
            )
            .await
    }

    /// `docker compose down` the project.
    pub async fn stop_project(&self, project_id: &str) -> Result<(), ClientError> {
        self.client
            .call::<()>(
                Method::POST,
                &self.project_path(project_id, Some("down")),
                None,
            )
            .await
    }

    /// Runtime details for every container of a project.
    pub async fn get_project_containers(
        &self,
        project_id: &str,
    ) -> Result<Vec<ContainerDetail>, ClientError> {
        self.client
            .get_list(&self.project_path(project_id, Some("containers")))
            .await
    }

    /// Get a container by id.
    pub async fn get_container(&self, container_id: &str) -> Result<ContainerDetail, ClientError> {
        self.client
            .get_one(&[
                "api",
                "environments",
                self.environment_id.as_str(),
                "containers",
                container_id,
            ])
            .await
    }

    /// Find a container by name across every project in the environment.
    ///
    /// Projects whose container listing fails are skipped.
    pub async fn get_container_by_name(&self, name: &str) -> Result<ContainerDetail, ClientError> {
        for project in self.list_projects().await? {
            let containers = match self.get_project_containers(&project.id).await {
                Ok(containers) => containers,
                Err(err) => {
                    debug!(project = %project.id, error = %err, "skipping project while searching containers");
                    continue;
                }
            };
            if let Some(container) = containers.into_iter().find(|c| c.name == name) {
                return Ok(container);
            }
        }
        Err(ApiError::not_found("container not found").into())
    }
}
