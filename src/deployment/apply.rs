use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use tracing::{debug, info, instrument};

use super::reconcile::{Action, DeploymentKey, DeploymentSpec};
use super::wait::{wait_until_reachable, Backoff, CancelSignal};
use crate::client::models::DeployOptions;
use crate::client::Client;
use crate::config::format_duration;
use crate::error::{ClientError, ProviderError};

/// The backend calls the reconciler needs.
#[async_trait]
pub trait DeploymentBackend: Send + Sync {
    /// Succeeds once the environment's agent answers for the project.
    async fn probe(&self, key: &DeploymentKey) -> Result<(), ClientError>;

    /// Start the project.
    async fn up(&self, key: &DeploymentKey, options: &DeployOptions) -> Result<(), ClientError>;

    /// Restart the project with new flags.
    async fn redeploy(
        &self,
        key: &DeploymentKey,
        options: &DeployOptions,
    ) -> Result<(), ClientError>;

    /// Stop the project.
    async fn down(&self, key: &DeploymentKey) -> Result<(), ClientError>;

    /// The project's current status as reported by the backend.
    async fn status(&self, key: &DeploymentKey) -> Result<String, ClientError>;
}

#[async_trait]
impl DeploymentBackend for Client {
    async fn probe(&self, key: &DeploymentKey) -> Result<(), ClientError> {
        self.for_environment(key.environment_id.as_str())
            .get_project(&key.project_id)
            .await
            .map(|_| ())
    }

    async fn up(&self, key: &DeploymentKey, options: &DeployOptions) -> Result<(), ClientError> {
        self.for_environment(key.environment_id.as_str())
            .deploy_project(&key.project_id, options)
            .await
    }

    async fn redeploy(
        &self,
        key: &DeploymentKey,
        options: &DeployOptions,
    ) -> Result<(), ClientError> {
        self.for_environment(key.environment_id.as_str())
            .redeploy_project(&key.project_id, options)
            .await
    }

    async fn down(&self, key: &DeploymentKey) -> Result<(), ClientError> {
        self.for_environment(key.environment_id.as_str())
            .stop_project(&key.project_id)
            .await
    }

    async fn status(&self, key: &DeploymentKey) -> Result<String, ClientError> {
        self.for_environment(key.environment_id.as_str())
            .get_project(&key.project_id)
            .await
            .map(|project| project.status)
    }
}

/// Result of a successful deploy or redeploy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deployed {
    /// Project status read back after the call.
    pub status: String,
    /// When the deploy call returned.
    pub deployed_at: DateTime<Utc>,
}

impl Deployed {
    /// `deployed_at` as RFC3339 with second precision, e.g. `2024-05-01T12:00:00Z`.
    pub fn deployed_at_rfc3339(&self) -> String {
        self.deployed_at.to_rfc3339_opts(SecondsFormat::Secs, true)
    }
}

/// What [`Deployer::apply`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// No remote calls were made.
    Unchanged,
    /// The project was deployed or redeployed.
    Deployed(Deployed),
    /// The record is gone (the project may still be running).
    Destroyed,
}

/// Executes reconcile actions against a backend.
pub struct Deployer<B> {
    backend: B,
    backoff: Backoff,
    cancel: CancelSignal,
}

impl<B: DeploymentBackend> Deployer<B> {
    /// A deployer with the default backoff that is never cancelled.
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            backoff: Backoff::default(),
            cancel: CancelSignal::never(),
        }
    }

    /// Override the delay schedule between reachability probes.
    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Abort reachability waits when `cancel` fires.
    pub fn with_cancel(mut self, cancel: CancelSignal) -> Self {
        self.cancel = cancel;
        self
    }

    /// The wrapped backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Poll the project until the agent answers or `spec.wait_timeout` passes.
    pub async fn wait_until_reachable(&self, spec: &DeploymentSpec) -> Result<(), ProviderError> {
        debug!(
            deployment = %spec.key,
            timeout = %format_duration(spec.wait_timeout),
            "waiting for environment agent"
        );
        let mut cancel = self.cancel.clone();
        wait_until_reachable(
            &format!("wait for agent of project {}", spec.key),
            || self.backend.probe(&spec.key),
            spec.wait_timeout,
            &self.backoff,
            &mut cancel,
        )
        .await
    }

    /// `up` the project and read back its status.
    #[instrument(skip_all, fields(deployment = %spec.key))]
    pub async fn apply_deploy(&self, spec: &DeploymentSpec) -> Result<Deployed, ProviderError> {
        debug!(options = ?spec.options, "deploying project");
        self.backend
            .up(&spec.key, &spec.options)
            .await
            .map_err(|e| ProviderError::remote(format!("deploy project {}", spec.key), e))?;
        self.finish(&spec.key).await
    }

    /// `redeploy` the project and read back its status.
    #[instrument(skip_all, fields(deployment = %spec.key))]
    pub async fn apply_redeploy(&self, spec: &DeploymentSpec) -> Result<Deployed, ProviderError> {
        debug!(options = ?spec.options, "redeploying project");
        self.backend
            .redeploy(&spec.key, &spec.options)
            .await
            .map_err(|e| ProviderError::remote(format!("redeploy project {}", spec.key), e))?;
        self.finish(&spec.key).await
    }

    /// Forget the deployment, stopping the project first when `stop_on_delete`.
    ///
    /// A project that no longer exists counts as stopped.
    #[instrument(skip_all, fields(deployment = %spec.key, stop_on_delete = stop_on_delete))]
    pub async fn apply_destroy(
        &self,
        spec: &DeploymentSpec,
        stop_on_delete: bool,
    ) -> Result<(), ProviderError> {
        if !stop_on_delete {
            info!("removing deployment record, containers keep running");
            return Ok(());
        }

        info!("stopping project");
        match self.backend.down(&spec.key).await {
            Ok(()) => Ok(()),
            Err(err) if err.is_not_found() => {
                debug!("project already gone");
                Ok(())
            }
            Err(err) => Err(ProviderError::remote(
                format!("stop project {}", spec.key),
                err,
            )),
        }
    }

    /// Carry out `action`.
    ///
    /// `Deploy` waits for the agent first; destroy honours the
    /// `stop_on_delete` that was in effect when the record was applied.
    pub async fn apply(
        &self,
        action: Action,
        desired: Option<&DeploymentSpec>,
        previous: Option<&DeploymentSpec>,
    ) -> Result<Outcome, ProviderError> {
        let missing = |which: &str| {
            ProviderError::InvalidRequest(format!("{:?} requires a {} spec", action, which))
        };

        match action {
            Action::NoOp => Ok(Outcome::Unchanged),
            Action::Deploy => {
                let spec = desired.ok_or_else(|| missing("desired"))?;
                self.wait_until_reachable(spec).await?;
                self.apply_deploy(spec).await.map(Outcome::Deployed)
            }
            Action::Redeploy => {
                let spec = desired.ok_or_else(|| missing("desired"))?;
                self.apply_redeploy(spec).await.map(Outcome::Deployed)
            }
            Action::Destroy => {
                let spec = previous.ok_or_else(|| missing("previous"))?;
                self.apply_destroy(spec, spec.stop_on_delete)
                    .await
                    .map(|()| Outcome::Destroyed)
            }
        }
    }

    async fn finish(&self, key: &DeploymentKey) -> Result<Deployed, ProviderError> {
        let deployed_at = Utc::now();
        let status = self
            .backend
            .status(key)
            .await
            .map_err(|e| ProviderError::remote(format!("get status of project {}", key), e))?;
        info!(%status, "project deployed");
        Ok(Deployed {
            status,
            deployed_at,
        })
    }
}
