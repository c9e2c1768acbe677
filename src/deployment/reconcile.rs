use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::client::models::DeployOptions;
use crate::config::DEFAULT_WAIT_TIMEOUT;
use crate::error::ProviderError;

/// Identifies a deployment: one project in one environment.
///
/// Rendered as `environment_id/project_id`, which is also the import id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeploymentKey {
    /// Environment the project lives in.
    pub environment_id: String,
    /// Project within the environment.
    pub project_id: String,
}

impl DeploymentKey {
    /// Build a key from its two halves.
    pub fn new(environment_id: impl Into<String>, project_id: impl Into<String>) -> Self {
        Self {
            environment_id: environment_id.into(),
            project_id: project_id.into(),
        }
    }
}

impl fmt::Display for DeploymentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.environment_id, self.project_id)
    }
}

impl FromStr for DeploymentKey {
    type Err = ProviderError;

    /// Splits on the first `/`; both halves must be non-empty.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('/') {
            Some((env, project)) if !env.is_empty() && !project.is_empty() => {
                Ok(Self::new(env, project))
            }
            _ => Err(ProviderError::InvalidRequest(format!(
                "Expected format: environment_id/project_id, got: {}",
                s
            ))),
        }
    }
}

/// What the configuration asks for (or what was last applied).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentSpec {
    /// Which project.
    pub key: DeploymentKey,
    /// Flags passed to `up` and `redeploy`.
    pub options: DeployOptions,
    /// Run `down` when the record is destroyed.
    pub stop_on_delete: bool,
    /// Opaque fingerprint; any difference forces a redeploy. Absent is empty.
    pub triggers: BTreeMap<String, String>,
    /// How long to wait for the agent before the first deploy.
    pub wait_timeout: Duration,
}

impl DeploymentSpec {
    /// A spec with default flags, no triggers and the default wait timeout.
    pub fn new(key: DeploymentKey) -> Self {
        Self {
            key,
            options: DeployOptions::default(),
            stop_on_delete: false,
            triggers: BTreeMap::new(),
            wait_timeout: DEFAULT_WAIT_TIMEOUT,
        }
    }

    /// Set the deploy flags.
    pub fn with_options(mut self, options: DeployOptions) -> Self {
        self.options = options;
        self
    }

    /// Replace the trigger fingerprint.
    pub fn with_triggers<I, K, V>(mut self, triggers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.triggers = triggers
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        self
    }

    /// Set whether destroy stops the project.
    pub fn with_stop_on_delete(mut self, stop_on_delete: bool) -> Self {
        self.stop_on_delete = stop_on_delete;
        self
    }

    /// Set the agent wait timeout.
    pub fn with_wait_timeout(mut self, wait_timeout: Duration) -> Self {
        self.wait_timeout = wait_timeout;
        self
    }
}

/// The step that brings the backend in line with the desired spec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    /// Nothing to do.
    NoOp,
    /// Wait for the agent, then `up`.
    Deploy,
    /// `redeploy` with the new flags.
    Redeploy,
    /// Forget the record, stopping the project if asked to.
    Destroy,
}

/// Pick the action that turns `previous` into `desired`.
///
/// Only the trigger map and the three deploy flags are compared.
/// `stop_on_delete` and `wait_timeout` only matter at destroy and deploy time,
/// and a changed key is a replacement that the plan layer handles.
pub fn reconcile(desired: Option<&DeploymentSpec>, previous: Option<&DeploymentSpec>) -> Action {
    match (desired, previous) {
        (Some(_), None) => Action::Deploy,
        (None, Some(_)) => Action::Destroy,
        (None, None) => Action::NoOp,
        (Some(desired), Some(previous)) => {
            if desired.triggers != previous.triggers || desired.options != previous.options {
                Action::Redeploy
            } else {
                Action::NoOp
            }
        }
    }
}
