//! Project deployment reconciliation.
//!
//! A deployment record says "this compose project should be running in this
//! environment, deployed with these flags". [`reconcile`] compares what the
//! configuration wants with what was last applied and picks an [`Action`];
//! [`Deployer`] carries the action out against a [`DeploymentBackend`],
//! waiting for the environment's agent first when deploying from scratch.
//!
//! ```text
//! Absent --deploy--> Running|Stopped --redeploy--> Running|Stopped --destroy--> Absent
//! ```
//!
//! The status reported by the backend is the only source of truth; nothing
//! here caches it between calls.

mod apply;
mod reconcile;
mod wait;

pub use apply::{Deployed, Deployer, DeploymentBackend, Outcome};
pub use reconcile::{reconcile, Action, DeploymentKey, DeploymentSpec};
pub use wait::{cancellation, wait_until_reachable, Backoff, CancelHandle, CancelSignal};
