//! Arcane provider
//!
//! A declarative infrastructure provider for [Arcane](https://getarcane.app),
//! a Docker management platform. It manages environments, compose project
//! deployments, container registries and gitops syncs through Arcane's REST
//! API, and exposes read-only lookups for environments, projects and
//! containers.
//!
//! # Overview
//!
//! - **[`ProviderService`]**: the surface a plugin transport drives
//!   (schema, configure, plan, CRUD, import, data sources)
//! - **[`ArcaneProvider`]**: the implementation, dispatching to the
//!   [`resources`] and [`data_sources`] modules
//! - **[`deployment`]**: the reconciler behind `arcane_project_deployment`,
//!   which decides between deploy, redeploy, no-op and destroy and waits for
//!   the environment agent with capped exponential backoff
//! - **[`client`]**: a typed `reqwest` client for the Arcane API
//! - **Logging**: `tracing` events and spans, written to stderr by
//!   [`init_logging`]
//!
//! # Quick Start
//!
//! ```no_run
//! use arcane_provider::{init_logging, ArcaneProvider, ProviderService};
//! use serde_json::json;
//!
//! # async fn run() -> Result<(), arcane_provider::ProviderError> {
//! init_logging();
//!
//! let provider = ArcaneProvider::new();
//! provider
//!     .configure(json!({"url": "http://arcane.local:8000", "api_key": "arc_xxx"}))
//!     .await?;
//!
//! let config = json!({
//!     "environment_id": "env-1",
//!     "project_id": "web",
//!     "pull": true,
//!     "triggers": {"compose": "sha256:1f2e"}
//! });
//! let plan = provider
//!     .plan("arcane_project_deployment", None, config)
//!     .await?;
//! let state = provider
//!     .create("arcane_project_deployment", plan.planned_state)
//!     .await?;
//! println!("deployed at {}", state["last_deployed_at"]);
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration
//!
//! The provider block takes `url` and `api_key`. When unset they are read
//! from `ARCANE_URL` and `ARCANE_API_KEY`. Log filtering follows `RUST_LOG`.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod client;
pub mod config;
pub mod data_sources;
pub mod deployment;
pub mod error;
pub mod logging;
pub mod provider;
pub mod resources;
pub mod schema;
pub mod service;
pub mod testing;
pub mod types;
pub mod validation;

// Re-export main types at crate root
pub use client::{Client, ClientConfig};
pub use error::{ApiError, ClientError, ProviderError};
pub use logging::{init_logging, init_logging_with_default, try_init_logging};
pub use provider::ArcaneProvider;
pub use schema::ProviderSchema;
pub use service::ProviderService;
pub use types::{
    AttributeChange, ImportedResource, PlanResult, ProviderMetadata, ServerCapabilities,
};
pub use validation::{is_valid, validate, validate_result};

// Re-export async_trait for convenience
pub use async_trait::async_trait;

// Re-export commonly used external types
pub use serde_json;
pub use tracing;
