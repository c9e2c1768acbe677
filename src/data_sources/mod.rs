//! Read-only lookups.
//!
//! A data source takes its configuration object and returns the same object
//! with the computed attributes filled in.

mod container;
mod environment;
mod environment_health;
mod project;
mod project_status;

pub use container::ContainerDataSource;
pub use environment::EnvironmentDataSource;
pub use environment_health::EnvironmentHealthDataSource;
pub use project::ProjectDataSource;
pub use project_status::ProjectStatusDataSource;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::client::models::{ContainerDetail, ContainerPort};
use crate::client::Client;
use crate::error::ProviderError;
use crate::schema::{Attribute, AttributeFlags, AttributeType, Diagnostic, Schema};
use crate::validation;

/// A data source type served by the provider.
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Full type name, e.g. `arcane_project`.
    fn type_name(&self) -> &'static str;

    /// Attribute schema.
    fn schema(&self) -> Schema;

    /// Check configuration before reading.
    fn validate(&self, config: &Value) -> Vec<Diagnostic> {
        validation::validate(&self.schema(), config)
    }

    /// Look the object up and return the populated state.
    async fn read(&self, client: &Client, config: Value) -> Result<Value, ProviderError>;
}

/// All data sources served by the provider.
pub fn all() -> Vec<Box<dyn DataSource>> {
    vec![
        Box::new(EnvironmentDataSource),
        Box::new(ProjectDataSource),
        Box::new(ProjectStatusDataSource),
        Box::new(EnvironmentHealthDataSource),
        Box::new(ContainerDataSource),
    ]
}

/// `id` / `name` pair shared by the lookup data sources.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct Lookup {
    pub id: Option<String>,
    pub name: Option<String>,
}

pub(crate) enum LookupKey<'a> {
    Id(&'a str),
    Name(&'a str),
}

impl Lookup {
    /// `id` wins when both are set. Empty strings count as unset.
    pub fn key(&self, what: &str) -> Result<LookupKey<'_>, ProviderError> {
        let id = self.id.as_deref().filter(|s| !s.is_empty());
        let name = self.name.as_deref().filter(|s| !s.is_empty());
        match (id, name) {
            (Some(id), _) => Ok(LookupKey::Id(id)),
            (None, Some(name)) => Ok(LookupKey::Name(name)),
            (None, None) => Err(ProviderError::InvalidRequest(format!(
                "Either 'id' or 'name' must be specified to look up {}",
                what
            ))),
        }
    }
}

fn port_type() -> AttributeType {
    AttributeType::object([
        ("host_port", AttributeType::Int64),
        ("container_port", AttributeType::Int64),
        ("protocol", AttributeType::String),
    ])
}

pub(crate) fn ports_attribute() -> Attribute {
    Attribute::new(AttributeType::list(port_type()), AttributeFlags::computed())
}

pub(crate) fn containers_attribute() -> Attribute {
    Attribute::new(
        AttributeType::list(AttributeType::object([
            ("id", AttributeType::String),
            ("name", AttributeType::String),
            ("image", AttributeType::String),
            ("status", AttributeType::String),
            ("health", AttributeType::String),
            ("ports", AttributeType::list(port_type())),
        ])),
        AttributeFlags::computed(),
    )
}

pub(crate) fn ports_value(ports: &[ContainerPort]) -> Value {
    ports
        .iter()
        .map(|p| {
            json!({
                "host_port": p.host_port,
                "container_port": p.container_port,
                "protocol": p.protocol,
            })
        })
        .collect()
}

pub(crate) fn container_value(container: &ContainerDetail) -> Value {
    json!({
        "id": container.id,
        "name": container.name,
        "image": container.image,
        "status": container.status,
        "health": container.health,
        "ports": ports_value(&container.ports),
    })
}

/// Merge `computed` into the config object.
pub(crate) fn fill(config: Value, computed: Value) -> Value {
    let mut state = match config {
        Value::Object(map) => map,
        _ => Default::default(),
    };
    if let Value::Object(computed) = computed {
        state.extend(computed);
    }
    Value::Object(state)
}
