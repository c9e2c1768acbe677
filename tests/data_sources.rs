//! Data sources against a mock Arcane backend.

mod common;

use arcane_provider::testing::ProviderTester;
use arcane_provider::{ArcaneProvider, ProviderError};
use common::MockArcane;
use serde_json::json;
use tokio_test::{assert_err, assert_ok};

async fn setup() -> (MockArcane, ProviderTester<ArcaneProvider>) {
    let mock = MockArcane::start().await;
    mock.add_environment("env-1", "production");
    mock.add_environment("env-2", "staging");
    mock.add_project("env-1", "api", "api", &["api"]);
    mock.add_project("env-1", "web", "web", &["nginx", "app"]);
    mock.add_container("env-1", "web", "c-1", "web-nginx-1");
    let tester = ProviderTester::new(mock.provider().await);
    (mock, tester)
}

#[tokio::test]
async fn test_environment_by_name() {
    let (_mock, tester) = setup().await;

    let state = assert_ok!(
        tester
            .read_data_source("arcane_environment", json!({"name": "staging"}))
            .await
    );
    assert_eq!(state["id"], "env-2");
    assert_eq!(state["api_url"], "http://10.0.0.5:3553");
    assert!(state["description"].is_null());
    assert_eq!(state["use_api_key"], false);

    let err = assert_err!(
        tester
            .read_data_source("arcane_environment", json!({"name": "qa"}))
            .await
    );
    assert!(err.is_not_found(), "{:?}", err);
}

#[tokio::test]
async fn test_environment_needs_a_key() {
    let (mock, tester) = setup().await;

    let err = assert_err!(
        tester
            .validate_data_source_config("arcane_environment", json!({}))
            .await
    );
    assert!(err.to_string().contains("id"), "{}", err);

    let err = assert_err!(
        tester
            .read_data_source("arcane_environment", json!({"id": "", "name": ""}))
            .await
    );
    assert!(matches!(err, ProviderError::InvalidRequest(_)), "{:?}", err);
    assert!(mock.calls().is_empty());
}

#[tokio::test]
async fn test_project_lists_services() {
    let (_mock, tester) = setup().await;

    let state = tester
        .read_data_source("arcane_project", json!({"environment_id": "env-1", "name": "web"}))
        .await
        .unwrap();
    assert_eq!(state["id"], "web");
    assert_eq!(state["path"], "/opt/projects/web");
    assert_eq!(state["services"][0]["name"], "nginx");
    assert_eq!(state["services"][1]["image"], "app:latest");
}

#[tokio::test]
async fn test_project_status_lists_containers() {
    let (_mock, tester) = setup().await;

    let state = tester
        .read_data_source(
            "arcane_project_status",
            json!({"environment_id": "env-1", "project_id": "web"}),
        )
        .await
        .unwrap();
    let containers = state["containers"].as_array().unwrap();
    assert_eq!(containers.len(), 1);
    assert_eq!(containers[0]["id"], "c-1");
    assert_eq!(containers[0]["ports"][0]["host_port"], 8080);
}

#[tokio::test]
async fn test_project_status_falls_back_to_services() {
    let (mock, tester) = setup().await;
    mock.state().broken_containers.insert("web".to_string());

    let state = tester
        .read_data_source(
            "arcane_project_status",
            json!({"environment_id": "env-1", "project_id": "web"}),
        )
        .await
        .unwrap();
    let containers = state["containers"].as_array().unwrap();
    assert_eq!(containers.len(), 2);
    assert_eq!(containers[0]["name"], "nginx");
    assert_eq!(containers[0]["id"], "");
    assert_eq!(containers[0]["status"], "exited");
}

#[tokio::test]
async fn test_health_failure_is_data() {
    let (mock, tester) = setup().await;

    let healthy = tester
        .read_data_source("arcane_environment_health", json!({"environment_id": "env-1"}))
        .await
        .unwrap();
    assert_eq!(healthy["is_connected"], true);
    assert_eq!(healthy["error_message"], "");

    mock.state().offline.insert("env-1".to_string());
    let unhealthy = assert_ok!(
        tester
            .read_data_source("arcane_environment_health", json!({"environment_id": "env-1"}))
            .await
    );
    assert_eq!(unhealthy["is_connected"], false);
    assert!(unhealthy["error_message"]
        .as_str()
        .unwrap()
        .contains("agent did not respond"));
}

#[tokio::test]
async fn test_container_by_name_skips_broken_projects() {
    let (mock, tester) = setup().await;
    mock.state().broken_containers.insert("api".to_string());

    let state = tester
        .read_data_source(
            "arcane_container",
            json!({"environment_id": "env-1", "name": "web-nginx-1"}),
        )
        .await
        .unwrap();
    assert_eq!(state["id"], "c-1");
    assert_eq!(state["image"], "nginx:1.27");
    assert!(mock
        .calls()
        .contains(&"GET /api/environments/env-1/projects/api/containers".to_string()));
}

#[tokio::test]
async fn test_container_by_name_in_one_project() {
    let (mock, tester) = setup().await;

    let err = assert_err!(
        tester
            .read_data_source(
                "arcane_container",
                json!({"environment_id": "env-1", "project_id": "api", "name": "web-nginx-1"}),
            )
            .await
    );
    assert!(err.is_not_found(), "{:?}", err);
    assert!(!mock
        .calls()
        .contains(&"GET /api/environments/env-1/projects".to_string()));
}

#[tokio::test]
async fn test_container_by_id() {
    let (_mock, tester) = setup().await;

    let state = tester
        .read_data_source("arcane_container", json!({"environment_id": "env-1", "id": "c-1"}))
        .await
        .unwrap();
    assert_eq!(state["name"], "web-nginx-1");
    assert_eq!(state["health"], "healthy");
    assert_eq!(state["ports"][0]["protocol"], "tcp");
}
