//! `arcane_project_deployment` against a mock Arcane backend.

mod common;

use std::sync::Arc;
use std::time::Duration;

use arcane_provider::testing::{assert_plan_no_changes, assert_plan_updates_in_place, ProviderTester};
use arcane_provider::{ProviderError, ProviderService};
use common::MockArcane;
use serde_json::{json, Value};
use tokio_test::{assert_err, assert_ok};

const DEPLOYMENT: &str = "arcane_project_deployment";

fn config(triggers: Value) -> Value {
    json!({
        "environment_id": "env-1",
        "project_id": "web",
        "pull": true,
        "triggers": triggers
    })
}

async fn setup() -> (MockArcane, ProviderTester<arcane_provider::ArcaneProvider>) {
    let mock = MockArcane::start().await;
    mock.add_environment("env-1", "production");
    mock.add_project("env-1", "web", "web", &["nginx", "app"]);
    let tester = ProviderTester::new(mock.provider().await);
    (mock, tester)
}

#[tokio::test]
async fn test_create_waits_for_agent_then_deploys() {
    let (mock, tester) = setup().await;
    mock.state().unreachable_for = 2;

    let state = assert_ok!(
        tester
            .lifecycle_create(DEPLOYMENT, config(json!({"compose": "v1"})))
            .await
    );

    assert_eq!(state["id"], "env-1/web");
    assert_eq!(state["status"], "running");
    assert_eq!(state["wait_timeout"], "2m");
    assert!(state["last_deployed_at"].as_str().unwrap().ends_with('Z'));

    let calls = mock.calls();
    let probes = calls
        .iter()
        .take_while(|c| *c == "GET /api/environments/env-1/projects/web")
        .count();
    assert_eq!(probes, 3, "two failed probes then one success: {:?}", calls);
    assert_eq!(mock.writes(), vec!["POST /api/environments/env-1/projects/web/up"]);
    assert_eq!(
        mock.last_body("POST /api/environments/env-1/projects/web/up"),
        Some(json!({"pull": true}))
    );
}

#[tokio::test]
async fn test_create_times_out_when_agent_never_answers() {
    let (mock, tester) = setup().await;
    mock.state().unreachable_for = u32::MAX;

    let mut cfg = config(json!({}));
    cfg["wait_timeout"] = json!("1s");
    let plan = tester.plan_create(DEPLOYMENT, cfg).await.unwrap();

    let err = assert_err!(tester.create(DEPLOYMENT, plan.planned_state).await);
    match err {
        ProviderError::Timeout { waited, source, .. } => {
            assert_eq!(waited, Duration::from_secs(1));
            assert_eq!(source.status(), Some(503));
        }
        other => panic!("expected timeout, got {:?}", other),
    }
    assert!(mock.writes().is_empty());
}

#[tokio::test]
async fn test_stop_cancels_pending_wait() {
    let mock = MockArcane::start().await;
    mock.add_project("env-1", "web", "web", &[]);
    mock.state().unreachable_for = u32::MAX;
    let provider = Arc::new(mock.provider().await);

    let plan = provider
        .plan(DEPLOYMENT, None, config(json!({})))
        .await
        .unwrap();
    let create = {
        let provider = Arc::clone(&provider);
        tokio::spawn(async move { provider.create(DEPLOYMENT, plan.planned_state).await })
    };

    tokio::time::sleep(Duration::from_millis(100)).await;
    provider.stop().await.unwrap();

    let result = tokio::time::timeout(Duration::from_secs(5), create)
        .await
        .expect("create should return promptly after stop")
        .unwrap();
    assert!(matches!(result, Err(ProviderError::Cancelled(_))), "{:?}", result);
    assert!(mock.writes().is_empty());
}

#[tokio::test]
async fn test_stop_is_permanent_for_the_instance() {
    let (mock, tester) = setup().await;
    tester.stop().await.unwrap();

    let plan = tester.plan_create(DEPLOYMENT, config(json!({}))).await.unwrap();
    let err = assert_err!(tester.create(DEPLOYMENT, plan.planned_state).await);
    assert!(matches!(err, ProviderError::Cancelled(_)), "{:?}", err);
    assert!(mock.calls().is_empty(), "{:?}", mock.calls());
}

#[tokio::test]
async fn test_trigger_change_redeploys() {
    let (mock, tester) = setup().await;
    let state = tester
        .lifecycle_create(DEPLOYMENT, config(json!({"compose": "v1"})))
        .await
        .unwrap();
    mock.clear_calls();

    let plan = tester
        .plan_update(DEPLOYMENT, state.clone(), config(json!({"compose": "v2"})))
        .await
        .unwrap();
    assert_plan_updates_in_place(&plan);

    let updated = tester
        .lifecycle_update(DEPLOYMENT, state, config(json!({"compose": "v2"})))
        .await
        .unwrap();
    assert_eq!(updated["triggers"]["compose"], "v2");
    assert_eq!(updated["status"], "running");
    assert_eq!(
        mock.writes(),
        vec!["POST /api/environments/env-1/projects/web/redeploy"]
    );
}

#[tokio::test]
async fn test_unchanged_config_does_nothing() {
    let (mock, tester) = setup().await;
    let state = tester
        .lifecycle_create(DEPLOYMENT, config(json!({"compose": "v1"})))
        .await
        .unwrap();
    mock.clear_calls();

    let plan = tester
        .plan_update(DEPLOYMENT, state.clone(), config(json!({"compose": "v1"})))
        .await
        .unwrap();
    assert_plan_no_changes(&plan);

    let updated = tester
        .update(DEPLOYMENT, state.clone(), plan.planned_state)
        .await
        .unwrap();
    assert_eq!(updated["last_deployed_at"], state["last_deployed_at"]);
    assert!(mock.calls().is_empty(), "{:?}", mock.calls());
}

#[tokio::test]
async fn test_delete_without_stop_leaves_project_running() {
    let (mock, tester) = setup().await;
    let state = tester
        .lifecycle_create(DEPLOYMENT, config(json!({})))
        .await
        .unwrap();
    mock.clear_calls();

    assert_ok!(tester.lifecycle_delete(DEPLOYMENT, state).await);
    assert!(mock.writes().is_empty());
    assert_eq!(mock.project_status("env-1", "web").as_deref(), Some("running"));
}

#[tokio::test]
async fn test_delete_with_stop_brings_project_down() {
    let (mock, tester) = setup().await;
    let mut cfg = config(json!({}));
    cfg["stop_on_delete"] = json!(true);
    let state = tester.lifecycle_create(DEPLOYMENT, cfg).await.unwrap();
    mock.clear_calls();

    assert_ok!(tester.lifecycle_delete(DEPLOYMENT, state.clone()).await);
    assert_eq!(
        mock.writes(),
        vec!["POST /api/environments/env-1/projects/web/down"]
    );
    assert_eq!(mock.project_status("env-1", "web").as_deref(), Some("stopped"));

    // The project vanishing in between is still a successful delete.
    mock.state().projects.clear();
    assert_ok!(tester.delete(DEPLOYMENT, state).await);
}

#[tokio::test]
async fn test_read_drops_state_when_project_is_gone() {
    let (mock, tester) = setup().await;
    let state = tester
        .lifecycle_create(DEPLOYMENT, config(json!({})))
        .await
        .unwrap();

    mock.state().projects.clear();
    let refreshed = assert_ok!(tester.read(DEPLOYMENT, state).await);
    assert!(refreshed.is_none());
}

#[tokio::test]
async fn test_import_by_composite_id() {
    let (_mock, tester) = setup().await;

    let imported = tester.import_resource(DEPLOYMENT, "env-1/web").await.unwrap();
    assert_eq!(imported.len(), 1);
    assert_eq!(imported[0].resource_type, DEPLOYMENT);
    assert_eq!(imported[0].state["environment_id"], "env-1");
    assert_eq!(imported[0].state["project_id"], "web");
    assert_eq!(imported[0].state["status"], "stopped");

    let err = assert_err!(tester.import_resource(DEPLOYMENT, "web").await);
    assert!(matches!(err, ProviderError::InvalidRequest(_)), "{:?}", err);

    let err = assert_err!(tester.import_resource(DEPLOYMENT, "env-1/missing").await);
    assert!(err.is_not_found(), "{:?}", err);
}

#[tokio::test]
async fn test_invalid_wait_timeout_is_reported() {
    let (_mock, tester) = setup().await;
    let mut cfg = config(json!({}));
    cfg["wait_timeout"] = json!("soon");

    let err = assert_err!(tester.validate_resource_config(DEPLOYMENT, cfg).await);
    assert!(err.to_string().contains("Invalid wait_timeout"), "{}", err);
}
