//! In-process mock of the Arcane REST API.
//!
//! Keeps environments, projects, registries, repositories and gitops syncs in
//! memory and records every request so tests can assert on the exact calls.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use arcane_provider::deployment::Backoff;
use arcane_provider::{ArcaneProvider, ProviderService};
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::any;
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::net::TcpListener;

pub const API_KEY: &str = "arc_test_key";

/// One request as the mock saw it.
#[derive(Debug, Clone)]
pub struct Call {
    pub method: String,
    pub path: String,
    pub body: Value,
    pub api_key: Option<String>,
}

impl Call {
    fn line(&self) -> String {
        format!("{} {}", self.method, self.path)
    }
}

#[derive(Debug, Default)]
pub struct MockState {
    pub calls: Vec<Call>,
    pub environments: BTreeMap<String, Value>,
    /// Keyed by `(environment_id, project_id)`.
    pub projects: BTreeMap<(String, String), Value>,
    pub containers: BTreeMap<(String, String), Vec<Value>>,
    /// Projects whose container listing answers 500.
    pub broken_containers: HashSet<String>,
    pub registries: BTreeMap<String, Value>,
    pub repositories: BTreeMap<String, Value>,
    pub syncs: BTreeMap<(String, String), Value>,
    /// Environments whose connectivity test fails.
    pub offline: HashSet<String>,
    /// Answer this many single-project GETs with 503 before behaving.
    pub unreachable_for: u32,
    /// Regenerate responses carry no key.
    pub withhold_keys: bool,
    next_id: u32,
}

impl MockState {
    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}-{}", prefix, self.next_id)
    }
}

type Shared = Arc<Mutex<MockState>>;

pub struct MockArcane {
    pub url: String,
    state: Shared,
}

impl MockArcane {
    pub async fn start() -> Self {
        let state: Shared = Arc::default();
        let app = Router::new()
            .route("/api/{*path}", any(dispatch))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            url: format!("http://{}", addr),
            state,
        }
    }

    pub fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }

    /// A provider configured against this mock with a fast wait backoff.
    pub async fn provider(&self) -> ArcaneProvider {
        let provider = ArcaneProvider::new()
            .with_env(|_| None)
            .with_wait_backoff(Backoff::new(
                Duration::from_millis(10),
                Duration::from_millis(40),
            ));
        let diagnostics = provider
            .configure(json!({"url": self.url, "api_key": API_KEY}))
            .await
            .unwrap();
        assert!(diagnostics.is_empty(), "{:?}", diagnostics);
        provider
    }

    /// `METHOD /path` for every request so far.
    pub fn calls(&self) -> Vec<String> {
        self.state().calls.iter().map(Call::line).collect()
    }

    /// Requests other than reads.
    pub fn writes(&self) -> Vec<String> {
        self.state()
            .calls
            .iter()
            .filter(|c| c.method != "GET")
            .map(Call::line)
            .collect()
    }

    /// Body of the last request whose line equals `line`.
    pub fn last_body(&self, line: &str) -> Option<Value> {
        self.state()
            .calls
            .iter()
            .rev()
            .find(|c| c.line() == line)
            .map(|c| c.body.clone())
    }

    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }

    pub fn add_environment(&self, id: &str, name: &str) {
        self.state().environments.insert(
            id.to_string(),
            json!({
                "id": id,
                "name": name,
                "apiUrl": "http://10.0.0.5:3553",
                "description": "",
                "use_api_key": false
            }),
        );
    }

    pub fn add_project(&self, env: &str, id: &str, name: &str, services: &[&str]) {
        let services: Vec<Value> = services
            .iter()
            .map(|s| json!({"name": s, "status": "exited", "image": format!("{}:latest", s)}))
            .collect();
        self.state().projects.insert(
            (env.to_string(), id.to_string()),
            json!({
                "id": id,
                "name": name,
                "status": "stopped",
                "path": format!("/opt/projects/{}", name),
                "services": services
            }),
        );
    }

    pub fn add_container(&self, env: &str, project: &str, id: &str, name: &str) {
        self.state()
            .containers
            .entry((env.to_string(), project.to_string()))
            .or_default()
            .push(json!({
                "id": id,
                "name": name,
                "image": "nginx:1.27",
                "status": "running",
                "health": "healthy",
                "ports": [{"host_port": 8080, "container_port": 80, "protocol": "tcp"}]
            }));
    }

    pub fn project_status(&self, env: &str, id: &str) -> Option<String> {
        self.state()
            .projects
            .get(&(env.to_string(), id.to_string()))
            .map(|p| p["status"].as_str().unwrap_or_default().to_string())
    }
}

fn one(data: Value) -> Response {
    Json(json!({"success": true, "data": data})).into_response()
}

fn page(data: Vec<Value>) -> Response {
    let total = data.len();
    Json(json!({
        "success": true,
        "data": data,
        "pagination": {
            "totalPages": 1,
            "totalItems": total,
            "currentPage": 1,
            "itemsPerPage": 20
        }
    }))
    .into_response()
}

fn fail(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({"success": false, "message": message}))).into_response()
}

fn not_found(what: &str) -> Response {
    fail(StatusCode::NOT_FOUND, &format!("{} not found", what))
}

fn ok() -> Response {
    one(Value::Null)
}

/// Copy the keys of `patch` onto `target`, skipping `skip`.
fn merge(target: &mut Value, patch: &Value, skip: &[&str]) {
    if let (Some(target), Some(patch)) = (target.as_object_mut(), patch.as_object()) {
        for (k, v) in patch {
            if !skip.contains(&k.as_str()) {
                target.insert(k.clone(), v.clone());
            }
        }
    }
}

async fn dispatch(
    State(state): State<Shared>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let body: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    let path = uri.path().to_string();
    let mut st = state.lock().unwrap();
    st.calls.push(Call {
        method: method.to_string(),
        path: path.clone(),
        body: body.clone(),
        api_key: headers
            .get("x-api-key")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
    });

    let segments: Vec<&str> = path.trim_start_matches('/').split('/').collect();
    match (method.as_str(), segments.as_slice()) {
        // Environments
        ("GET", ["api", "environments"]) => page(st.environments.values().cloned().collect()),
        ("POST", ["api", "environments"]) => {
            let id = st.next_id("env");
            let mut env = json!({"id": id, "use_api_key": false});
            merge(&mut env, &body, &[]);
            st.environments.insert(id, env.clone());
            one(env)
        }
        ("GET", ["api", "environments", "broken"]) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "upstream exploded",
        )
            .into_response(),
        ("GET", ["api", "environments", id]) => match st.environments.get(*id) {
            Some(env) => one(env.clone()),
            None => not_found("environment"),
        },
        ("PUT", ["api", "environments", id]) => {
            let key = st.next_id("arc_key");
            let withhold_keys = st.withhold_keys;
            let Some(env) = st.environments.get_mut(*id) else {
                return not_found("environment");
            };
            if body["regenerateApiKey"] == json!(true) {
                let mut response = env.clone();
                if !withhold_keys {
                    response["apiKey"] = json!(key);
                }
                return one(response);
            }
            merge(env, &body, &[]);
            one(env.clone())
        }
        ("DELETE", ["api", "environments", id]) => match st.environments.remove(*id) {
            Some(_) => ok(),
            None => not_found("environment"),
        },
        ("POST", ["api", "environments", id, "test"]) => {
            if !st.environments.contains_key(*id) {
                not_found("environment")
            } else if st.offline.contains(*id) {
                fail(StatusCode::BAD_GATEWAY, "agent did not respond")
            } else {
                ok()
            }
        }

        // Projects
        ("GET", ["api", "environments", env, "projects"]) => page(
            st.projects
                .iter()
                .filter(|((e, _), _)| e == env)
                .map(|(_, p)| p.clone())
                .collect(),
        ),
        ("GET", ["api", "environments", env, "projects", id]) => {
            if st.unreachable_for > 0 {
                st.unreachable_for -= 1;
                return fail(StatusCode::SERVICE_UNAVAILABLE, "environment agent offline");
            }
            match st.projects.get(&(env.to_string(), id.to_string())) {
                Some(p) => one(p.clone()),
                None => not_found("project"),
            }
        }
        ("POST", ["api", "environments", env, "projects", id, action]) => {
            let Some(project) = st.projects.get_mut(&(env.to_string(), id.to_string())) else {
                return not_found("project");
            };
            match *action {
                "up" | "redeploy" => project["status"] = json!("running"),
                "down" => project["status"] = json!("stopped"),
                _ => return not_found("action"),
            }
            ok()
        }
        ("GET", ["api", "environments", env, "projects", id, "containers"]) => {
            if st.broken_containers.contains(*id) {
                return fail(StatusCode::INTERNAL_SERVER_ERROR, "docker daemon unavailable");
            }
            page(
                st.containers
                    .get(&(env.to_string(), id.to_string()))
                    .cloned()
                    .unwrap_or_default(),
            )
        }
        ("GET", ["api", "environments", env, "containers", id]) => st
            .containers
            .iter()
            .filter(|((e, _), _)| e == env)
            .flat_map(|(_, list)| list.iter())
            .find(|c| c["id"] == json!(id))
            .cloned()
            .map(one)
            .unwrap_or_else(|| not_found("container")),

        // Gitops syncs
        ("GET", ["api", "environments", env, "gitops-syncs"]) => page(
            st.syncs
                .iter()
                .filter(|((e, _), _)| e == env)
                .map(|(_, s)| s.clone())
                .collect(),
        ),
        ("POST", ["api", "environments", env, "gitops-syncs"]) => {
            let id = st.next_id("sync");
            let mut sync = json!({
                "id": id,
                "environment_id": env,
                "branch": "main",
                "auto_sync": false,
                "last_sync_at": "2024-05-01T12:00:00Z",
                "last_sync_commit": "a1b2c3d"
            });
            merge(&mut sync, &body, &[]);
            st.syncs.insert((env.to_string(), id), sync.clone());
            one(sync)
        }
        ("GET", ["api", "environments", env, "gitops-syncs", id]) => {
            match st.syncs.get(&(env.to_string(), id.to_string())) {
                Some(s) => one(s.clone()),
                None => not_found("gitops sync"),
            }
        }
        ("PUT", ["api", "environments", env, "gitops-syncs", id]) => {
            match st.syncs.get_mut(&(env.to_string(), id.to_string())) {
                Some(sync) => {
                    merge(sync, &body, &[]);
                    one(sync.clone())
                }
                None => not_found("gitops sync"),
            }
        }
        ("DELETE", ["api", "environments", env, "gitops-syncs", id]) => {
            match st.syncs.remove(&(env.to_string(), id.to_string())) {
                Some(_) => ok(),
                None => not_found("gitops sync"),
            }
        }
        ("POST", ["api", "environments", env, "gitops-syncs", id, "trigger"]) => {
            match st.syncs.get_mut(&(env.to_string(), id.to_string())) {
                Some(sync) => {
                    sync["last_sync_commit"] = json!("e4f5a6b");
                    ok()
                }
                None => not_found("gitops sync"),
            }
        }

        // Container registries
        ("GET", ["api", "container-registries"]) => {
            page(st.registries.values().cloned().collect())
        }
        ("POST", ["api", "container-registries"]) => {
            let id = st.next_id("reg");
            let mut registry = json!({"id": id});
            merge(&mut registry, &body, &["password"]);
            st.registries.insert(id, registry.clone());
            one(registry)
        }
        ("GET", ["api", "container-registries", id]) => match st.registries.get(*id) {
            Some(r) => one(r.clone()),
            None => not_found("registry"),
        },
        ("PUT", ["api", "container-registries", id]) => match st.registries.get_mut(*id) {
            Some(registry) => {
                merge(registry, &body, &["password"]);
                one(registry.clone())
            }
            None => not_found("registry"),
        },
        ("DELETE", ["api", "container-registries", id]) => match st.registries.remove(*id) {
            Some(_) => ok(),
            None => not_found("registry"),
        },

        // Git repositories
        ("GET", ["api", "gitops", "repositories"]) => {
            page(st.repositories.values().cloned().collect())
        }
        ("POST", ["api", "gitops", "repositories"]) => {
            let id = st.next_id("repo");
            let mut repo = json!({"id": id, "branch": "main"});
            merge(&mut repo, &body, &["credentials"]);
            st.repositories.insert(id, repo.clone());
            one(repo)
        }
        ("GET", ["api", "gitops", "repositories", id]) => match st.repositories.get(*id) {
            Some(r) => one(r.clone()),
            None => not_found("repository"),
        },
        ("PUT", ["api", "gitops", "repositories", id]) => match st.repositories.get_mut(*id) {
            Some(repo) => {
                merge(repo, &body, &["credentials"]);
                one(repo.clone())
            }
            None => not_found("repository"),
        },
        ("DELETE", ["api", "gitops", "repositories", id]) => match st.repositories.remove(*id) {
            Some(_) => ok(),
            None => not_found("repository"),
        },

        _ => not_found("route"),
    }
}
