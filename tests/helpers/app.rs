use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use warden::rbac::{EnforcerConfig, LiveEnforcer, ReloadMode};
use warden::settings::{Environment, Settings};

/// Router over a live enforcer whose model and policy files live in a
/// temporary directory removed on drop.
pub struct TestApp {
    router: Router,
    live: Arc<LiveEnforcer>,
    _dir: TempDir,
}

impl TestApp {
    pub fn new(environment: Environment) -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let model_path = dir.path().join("model.kdl");
        std::fs::write(&model_path, "effect \"deny-overrides\"\ninherit-domains \"true\"\n")
            .expect("Failed to write model");

        let settings = Settings {
            enforcer: EnforcerConfig {
                model_path,
                policy_path: dir.path().join("policy.kdl"),
                reload: ReloadMode::Merge,
            },
            environment,
            ..Default::default()
        };

        let live = Arc::new(
            LiveEnforcer::new(settings.enforcer.clone()).expect("Failed to build enforcer"),
        );
        let router = warden::web::app(&settings, Arc::clone(&live));

        Self {
            router,
            live,
            _dir: dir,
        }
    }

    pub fn live(&self) -> &LiveEnforcer {
        &self.live
    }

    pub fn config(&self) -> &EnforcerConfig {
        self.live.config()
    }

    /// Sends a request and returns the status with the body parsed as JSON
    /// (`Value::Null` when empty).
    pub async fn send(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let body = match body {
            Some(json) => Body::from(json.to_string()),
            None => Body::empty(),
        };
        self.send_raw(method, uri, body).await
    }

    pub async fn send_raw(&self, method: Method, uri: &str, body: Body) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(body)
            .expect("Failed to build request");

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Router failed");

        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
            .await
            .expect("Failed to read body");
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };
        (status, json)
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.send(Method::GET, uri, None).await
    }

    pub async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.send(Method::POST, uri, Some(body)).await
    }

    pub async fn delete(&self, uri: &str) -> (StatusCode, Value) {
        self.send(Method::DELETE, uri, None).await
    }
}
