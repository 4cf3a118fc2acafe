use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use miette::Diagnostic;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum RbacError {
    #[error("Failed to read model file `{path}`")]
    #[diagnostic(
        code(warden::rbac::model_load),
        help("Check that `enforcer.model_path` points to a readable KDL model file")
    )]
    ModelLoad {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid model: {0}")]
    #[diagnostic(
        code(warden::rbac::invalid_model),
        help("Supported model nodes: effect \"deny-overrides\"|\"allow-overrides\", inherit-domains #true|#false")
    )]
    InvalidModel(String),

    #[error("KDL parse error: {0}")]
    #[diagnostic(
        code(warden::rbac::kdl_parse),
        help("Check the KDL syntax at https://kdl.dev")
    )]
    KdlParse(String),

    #[error("Invalid relation: {0}")]
    #[diagnostic(
        code(warden::rbac::invalid_relation),
        help("Grouping tuples take non-empty columns; `__domain__` is reserved and `root` cannot have a parent")
    )]
    InvalidRelation(String),

    #[error("Invalid domain hierarchy: {0}")]
    #[diagnostic(
        code(warden::rbac::invalid_domain_tree),
        help("Every domain except `root` needs exactly one parent and the hierarchy must not contain cycles")
    )]
    InvalidDomainTree(String),

    #[error("Failed to load policy file `{path}`")]
    #[diagnostic(code(warden::rbac::policy_load))]
    PolicyLoad {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid policy file: {0}")]
    #[diagnostic(
        code(warden::rbac::invalid_policy_file),
        help("Policy file lines look like: g \"alice\" \"admin\" \"asia\", g3 \"admin\" \"role\" \"asia\", p \"asia\" \"alice\" \"doc\" \"read\" \"allow\"")
    )]
    InvalidPolicyFile(String),

    #[error("Failed to save policy file `{path}`")]
    #[diagnostic(code(warden::rbac::policy_save))]
    PolicySave {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Background task failed")]
    #[diagnostic(code(warden::rbac::background_task))]
    BackgroundTask(#[source] tokio::task::JoinError),

    #[error("Bad request: {0}")]
    #[diagnostic(code(warden::rbac::bad_request))]
    BadRequest(String),
}

impl IntoResponse for RbacError {
    fn into_response(self) -> Response {
        let status = match &self {
            RbacError::BadRequest(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        let body = json!({ "error": self.to_string() });
        (status, Json(body)).into_response()
    }
}
