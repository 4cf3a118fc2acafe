use std::sync::Arc;

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;

use crate::rbac::domains::list_domain_edges;
use crate::rbac::engine;
use crate::rbac::errors::RbacError;
use crate::rbac::policies::{apply_policies, list_policies};
use crate::rbac::reload::LiveEnforcer;
use crate::rbac::roles::{apply_role_assignment, list_role_assignments, list_roles, list_subjects};
use crate::rbac::store::RelationStore;
use crate::rbac::types::*;

#[derive(Clone)]
pub struct AppState {
    pub live: Arc<LiveEnforcer>,
    /// Re-read the policy file before every role request.
    pub refresh_per_request: bool,
}

/// Optional `/domain/{domain}` and `/subject/{subject}` path segments.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RoleScope {
    pub domain: Option<String>,
    pub subject: Option<String>,
}

pub fn router(state: AppState) -> Router {
    let scoped_roles = get(list_scoped_roles)
        .post(assign_scoped_roles)
        .delete(remove_scoped_role);

    Router::new()
        .route("/reload", post(handle_reload))
        .route(
            "/roles",
            get(list_all_roles).post(assign_roles).delete(remove_role),
        )
        .route("/roles/domain/{domain}", scoped_roles.clone())
        .route("/roles/subject/{subject}", scoped_roles.clone())
        .route("/roles/domain/{domain}/subject/{subject}", scoped_roles)
        .route("/domains", get(handle_domains))
        .route("/domains/{domain}/roles", get(handle_known_roles))
        .route("/users/domain/{domain}/role/{role}", get(handle_subjects))
        .route("/policies", get(list_all_policies).post(add_policies))
        .route(
            "/policies/domain/{domain}",
            get(list_domain_policies).post(add_domain_policies),
        )
        .route("/check", post(handle_check))
        .route("/healthz", get(health))
        .with_state(state)
}

fn decoded<T>(extracted: Result<T, impl std::fmt::Display>) -> Result<T, RbacError> {
    extracted.map_err(|e| RbacError::BadRequest(e.to_string()))
}

/// Path value if present, else a non-empty query value.
fn pick(path: Option<String>, query: Option<String>) -> Option<String> {
    path.or(query).filter(|v| !v.is_empty())
}

async fn refresh_if_needed(state: &AppState) -> Result<(), RbacError> {
    if state.refresh_per_request {
        state.live.refresh().await?;
    }
    Ok(())
}

// ---------- reload ----------

async fn handle_reload(
    State(state): State<AppState>,
    body: Result<Json<Snapshot>, JsonRejection>,
) -> Result<StatusCode, RbacError> {
    let Json(snapshot) = decoded(body)?;
    state.live.reload(&snapshot).await?;
    Ok(StatusCode::OK)
}

// ---------- role assignments ----------

async fn list_all_roles(
    State(state): State<AppState>,
    query: Result<Query<RoleQuery>, QueryRejection>,
) -> Result<Json<Vec<RoleAssignment>>, RbacError> {
    list_roles_in(state, RoleScope::default(), query).await
}

async fn list_scoped_roles(
    State(state): State<AppState>,
    scope: Result<Path<RoleScope>, PathRejection>,
    query: Result<Query<RoleQuery>, QueryRejection>,
) -> Result<Json<Vec<RoleAssignment>>, RbacError> {
    let Path(scope) = decoded(scope)?;
    list_roles_in(state, scope, query).await
}

async fn list_roles_in(
    state: AppState,
    scope: RoleScope,
    query: Result<Query<RoleQuery>, QueryRejection>,
) -> Result<Json<Vec<RoleAssignment>>, RbacError> {
    let Query(query) = decoded(query)?;
    refresh_if_needed(&state).await?;

    let subject = pick(scope.subject, query.subject);
    let domain = pick(scope.domain, query.domain);

    let enforcer = state.live.read().await;
    Ok(Json(list_role_assignments(
        &*enforcer,
        subject.as_deref(),
        domain.as_deref(),
    )))
}

async fn assign_roles(
    State(state): State<AppState>,
    body: Result<Json<Vec<RoleAssignmentInput>>, JsonRejection>,
) -> Result<Json<Vec<RoleAssignment>>, RbacError> {
    assign_roles_in(state, RoleScope::default(), body).await
}

async fn assign_scoped_roles(
    State(state): State<AppState>,
    scope: Result<Path<RoleScope>, PathRejection>,
    body: Result<Json<Vec<RoleAssignmentInput>>, JsonRejection>,
) -> Result<Json<Vec<RoleAssignment>>, RbacError> {
    let Path(scope) = decoded(scope)?;
    assign_roles_in(state, scope, body).await
}

async fn assign_roles_in(
    state: AppState,
    scope: RoleScope,
    body: Result<Json<Vec<RoleAssignmentInput>>, JsonRejection>,
) -> Result<Json<Vec<RoleAssignment>>, RbacError> {
    let Json(inputs) = decoded(body)?;
    refresh_if_needed(&state).await?;

    let assignments = state
        .live
        .mutate(move |enforcer| {
            let mut assignments = Vec::new();
            for mut input in inputs {
                if let Some(domain) = scope.domain.clone().filter(|d| !d.is_empty()) {
                    input.domain = domain;
                }
                if let Some(subject) = scope.subject.clone().filter(|s| !s.is_empty()) {
                    input.subject = subject;
                }
                assignments.extend(apply_role_assignment(enforcer, &input)?);
            }
            enforcer.save()?;
            Ok(assignments)
        })
        .await?;

    Ok(Json(assignments))
}

async fn remove_role(
    State(state): State<AppState>,
    query: Result<Query<RoleQuery>, QueryRejection>,
) -> Result<StatusCode, RbacError> {
    remove_role_in(state, RoleScope::default(), query).await
}

async fn remove_scoped_role(
    State(state): State<AppState>,
    scope: Result<Path<RoleScope>, PathRejection>,
    query: Result<Query<RoleQuery>, QueryRejection>,
) -> Result<StatusCode, RbacError> {
    let Path(scope) = decoded(scope)?;
    remove_role_in(state, scope, query).await
}

async fn remove_role_in(
    state: AppState,
    scope: RoleScope,
    query: Result<Query<RoleQuery>, QueryRejection>,
) -> Result<StatusCode, RbacError> {
    let Query(query) = decoded(query)?;
    refresh_if_needed(&state).await?;

    let input = RoleAssignmentInput {
        subject: pick(scope.subject, query.subject).unwrap_or_default(),
        role: query.role.unwrap_or_default(),
        domain: pick(scope.domain, query.domain).unwrap_or_default(),
        unassign: true,
    };

    state
        .live
        .mutate(move |enforcer| {
            apply_role_assignment(enforcer, &input)?;
            enforcer.save()
        })
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

// ---------- domains and lookups ----------

async fn handle_domains(State(state): State<AppState>) -> Json<Vec<DomainEdge>> {
    let enforcer = state.live.read().await;
    Json(list_domain_edges(&*enforcer))
}

async fn handle_known_roles(
    State(state): State<AppState>,
    Path(domain): Path<String>,
) -> Json<Vec<String>> {
    let enforcer = state.live.read().await;
    Json(list_roles(&*enforcer, &domain))
}

async fn handle_subjects(
    State(state): State<AppState>,
    Path((domain, role)): Path<(String, String)>,
) -> Result<Json<Vec<String>>, RbacError> {
    refresh_if_needed(&state).await?;
    let enforcer = state.live.read().await;
    Ok(Json(list_subjects(&*enforcer, &domain, &role)))
}

// ---------- policies ----------

async fn list_all_policies(
    State(state): State<AppState>,
    query: Result<Query<PolicyQuery>, QueryRejection>,
) -> Result<Json<Vec<PolicyRule>>, RbacError> {
    let Query(query) = decoded(query)?;
    list_policies_in(state, query).await
}

async fn list_domain_policies(
    State(state): State<AppState>,
    Path(domain): Path<String>,
    query: Result<Query<PolicyQuery>, QueryRejection>,
) -> Result<Json<Vec<PolicyRule>>, RbacError> {
    let Query(mut query) = decoded(query)?;
    query.domain = Some(domain);
    list_policies_in(state, query).await
}

async fn list_policies_in(
    state: AppState,
    query: PolicyQuery,
) -> Result<Json<Vec<PolicyRule>>, RbacError> {
    let domain = pick(None, query.domain);
    let subject = pick(None, query.subject);
    let enforcer = state.live.read().await;
    Ok(Json(list_policies(
        &*enforcer,
        domain.as_deref(),
        subject.as_deref(),
    )))
}

async fn add_policies(
    State(state): State<AppState>,
    body: Result<Json<Vec<PolicyInput>>, JsonRejection>,
) -> Result<Json<Vec<PolicyRule>>, RbacError> {
    let Json(inputs) = decoded(body)?;
    add_policies_in(state, inputs).await
}

async fn add_domain_policies(
    State(state): State<AppState>,
    Path(domain): Path<String>,
    body: Result<Json<Vec<PolicyInput>>, JsonRejection>,
) -> Result<Json<Vec<PolicyRule>>, RbacError> {
    let Json(mut inputs) = decoded(body)?;
    for input in &mut inputs {
        input.domain = domain.clone();
    }
    add_policies_in(state, inputs).await
}

async fn add_policies_in(
    state: AppState,
    inputs: Vec<PolicyInput>,
) -> Result<Json<Vec<PolicyRule>>, RbacError> {
    let rules = state
        .live
        .mutate(move |enforcer| {
            let rules = apply_policies(enforcer, &inputs)?;
            enforcer.save()?;
            Ok(rules)
        })
        .await?;
    Ok(Json(rules))
}

// ---------- decisions ----------

async fn handle_check(
    State(state): State<AppState>,
    body: Result<Json<CheckRequest>, JsonRejection>,
) -> Result<Json<CheckResponse>, RbacError> {
    let Json(req) = decoded(body)?;
    let enforcer = state.live.read().await;
    let allowed = engine::enforce(&enforcer, &req.subject, &req.domain, &req.object, &req.action);
    Ok(Json(CheckResponse { allowed }))
}

async fn health() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}
