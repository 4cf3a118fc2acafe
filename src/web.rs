//! Server bootstrap: builds the live authorization state from settings and
//! serves the policy API.
use crate::rbac::web::{router, AppState};
use crate::rbac::LiveEnforcer;
use crate::settings::Settings;
use miette::IntoDiagnostic;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub fn app(settings: &Settings, live: Arc<LiveEnforcer>) -> axum::Router {
    let state = AppState {
        live,
        refresh_per_request: settings.refresh_per_request(),
    };
    router(state).layer(TraceLayer::new_for_http())
}

pub async fn serve(settings: Settings) -> miette::Result<()> {
    let live = Arc::new(LiveEnforcer::new(settings.enforcer.clone())?);

    let addr: SocketAddr = format!("{}:{}", settings.server.host, settings.server.port)
        .parse()
        .map_err(|e| miette::miette!("bad listen addr: {e}"))?;

    if settings.refresh_per_request() {
        tracing::info!("Policy file is re-read before every role request");
    } else {
        tracing::warn!("Development mode: role requests are served from memory only");
    }

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .into_diagnostic()?;
    tracing::info!(%addr, "Policy API listening");
    axum::serve(listener, app(&settings, live))
        .await
        .into_diagnostic()?;
    Ok(())
}
