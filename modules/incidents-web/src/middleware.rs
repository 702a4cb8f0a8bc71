use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{Html, IntoResponse, Response},
};
use tracing::warn;

use incidents_common::AuditEntry;

use crate::auth::{resolve_user, SessionUser};
use crate::templates::render_maintenance;
use crate::AppState;

/// Record every page access after the handler has produced its status.
/// The resolved user rides along in request extensions for the extractors.
pub async fn audit_access(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let user = resolve_user(request.headers(), &state).await;
    let user_id = user.as_ref().map(|u| u.id);
    let method = request.method().to_string();
    let path = request.uri().path().to_string();

    request.extensions_mut().insert(SessionUser(user));
    let response = next.run(request).await;

    let entry = AuditEntry {
        user_id,
        method,
        path,
        status: response.status().as_u16(),
        accessed_at: chrono::Utc::now(),
    };
    if let Err(e) = state.audit.record(entry).await {
        warn!(error = %e, "Failed to write audit log entry");
    }

    response
}

/// Short-circuit everything with a 503 while in maintenance mode.
pub async fn maintenance_gate(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    if state.settings.app_env.is_maintenance() {
        return (StatusCode::SERVICE_UNAVAILABLE, Html(render_maintenance())).into_response();
    }
    next.run(request).await
}
