use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;
use tracing::warn;

use crate::auth::CurrentUser;
use crate::report::load_address_report;
use crate::AppState;

/// JSON form of the address page.
pub async fn api_address(
    State(state): State<Arc<AppState>>,
    CurrentUser(_user): CurrentUser,
    Path(address): Path<String>,
) -> Response {
    match load_address_report(state.incidents.as_ref(), state.clock.as_ref(), &address).await {
        Ok(Some(report)) => Json(report).into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "not_found", "address": address })),
        )
            .into_response(),
        Err(e) => {
            warn!(error = %e, address = %address, "Failed to build address report");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "internal_error" })),
            )
                .into_response()
        }
    }
}
