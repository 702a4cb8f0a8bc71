use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Redirect, Response},
    Form,
};
use serde::Deserialize;
use tracing::{info, warn};

use incidents_common::{IncidentError, PageRequest, User, UserStore};

use crate::auth::{self, CurrentUser, MaybeUser};
use crate::report::load_address_report;
use crate::templates::{render_address, render_browse, render_error, render_home, render_not_found};
use crate::AppState;

/// Display name given to users created on first login.
const DEFAULT_USER_NAME: &str = "Fireworks Joe";

// --- Form / query structs ---

#[derive(Deserialize)]
pub struct LoginForm {
    assertion: Option<String>,
}

#[derive(Deserialize, Default)]
pub struct BrowseQuery {
    page: Option<String>,
    sort: Option<String>,
    order: Option<String>,
}

impl BrowseQuery {
    /// Unparseable values fall back to their defaults.
    fn to_request(&self, per_page: u32) -> PageRequest {
        PageRequest {
            page: self
                .page
                .as_deref()
                .and_then(|p| p.trim().parse().ok())
                .unwrap_or(1),
            per_page,
            sort: self
                .sort
                .as_deref()
                .and_then(|s| s.parse().ok())
                .unwrap_or_default(),
            order: self
                .order
                .as_deref()
                .and_then(|s| s.parse().ok())
                .unwrap_or_default(),
        }
    }
}

// --- Pages ---

pub async fn home(MaybeUser(user): MaybeUser) -> impl IntoResponse {
    Html(render_home(user.as_ref().map(|u| u.email.as_str())))
}

pub async fn address_page(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(address): Path<String>,
) -> Response {
    match load_address_report(state.incidents.as_ref(), state.clock.as_ref(), &address).await {
        Ok(Some(report)) => Html(render_address(&report, Some(&user.email))).into_response(),
        Ok(None) => (StatusCode::NOT_FOUND, Html(render_not_found(&address))).into_response(),
        Err(e) => {
            warn!(error = %e, address = %address, "Failed to build address report");
            server_error(&e)
        }
    }
}

pub async fn browse_page(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<BrowseQuery>,
) -> Response {
    let request = query.to_request(state.settings.page_size);

    match state.directory.list_addresses(request).await {
        Ok(page) if page.is_out_of_range() => {
            (StatusCode::NOT_FOUND, Html(render_error("No such page."))).into_response()
        }
        Ok(page) => Html(render_browse(
            &page,
            request.sort,
            request.order,
            Some(&user.email),
        ))
        .into_response(),
        Err(e) => {
            warn!(error = %e, "Failed to list addresses");
            server_error(&e)
        }
    }
}

// --- Login ---

pub async fn log_in(State(state): State<Arc<AppState>>, Form(form): Form<LoginForm>) -> Response {
    let Some(assertion) = form.assertion.filter(|a| !a.is_empty()) else {
        return login_failed();
    };

    let verification = match state
        .verifier
        .verify(&assertion, &state.settings.audience)
        .await
    {
        Ok(v) => v,
        Err(e) => {
            warn!(error = %e, "Identity verification request failed");
            return login_failed();
        }
    };

    let Some(email) = verification.verified_email() else {
        info!(reason = ?verification.reason, "Identity assertion rejected");
        return login_failed();
    };

    match load_user_by_email(state.users.as_ref(), email).await {
        Ok(user) => {
            info!(user_id = user.id, "User logged in");
            let cookie = auth::session_cookie(
                user.id,
                &state.settings.secret_key,
                state.settings.app_env.secure_cookies(),
            );
            (StatusCode::OK, [(header::SET_COOKIE, cookie)], "OK").into_response()
        }
        Err(e) => {
            warn!(error = %e, "Failed to load user for login");
            login_failed()
        }
    }
}

pub async fn log_out() -> Response {
    (
        [(header::SET_COOKIE, auth::clear_session_cookie())],
        Redirect::to("/"),
    )
        .into_response()
}

/// Find the user with this email, creating one on first login.
pub async fn load_user_by_email(users: &dyn UserStore, email: &str) -> Result<User, IncidentError> {
    if let Some(user) = users.user_by_email(email).await? {
        return Ok(user);
    }
    users.create_user(DEFAULT_USER_NAME, email).await
}

// --- Helpers ---

fn login_failed() -> Response {
    (StatusCode::BAD_REQUEST, "Failed").into_response()
}

fn server_error(e: &IncidentError) -> Response {
    let message = match e {
        IncidentError::Validation(_) => "Some incident records at this address are incomplete.",
        _ => "Error loading incident data.",
    };
    (StatusCode::INTERNAL_SERVER_ERROR, Html(render_error(message))).into_response()
}
