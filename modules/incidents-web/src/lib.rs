use std::sync::Arc;

use axum::{
    http::{header, HeaderValue},
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use tower_http::set_header::SetResponseHeaderLayer;

use incidents_common::{
    AddressDirectory, AppEnv, AuditLog, Clock, Config, IncidentSource, UserStore,
};

pub mod auth;
pub mod middleware;
pub mod pages;
pub mod report;
pub mod rest;
pub mod templates;
pub mod verifier;

use verifier::IdentityVerifier;

// --- App State ---

/// Request-independent settings the handlers read.
#[derive(Debug, Clone)]
pub struct Settings {
    pub secret_key: String,
    /// Audience sent to the identity verifier.
    pub audience: String,
    pub app_env: AppEnv,
    pub page_size: u32,
}

impl Settings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            secret_key: config.secret_key.clone(),
            audience: config.browserid_url.clone(),
            app_env: config.app_env,
            page_size: config.page_size,
        }
    }
}

pub struct AppState {
    pub incidents: Arc<dyn IncidentSource>,
    pub users: Arc<dyn UserStore>,
    pub audit: Arc<dyn AuditLog>,
    pub directory: Arc<dyn AddressDirectory>,
    pub verifier: Arc<dyn IdentityVerifier>,
    pub clock: Arc<dyn Clock>,
    pub settings: Settings,
}

// --- Router ---

pub fn build_router(state: Arc<AppState>) -> Router {
    // HTML pages are audited.
    let pages = Router::new()
        .route("/", get(pages::home))
        .route("/address/{address}", get(pages::address_page))
        .route("/browse", get(pages::browse_page))
        .route_layer(from_fn_with_state(state.clone(), middleware::audit_access));

    Router::new()
        .merge(pages)
        .route("/log-in", post(pages::log_in))
        .route("/log-out", post(pages::log_out))
        .route("/api/address/{address}", get(rest::api_address))
        .layer(from_fn_with_state(state.clone(), middleware::maintenance_gate))
        // Registered after the gate so it answers during maintenance too.
        .route("/health", get(|| async { "ok" }))
        .with_state(state)
        // Incident pages are per-user; never cache them.
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ))
        // Logging layer: method + path only
        .layer(
            tower_http::trace::TraceLayer::new_for_http().make_span_with(
                |request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        path = %request.uri().path(),
                    )
                },
            ),
        )
}
