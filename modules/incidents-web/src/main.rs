use std::sync::Arc;

use anyhow::Result;
use tracing::info;
use tracing_subscriber::EnvFilter;

use incidents_common::{AppEnv, Config, SystemClock};
use incidents_store::PgStore;
use incidents_web::{build_router, verifier::RemoteVerifier, AppState, Settings};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.app_env.default_log_filter()));
    if config.app_env == AppEnv::Production {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    info!(env = %config.app_env, "Starting incident lookup");

    let store = Arc::new(PgStore::connect(&config).await?);
    store.migrate().await?;

    let state = Arc::new(AppState {
        incidents: store.clone(),
        users: store.clone(),
        audit: store.clone(),
        directory: store,
        verifier: Arc::new(RemoteVerifier::new(config.verifier_url.clone())?),
        clock: Arc::new(SystemClock),
        settings: Settings::from_config(&config),
    });

    let app = build_router(state);

    let addr = format!("{}:{}", config.web_host, config.web_port);
    info!("Incident lookup listening on {addr}");
    if config.app_env.is_maintenance() {
        info!("Maintenance mode: pages answer 503");
    }

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
