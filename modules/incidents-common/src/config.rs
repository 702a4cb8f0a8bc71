use std::env;
use std::fmt;
use std::str::FromStr;

use crate::error::IncidentError;

pub const DEFAULT_VERIFIER_URL: &str = "https://verifier.login.persona.org/verify";

/// Deployment environment, selected by `APP_ENV`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AppEnv {
    Production,
    Staging,
    #[default]
    Development,
    Testing,
    /// Every page except the health check answers 503.
    Maintenance,
}

impl AppEnv {
    pub fn is_debug(&self) -> bool {
        !matches!(self, AppEnv::Production)
    }

    pub fn is_maintenance(&self) -> bool {
        matches!(self, AppEnv::Maintenance)
    }

    /// Cookies go out with `Secure` everywhere except local development.
    pub fn secure_cookies(&self) -> bool {
        !matches!(self, AppEnv::Development | AppEnv::Testing)
    }

    /// Filter used when `RUST_LOG` is unset.
    pub fn default_log_filter(&self) -> &'static str {
        match self {
            AppEnv::Production | AppEnv::Maintenance => "incidents=info,tower_http=info",
            AppEnv::Staging | AppEnv::Development | AppEnv::Testing => {
                "incidents=debug,tower_http=debug,sqlx=warn"
            }
        }
    }
}

impl FromStr for AppEnv {
    type Err = IncidentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Ok(AppEnv::Production),
            "staging" => Ok(AppEnv::Staging),
            "development" | "dev" => Ok(AppEnv::Development),
            "testing" | "test" => Ok(AppEnv::Testing),
            "maintenance" => Ok(AppEnv::Maintenance),
            other => Err(IncidentError::Config(format!("unknown APP_ENV: {other}"))),
        }
    }
}

impl fmt::Display for AppEnv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AppEnv::Production => "production",
            AppEnv::Staging => "staging",
            AppEnv::Development => "development",
            AppEnv::Testing => "testing",
            AppEnv::Maintenance => "maintenance",
        };
        f.write_str(name)
    }
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Database
    pub database_url: String,
    /// Incident tables may live in a separate database.
    pub data_database_url: String,
    pub db_max_connections: u32,

    // Sessions and login
    pub secret_key: String,
    pub browserid_url: String,
    pub verifier_url: String,

    // Web server
    pub app_env: AppEnv,
    pub web_host: String,
    pub web_port: u16,
    pub page_size: u32,
}

impl Config {
    /// Load configuration from the process environment, reading `.env` first
    /// when present.
    pub fn from_env() -> Result<Self, IncidentError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, IncidentError> {
        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.is_empty())
                .ok_or_else(|| IncidentError::Config(format!("{key} environment variable is required")))
        };

        let database_url = required("DATABASE_URL")?;
        let data_database_url = lookup("DATA_DATABASE_URL")
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| database_url.clone());

        let app_env = match lookup("APP_ENV") {
            Some(v) if !v.is_empty() => v.parse()?,
            _ => AppEnv::default(),
        };

        Ok(Self {
            database_url,
            data_database_url,
            db_max_connections: parse_or(&lookup, "DB_MAX_CONNECTIONS", 10)?,
            secret_key: required("SECRET_KEY")?,
            browserid_url: required("BROWSERID_URL")?,
            verifier_url: lookup("VERIFIER_URL")
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| DEFAULT_VERIFIER_URL.to_string()),
            app_env,
            web_host: lookup("WEB_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            web_port: parse_or(&lookup, "WEB_PORT", 5000)?,
            page_size: positive(parse_or(&lookup, "PAGE_SIZE", 20)?, "PAGE_SIZE")?,
        })
    }

    /// True when incident data is read from its own database.
    pub fn has_separate_data_db(&self) -> bool {
        self.data_database_url != self.database_url
    }
}

fn parse_or<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T, IncidentError> {
    match lookup(key) {
        Some(v) if !v.is_empty() => v
            .trim()
            .parse()
            .map_err(|_| IncidentError::Config(format!("{key} must be a number, got {v:?}"))),
        _ => Ok(default),
    }
}

fn positive(value: u32, key: &str) -> Result<u32, IncidentError> {
    if value == 0 {
        return Err(IncidentError::Config(format!("{key} must be at least 1")));
    }
    Ok(value)
}
