use thiserror::Error;

#[derive(Error, Debug)]
pub enum IncidentError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Identity verifier error: {0}")]
    Verifier(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}
