use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use incidents_common::IncidentError;

/// Response from the identity verifier.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Verification {
    #[serde(default)]
    pub status: String,
    pub email: Option<String>,
    pub reason: Option<String>,
}

impl Verification {
    /// The asserted email, only when the verifier said `okay`.
    pub fn verified_email(&self) -> Option<&str> {
        if self.status == "okay" {
            self.email.as_deref().filter(|e| !e.is_empty())
        } else {
            None
        }
    }
}

/// Checks a browser-supplied identity assertion for a given audience.
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    async fn verify(&self, assertion: &str, audience: &str) -> Result<Verification, IncidentError>;
}

/// Remote verifier speaking the BrowserID verification protocol: a form
/// POST of `assertion` and `audience`, answered with JSON.
pub struct RemoteVerifier {
    client: reqwest::Client,
    url: String,
}

impl RemoteVerifier {
    pub fn new(url: impl Into<String>) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl IdentityVerifier for RemoteVerifier {
    async fn verify(&self, assertion: &str, audience: &str) -> Result<Verification, IncidentError> {
        let response = self
            .client
            .post(&self.url)
            .form(&[("assertion", assertion), ("audience", audience)])
            .send()
            .await
            .map_err(|e| IncidentError::Verifier(e.to_string()))?;

        let status = response.status();
        let verification: Verification = response
            .json()
            .await
            .map_err(|e| IncidentError::Verifier(format!("HTTP {status}: {e}")))?;

        debug!(status = %verification.status, "Identity verifier responded");
        Ok(verification)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn okay_status_yields_email() {
        let v: Verification =
            serde_json::from_str(r#"{"status":"okay","email":"pat@example.org","audience":"x"}"#)
                .unwrap();
        assert_eq!(v.verified_email(), Some("pat@example.org"));
    }

    #[test]
    fn failure_status_yields_nothing() {
        let v: Verification =
            serde_json::from_str(r#"{"status":"failure","reason":"assertion has expired"}"#)
                .unwrap();
        assert_eq!(v.verified_email(), None);
        assert_eq!(v.reason.as_deref(), Some("assertion has expired"));
    }

    #[test]
    fn missing_status_is_not_okay() {
        let v: Verification = serde_json::from_str(r#"{"email":"pat@example.org"}"#).unwrap();
        assert_eq!(v.verified_email(), None);
    }
}
