use std::sync::Arc;

use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap, StatusCode},
    response::{Html, IntoResponse, Response},
};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::warn;

use incidents_common::User;

use crate::templates::render_unauthorized;
use crate::AppState;

type HmacSha256 = Hmac<Sha256>;

const COOKIE_NAME: &str = "incident_session";
const SESSION_DURATION_SECS: i64 = 7 * 24 * 3600; // 7 days

/// The user resolved for this request, if any. Set by the audit middleware
/// so extractors further down don't repeat the lookup.
#[derive(Clone, Debug)]
pub struct SessionUser(pub Option<User>);

/// Signed-in user. Extract this in handlers that require a login; a missing
/// or invalid session is rejected with 401.
pub struct CurrentUser(pub User);

/// Signed-in user when there is one. Never rejects.
pub struct MaybeUser(pub Option<User>);

impl FromRequestParts<Arc<AppState>> for MaybeUser {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        if let Some(SessionUser(user)) = parts.extensions.get::<SessionUser>() {
            return Ok(MaybeUser(user.clone()));
        }
        Ok(MaybeUser(resolve_user(&parts.headers, state).await))
    }
}

impl FromRequestParts<Arc<AppState>> for CurrentUser {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        match MaybeUser::from_request_parts(parts, state).await? {
            MaybeUser(Some(user)) => Ok(CurrentUser(user)),
            MaybeUser(None) => {
                Err((StatusCode::UNAUTHORIZED, Html(render_unauthorized())).into_response())
            }
        }
    }
}

/// Look up the user named by the session cookie. A valid cookie for a user
/// that no longer exists counts as anonymous.
pub async fn resolve_user(headers: &HeaderMap, state: &AppState) -> Option<User> {
    let cookie_header = headers
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    let value = parse_cookie(cookie_header, COOKIE_NAME)?;
    let user_id = verify_session(value, &state.settings.secret_key)?;

    match state.users.user_by_id(user_id).await {
        Ok(user) => user,
        Err(e) => {
            warn!(error = %e, user_id, "Failed to load session user");
            None
        }
    }
}

/// Signed session payload carried in the cookie as `user_id|expiry|hex(hmac)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SessionToken {
    user_id: i64,
    expires_at: i64,
}

impl SessionToken {
    fn payload(&self) -> String {
        format!("{}|{}", self.user_id, self.expires_at)
    }

    fn encode(&self, secret: &str) -> String {
        let mut mac = session_mac(secret);
        let payload = self.payload();
        mac.update(payload.as_bytes());
        format!("{payload}|{}", hex::encode(mac.finalize().into_bytes()))
    }

    /// Parse and authenticate a cookie value. Expiry is checked separately.
    fn decode(value: &str, secret: &str) -> Option<Self> {
        let (payload, signature) = value.rsplit_once('|')?;
        let (user_id, expires_at) = payload.split_once('|')?;
        let token = SessionToken {
            user_id: user_id.parse().ok()?,
            expires_at: expires_at.parse().ok()?,
        };

        let signature = hex::decode(signature).ok()?;
        let mut mac = session_mac(secret);
        mac.update(payload.as_bytes());
        mac.verify_slice(&signature).ok()?;

        Some(token)
    }
}

fn session_mac(secret: &str) -> HmacSha256 {
    HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size")
}

/// Fresh signed cookie value for `user_id`, valid for the session duration.
pub fn create_session(user_id: i64, secret: &str) -> String {
    SessionToken {
        user_id,
        expires_at: chrono::Utc::now().timestamp() + SESSION_DURATION_SECS,
    }
    .encode(secret)
}

/// Set-Cookie value establishing a session. `secure` is off only for
/// local development over plain HTTP.
pub fn session_cookie(user_id: i64, secret: &str, secure: bool) -> String {
    let mut cookie = format!(
        "{COOKIE_NAME}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={SESSION_DURATION_SECS}",
        create_session(user_id, secret)
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// Set-Cookie value that expires the session immediately.
pub fn clear_session_cookie() -> String {
    format!("{COOKIE_NAME}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0")
}

/// User id from a valid, unexpired session value.
fn verify_session(value: &str, secret: &str) -> Option<i64> {
    let token = SessionToken::decode(value, secret)?;
    (chrono::Utc::now().timestamp() <= token.expires_at).then_some(token.user_id)
}

fn parse_cookie<'a>(header: &'a str, name: &str) -> Option<&'a str> {
    header.split(';').find_map(|pair| {
        let (key, value) = pair.trim().split_once('=')?;
        (key == name).then_some(value)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_session() {
        let secret = "test-secret-key";
        let cookie_value = create_session(42, secret);
        assert_eq!(verify_session(&cookie_value, secret), Some(42));
    }

    #[test]
    fn rejects_tampered_session() {
        let secret = "test-secret-key";
        let cookie_value = create_session(42, secret);
        let tampered = cookie_value.replacen("42|", "1|", 1);
        assert_eq!(verify_session(&tampered, secret), None);
    }

    #[test]
    fn rejects_wrong_secret() {
        let cookie_value = create_session(7, "secret-a");
        assert_eq!(verify_session(&cookie_value, "secret-b"), None);
    }

    #[test]
    fn rejects_expired_session() {
        let secret = "test-secret";
        let token = SessionToken {
            user_id: 7,
            expires_at: chrono::Utc::now().timestamp() - 100,
        };
        assert_eq!(verify_session(&token.encode(secret), secret), None);
    }

    #[test]
    fn rejects_malformed_values() {
        for value in ["", "7", "7|123", "x|123|abcd", "7|123|not-hex"] {
            assert_eq!(verify_session(value, "s"), None, "value: {value:?}");
        }
    }

    #[test]
    fn secure_flag_follows_setting() {
        assert!(session_cookie(1, "s", true).ends_with("; Secure"));
        assert!(!session_cookie(1, "s", false).contains("Secure"));
        assert!(clear_session_cookie().contains("Max-Age=0"));
    }

    #[test]
    fn parse_cookie_works() {
        assert_eq!(
            parse_cookie("incident_session=abc123; other=xyz", COOKIE_NAME),
            Some("abc123")
        );
        assert_eq!(
            parse_cookie("other=xyz; incident_session=abc123", COOKIE_NAME),
            Some("abc123")
        );
        assert_eq!(parse_cookie("other=xyz", COOKIE_NAME), None);
        assert_eq!(
            parse_cookie("incident_session_old=1", COOKIE_NAME),
            None
        );
    }
}
